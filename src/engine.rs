use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{AtomicScope, Database};
use crate::error::{Error, Result};
use crate::stores::{
    Account, AccountId, AccountsStore, NewTransaction, TransactionRecord, TransactionType,
    TransactionsStore,
};

/// Applies balance changes and writes the matching ledger records.
///
/// Every mutating operation runs in a single unit of work: either all of its balance updates
/// and records are committed, or none are.
#[derive(Debug)]
pub struct Engine<D> {
    db: D,
    accounts: AccountsStore,
    transactions: TransactionsStore,
}

impl<D: Database> Engine<D> {
    pub fn new(db: D) -> Self {
        Self {
            db,
            accounts: AccountsStore::new(),
            transactions: TransactionsStore::new(),
        }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// Opens an account. No ledger record is written for the opening balance.
    #[instrument(skip(self))]
    pub fn create_account(&self, name: &str, initial_balance: Decimal) -> Result<Account> {
        if initial_balance < Decimal::ZERO {
            return Err(Error::Validation("balance cannot be negative"));
        }

        let work = self.db.begin()?;
        let account = self.accounts.insert(&work, name, initial_balance)?;
        work.commit()?;

        info!(account = %account.id, balance = %account.balance, "account opened");
        Ok(account)
    }

    /// Deposits a non-negative amount or withdraws a negative one, returning the id that
    /// correlates the written record.
    #[instrument(skip(self))]
    pub fn post_transaction(&self, account_id: AccountId, signed_amount: Decimal) -> Result<Uuid> {
        let work = self.db.begin()?;
        let account = self.accounts.find_by_id_for_update(&work, account_id)?;

        let new_balance = account
            .balance
            .checked_add(signed_amount)
            .ok_or(Error::Validation("amount out of range"))?;
        if new_balance < Decimal::ZERO {
            return Err(Error::InsufficientFunds {
                account: account_id,
                balance: account.balance,
                requested: signed_amount.abs(),
            });
        }

        self.accounts.update_balance(&work, account_id, new_balance)?;
        let ref_id = Uuid::new_v4();
        self.transactions.insert(
            &work,
            account_id,
            NewTransaction {
                account_name: account.name,
                tx_type: TransactionType::from_signed_amount(signed_amount),
                amount: signed_amount.abs(),
                ref_id,
                description: None,
            },
        )?;
        work.commit()?;

        info!(%ref_id, account = %account_id, amount = %signed_amount, "transaction posted");
        Ok(ref_id)
    }

    /// Moves `amount` between two accounts as a withdrawal/deposit pair sharing one
    /// correlation id, which is returned.
    #[instrument(skip(self))]
    pub fn transfer(&self, from_id: AccountId, to_id: AccountId, amount: Decimal) -> Result<Uuid> {
        validate_transfer_amount(amount)?;
        if from_id == to_id {
            return Err(Error::Validation("cannot transfer to the same account"));
        }

        let work = self.db.begin()?;
        // Rows are always locked in ascending id order.
        let (from, to) = if from_id < to_id {
            let from = self.accounts.find_by_id_for_update(&work, from_id)?;
            let to = self.accounts.find_by_id_for_update(&work, to_id)?;
            (from, to)
        } else {
            let to = self.accounts.find_by_id_for_update(&work, to_id)?;
            let from = self.accounts.find_by_id_for_update(&work, from_id)?;
            (from, to)
        };

        if from.balance < amount {
            return Err(Error::InsufficientFunds {
                account: from_id,
                balance: from.balance,
                requested: amount,
            });
        }
        let credited = to
            .balance
            .checked_add(amount)
            .ok_or(Error::Validation("amount out of range"))?;

        let ref_id = Uuid::new_v4();
        self.accounts
            .update_balance(&work, from_id, from.balance - amount)?;
        self.accounts.update_balance(&work, to_id, credited)?;
        self.transactions.insert(
            &work,
            from_id,
            NewTransaction {
                account_name: from.name.clone(),
                tx_type: TransactionType::Withdrawal,
                amount,
                ref_id,
                description: Some(format!("Transfer to {}", to.name)),
            },
        )?;
        self.transactions.insert(
            &work,
            to_id,
            NewTransaction {
                account_name: to.name,
                tx_type: TransactionType::Deposit,
                amount,
                ref_id,
                description: Some(format!("Transfer from {}", from.name)),
            },
        )?;
        work.commit()?;

        info!(%ref_id, from = %from_id, to = %to_id, %amount, "transfer committed");
        Ok(ref_id)
    }

    pub fn find_account(&self, id: AccountId) -> Result<Account> {
        self.accounts.find_by_id(&self.db, id)
    }

    /// Ledger records of one account, oldest first.
    pub fn find_account_transactions(&self, id: AccountId) -> Result<Vec<TransactionRecord>> {
        self.accounts.find_by_id(&self.db, id)?;
        self.transactions.find_by_account(&self.db, id)
    }

    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.accounts.list(&self.db)
    }
}

fn validate_transfer_amount(amount: Decimal) -> Result<()> {
    if amount.is_zero() {
        return Err(Error::Validation("amount cannot be zero"));
    }
    if amount < Decimal::ZERO {
        return Err(Error::Validation("amount cannot be negative"));
    }
    Ok(())
}
