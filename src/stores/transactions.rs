//! Append-only ledger of transaction records.
//!
//! Each record belongs to one account and carries:
//! - the owner's name as it was when the record was written
//! - an unsigned amount, with direction given by [`TransactionType`]
//! - a correlation id shared by every record of one logical operation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Executor, Row, Table, Tables};
use crate::stores::AccountId;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Withdrawal,
    Deposit,
}

impl TransactionType {
    /// Negative amounts withdraw; zero and above deposit.
    pub fn from_signed_amount(amount: Decimal) -> Self {
        if amount < Decimal::ZERO {
            TransactionType::Withdrawal
        } else {
            TransactionType::Deposit
        }
    }
}

/// A record as handed to the store, before it has an id or timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_name: String,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub ref_id: Uuid,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: u64,
    pub account_id: AccountId,
    pub account_name: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub ref_id: Uuid,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Row for TransactionRecord {
    const TABLE: &'static str = "transactions";

    fn id(&self) -> u64 {
        self.id
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.transactions
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.transactions
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionsStore;

impl TransactionsStore {
    pub fn new() -> Self {
        Self
    }

    /// Appends a record for `account_id`, stamping it with the current time.
    pub fn insert(
        &self,
        db: &impl Executor,
        account_id: AccountId,
        record: NewTransaction,
    ) -> Result<TransactionRecord, Error> {
        let created_at = Utc::now();
        Ok(db.insert(|id| TransactionRecord {
            id,
            account_id,
            account_name: record.account_name,
            tx_type: record.tx_type,
            amount: record.amount,
            ref_id: record.ref_id,
            description: record.description,
            created_at,
        })?)
    }

    /// History of one account, oldest first. Empty if the account has none.
    pub fn find_by_account(
        &self,
        db: &impl Executor,
        account_id: AccountId,
    ) -> Result<Vec<TransactionRecord>, Error> {
        Ok(db.fetch_all(|record: &TransactionRecord| record.account_id == account_id)?)
    }
}
