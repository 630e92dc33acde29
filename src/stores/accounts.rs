use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::{Executor, Row, Table, Tables};
use crate::Error;

/// Store-assigned account identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub balance: Decimal,
}

impl Row for Account {
    const TABLE: &'static str = "accounts";

    fn id(&self) -> u64 {
        self.id.0
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.accounts
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.accounts
    }
}

/// Account records keyed by id.
///
/// Writes whatever balance it is given; keeping balances non-negative is the engine's job.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccountsStore;

impl AccountsStore {
    pub fn new() -> Self {
        Self
    }

    pub fn find_by_id(&self, db: &impl Executor, id: AccountId) -> Result<Account, Error> {
        db.fetch_one(|account: &Account| account.id == id)?
            .ok_or(Error::AccountNotFound(id))
    }

    /// Like [`AccountsStore::find_by_id`], but keeps the row locked for the rest of the
    /// enclosing unit of work.
    pub fn find_by_id_for_update(
        &self,
        db: &impl Executor,
        id: AccountId,
    ) -> Result<Account, Error> {
        db.fetch_for_update::<Account>(id.0)?
            .ok_or(Error::AccountNotFound(id))
    }

    pub fn insert(&self, db: &impl Executor, name: &str, balance: Decimal) -> Result<Account, Error> {
        Ok(db.insert(|id| Account {
            id: AccountId(id),
            name: name.to_string(),
            balance,
        })?)
    }

    pub fn update_balance(
        &self,
        db: &impl Executor,
        id: AccountId,
        balance: Decimal,
    ) -> Result<(), Error> {
        db.update(id.0, |account: &mut Account| account.balance = balance)?;
        Ok(())
    }

    /// All accounts, ordered by id.
    pub fn list(&self, db: &impl Executor) -> Result<Vec<Account>, Error> {
        Ok(db.fetch_all(|_: &Account| true)?)
    }
}
