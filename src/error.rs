//! Errors surfaced by the ledger engine.
//!
//! Client faults:
//! - a caller-supplied value breaks a precondition ([`Error::Validation`])
//! - a referenced account does not exist ([`Error::AccountNotFound`])
//! - a debit exceeds the available balance ([`Error::InsufficientFunds`])
//!
//! Server faults come from the storage layer ([`Error::Persistence`]). In every case the
//! unit of work in progress has already been rolled back.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::DbError;
use crate::stores::AccountId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(&'static str),
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },
    #[error("persistence failure: {0}")]
    Persistence(#[from] DbError),
}

impl Error {
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, Error::Persistence(_))
    }
}
