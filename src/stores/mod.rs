//! Passive repositories over an [`Executor`](crate::db::Executor):
//! - account records and their balances ([`AccountsStore`])
//! - the append-only transaction ledger ([`TransactionsStore`])
//!
//! Neither store checks business rules. Both work the same whether handed the database
//! itself or an open unit of work.

mod accounts;
mod transactions;

pub use accounts::{Account, AccountId, AccountsStore};
pub use transactions::{NewTransaction, TransactionRecord, TransactionType, TransactionsStore};
