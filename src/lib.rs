mod config;
mod csv_utils;
pub mod db;
mod dto;
mod engine;
mod error;
mod logging;
mod runner;
mod stores;

pub use config::{Config, ConfigError, RunnerConfig, StoreConfig};
pub use dto::{AccountRow, Command, CommandType};
pub use engine::Engine;
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use runner::{run, run_async};
pub use stores::{
    Account, AccountId, AccountsStore, NewTransaction, TransactionRecord, TransactionType,
    TransactionsStore,
};
