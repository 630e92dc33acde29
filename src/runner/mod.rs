//! The runner reads a command file, applies each command to a fresh engine, and writes
//! the resulting account balances to a writer.
//!
//! Provides both a synchronous and an asynchronous runner implementation.
//!
mod async_runner;
mod sync_runner;

pub use async_runner::run as run_async;
pub use sync_runner::run;

use rust_decimal::Decimal;
use std::io::Write;

use crate::{
    csv_utils::write_accounts,
    db::Database,
    dto::{Command, CommandType},
    Engine, Error,
};

/// Applies one command. Rejected commands are logged and skipped.
fn apply<D: Database>(engine: &Engine<D>, command: Command) {
    let cmd_type = command.cmd_type;
    if let Err(err) = execute(engine, command) {
        if err.is_client_fault() {
            tracing::warn!(?cmd_type, error = %err, "command rejected");
        } else {
            tracing::error!(?cmd_type, error = %err, "command failed");
        }
    }
}

fn execute<D: Database>(engine: &Engine<D>, command: Command) -> Result<(), Error> {
    let amount = command
        .amount
        .ok_or(Error::Validation("amount is required"))?;
    let account = command.account.ok_or(Error::Validation("account is required"));

    match command.cmd_type {
        CommandType::Open => {
            let name = command.name.ok_or(Error::Validation("name is required"))?;
            engine.create_account(&name, amount)?;
        }
        CommandType::Deposit | CommandType::Withdrawal if amount < Decimal::ZERO => {
            return Err(Error::Validation("amount cannot be negative"));
        }
        CommandType::Deposit => {
            engine.post_transaction(account?, amount)?;
        }
        CommandType::Withdrawal => {
            engine.post_transaction(account?, -amount)?;
        }
        CommandType::Transfer => {
            let counterparty = command
                .counterparty
                .ok_or(Error::Validation("counterparty is required"))?;
            engine.transfer(account?, counterparty, amount)?;
        }
    }
    Ok(())
}

/// Writes every account, ordered by id.
fn write_balances<D, W>(engine: &Engine<D>, writer: W) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    D: Database,
    W: Write,
{
    write_accounts(writer, engine.accounts()?)?;
    Ok(())
}
