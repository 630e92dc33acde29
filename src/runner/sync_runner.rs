use std::error::Error;
use std::io::Write;
use std::path::Path;

use super::{apply, write_balances};
use crate::{csv_utils::read_commands, db::MemoryDatabase, Config, Engine};

/// Runs the ledger on the given command file and writes balances to the provided writer.
///
/// # Arguments
/// * `input_path` - Path to the input CSV file containing commands
/// * `writer` - Where to write the account balances (e.g. stdout)
/// * `config` - Store settings for the engine's database
///
/// # Errors
/// Returns an error if:
/// * The input file cannot be read
/// * The CSV is malformed
/// * Writing to the output fails
pub fn run<P, W>(input_path: P, writer: W, config: &Config) -> Result<(), Box<dyn Error>>
where
    P: AsRef<Path>,
    W: Write,
{
    let engine = Engine::new(MemoryDatabase::from_config(&config.store));

    let commands_iter = read_commands(input_path)?;
    for command in commands_iter {
        // CSV parsing errors are critical - propagate them
        apply(&engine, command?);
    }

    write_balances(&engine, writer).map_err(|err| err as Box<dyn Error>)
}
