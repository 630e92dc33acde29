//! Reading command files and writing balance files.

use std::io::Write;
use std::path::Path;

use crate::dto::{AccountRow, Command};
use crate::stores::Account;

/// Streams commands from a CSV file with a header row. Fields are trimmed.
pub fn read_commands<P>(path: P) -> csv::Result<impl Iterator<Item = csv::Result<Command>>>
where
    P: AsRef<Path>,
{
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?
        .into_deserialize())
}

/// Writes one balance row per account, in the order given.
pub fn write_accounts<W>(writer: W, accounts: impl IntoIterator<Item = Account>) -> csv::Result<()>
where
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for account in accounts {
        wtr.serialize(AccountRow::from(account))?;
    }
    wtr.flush()?;
    Ok(())
}
