use std::error::Error;
use std::io::Write;
use std::path::Path;

use super::{apply, write_balances};
use crate::{
    config::StoreConfig,
    db::MemoryDatabase,
    dto::Command,
    Config, Engine,
};

use csv_async::{AsyncReaderBuilder, Error as CsvError, Trim};
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

type Result<T, E = Box<dyn Error + Send + Sync>> = std::result::Result<T, E>;

/// Runs the ledger async on the given command file and writes balances to the provided writer.
/// Spawns two tasks:
/// * CSV reader - streams commands from the input file, deserializes them and sends them to the processor via channel.
/// * Processor - applies commands from the channel in order until the channel is closed.
///
/// # Arguments
/// * `input_path` - Path to the input CSV file containing commands
/// * `writer` - Where to write the account balances (e.g. stdout)
/// * `config` - Channel capacity and store settings
///
/// # Errors
/// Returns an error if:
/// * The input file cannot be read
/// * The CSV is malformed
/// * Writing to the output fails
pub async fn run<P, W>(input_path: P, writer: W, config: &Config) -> Result<()>
where
    P: AsRef<Path>,
    W: Write,
{
    let (tx, rx) = mpsc::channel(config.runner.channel_capacity.max(1));
    let input_path = input_path.as_ref().to_owned();

    let reader_handle = tokio::spawn(read_commands(input_path, tx));
    let processor_handle = tokio::spawn(process_commands(rx, config.store.clone()));

    // Wait for reader to finish and propagate any errors
    reader_handle.await??;

    let engine = processor_handle.await?;

    write_balances(&engine, writer)
}

/// Reads and deserializes commands from a CSV file.
/// Returns them through the provided channel.
async fn read_commands(
    input_path: impl AsRef<Path> + Send,
    tx: mpsc::Sender<Command>,
) -> Result<(), CsvError> {
    let file = File::open(input_path).await?;
    let mut csv_reader = AsyncReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .create_deserializer(file);

    let mut records = csv_reader.deserialize::<Command>();
    while let Some(result) = records.next().await {
        match result {
            Ok(command) => {
                if tx.send(command).await.is_err() {
                    // Receiver dropped, exit gracefully
                    break;
                }
            }
            // CSV parsing errors are critical - propagate them
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Applies commands received through the channel.
/// Returns the engine once the channel is closed by the reader.
async fn process_commands(
    mut rx: mpsc::Receiver<Command>,
    store: StoreConfig,
) -> Engine<MemoryDatabase> {
    let engine = Engine::new(MemoryDatabase::from_config(&store));
    while let Some(command) = rx.recv().await {
        apply(&engine, command);
    }
    engine
}
