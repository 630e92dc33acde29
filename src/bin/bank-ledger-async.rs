use std::env;
use std::error::Error;
use std::process;

use bank_ledger::{init_tracing, run_async, Config};

#[tokio::main]
async fn main() {
    if let Err(err) = run_app().await {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

async fn run_app() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();
    if !(2..=3).contains(&args.len()) {
        return Err("Usage: bank-ledger-async commands.csv [config.toml]".into());
    }
    let config = match args.get(2) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    init_tracing(&config.log_filter);

    run_async(&args[1], std::io::stdout(), &config).await
}
