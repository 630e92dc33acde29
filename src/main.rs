use std::env;
use std::error::Error;
use std::io;
use std::process;

use bank_ledger::{init_tracing, run, Config};

fn main() {
    if let Err(err) = run_app() {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run_app() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    if !(2..=3).contains(&args.len()) {
        return Err("Usage: cargo run -- commands.csv [config.toml]".into());
    }
    let config = match args.get(2) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    init_tracing(&config.log_filter);

    run(&args[1], io::stdout(), &config)
}
