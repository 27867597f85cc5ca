use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use litedb::repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "litedb",
    version = VERSION,
    about = "Tiny persistent single-table database."
)]
struct Cli {
    /// Path to the database file. Created if it does not exist.
    file: PathBuf,

    /// Where diagnostic logs are appended, keeping the REPL output clean.
    #[arg(long, env = "LITEDB_LOG_FILE", default_value = "litedb.log")]
    log_file: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let log_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&cli.log_file)
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = repl::start(&cli.file) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
