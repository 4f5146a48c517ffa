use clap::Parser;
use mediadl_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Fall back to stderr when the state directory is not writable.
    if logging::init_logging(cli.command.log_name()).is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = cli.run().await {
        eprintln!("mediadl error: {:#}", err);
        std::process::exit(1);
    }
}
