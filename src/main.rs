use anyhow::Result;
use clap::Parser;
use leaf_check::cli;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        // Config errors surface before logging is up.
        if tracing::dispatcher::has_been_set() {
            error!("{:#}", err);
        } else {
            eprintln!("error: {:#}", err);
        }
        std::process::exit(1);
    }
    Ok(())
}
