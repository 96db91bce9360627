//! Porewatch CLI: `run` processes an input directory, `worker` serves batches to a parent run.

use anyhow::Result;
use clap::Parser;
use porewatch::engine::arg_parser::{Cli, Commands};
use porewatch::engine::handle_cli;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    let is_worker = matches!(cli.command, Commands::Worker);
    handle_cli(&cli)?;
    if !is_worker {
        log::debug!("Total time: {:?}", start_time.elapsed());
    }
    Ok(())
}
