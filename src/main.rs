use cloudseqs::cli::Cli;
use cloudseqs::pipeline;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();

    let args = Cli::parse().args()?;
    pipeline::align(&args, None, None)?;

    Ok(())
}
