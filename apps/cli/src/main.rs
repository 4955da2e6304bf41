//! s3-antivirus CLI: scans uploaded objects with ClamAV and tags them with
//! the verdict, and keeps the shared virus definitions bucket current.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
