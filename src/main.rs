use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod instructions;
mod keys;
mod monitoring;
mod rent;
mod rpc;
mod txs;
mod verify;
mod workflow;

use cli::args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::run(cli).await
}
