use anyhow::Result;
use clap::Parser;

use timesheet_manager::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    cli::run(Cli::parse()).await
}
