mod chain;
mod command_line;
mod compile;
mod contracts;
mod deploy;
mod error;
mod record;
mod utils;

use anyhow::Result;
use clap::Parser;
use command_line::CommandLine;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let cmd = CommandLine::parse();
    cmd.execute().await
}
