use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    chain::{ChainOptions, EthersChain},
    compile::{Compiler, CompilerKind},
    contracts::ArtifactStore,
    deploy::{Deploy, DeployedContract},
    record,
    utils::{self, DEFAULT_RPC, DEV_PRIVATE_KEY},
};

/// Compile the project and deploy the Lock contract.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CommandLine {
    /// Project root holding `contracts/` and `artifacts/`
    #[clap(long, env = "LOCK_PROJECT_ROOT", default_value = ".")]
    root: PathBuf,

    #[clap(short, long, env = "RPC_URL", default_value = DEFAULT_RPC)]
    rpc_url: String,

    /// Deployer key, defaults to the first development node account
    #[clap(
        long,
        env = "PRIVATE_KEY",
        default_value = DEV_PRIVATE_KEY,
        hide_default_value = true,
        hide_env_values = true
    )]
    private_key: String,

    #[clap(long, value_enum, env = "LOCK_COMPILER", default_value_t = CompilerKind::Solc)]
    compiler: CompilerKind,

    #[clap(
        long,
        env = "LOCK_CONFIRMATIONS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    confirmations: u64,

    /// Seconds to wait for the deployment to be confirmed
    #[clap(long = "timeout", env = "LOCK_TIMEOUT_SECS", default_value_t = 300)]
    timeout_secs: u64,

    /// Milliseconds between receipt polls
    #[clap(long = "poll-interval", env = "LOCK_POLL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Send a legacy transaction instead of EIP-1559
    #[clap(long, env = "LOCK_LEGACY")]
    legacy: bool,

    /// JSON file to merge the deployment into
    #[clap(long, env = "LOCK_RECORD")]
    record: Option<PathBuf>,
}

impl CommandLine {
    fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            legacy: self.legacy,
            confirmations: self.confirmations as usize,
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub async fn execute(self) -> Result<()> {
        self.execute_to(io::stdout()).await
    }

    /// Runs the deployment, writing the address line to `out` and nothing else.
    async fn execute_to<W: Write>(self, mut out: W) -> Result<()> {
        let options = self.chain_options();
        let wallet = utils::parse_wallet(&self.private_key)?;
        let provider = utils::connect(&self.rpc_url, options.poll_interval)?;

        let deploy = Deploy::new(
            Compiler::new(self.compiler, &self.root),
            ArtifactStore::new(self.root.join("artifacts")),
            EthersChain::new(provider, wallet, options),
        );
        let contract = deploy.run().await?;
        report(&mut out, &contract)?;

        if let Some(path) = &self.record {
            record::write_record(path, &contract, deploy.chain().chain_id())
                .context("deployment succeeded but its record was not written")?;
        }
        Ok(())
    }
}

fn report<W: Write>(out: &mut W, contract: &DeployedContract) -> io::Result<()> {
    writeln!(out, "{}", contract)?;
    out.flush()
}
