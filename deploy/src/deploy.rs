use std::fmt;

use ethers::types::{H160, H256, U64};

use crate::{
    chain::Chain,
    compile::Compile,
    contracts::{ArtifactStore, LOCK},
    error::Result,
    utils::{checksum, deployed_address},
};

/// A confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub name: String,
    pub address: H160,
    pub transaction_hash: H256,
    pub block_number: Option<U64>,
}

impl DeployedContract {
    pub fn address(&self) -> String {
        checksum(self.address)
    }
}

impl fmt::Display for DeployedContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Contract Address {}", self.name, self.address())
    }
}

pub struct Deploy<C, N> {
    compiler: C,
    artifacts: ArtifactStore,
    chain: N,
}

impl<C: Compile, N: Chain> Deploy<C, N> {
    pub fn new(compiler: C, artifacts: ArtifactStore, chain: N) -> Self {
        Self {
            compiler,
            artifacts,
            chain,
        }
    }

    pub fn chain(&self) -> &N {
        &self.chain
    }

    /// Compiles, resolves `Lock`, deploys it and waits for confirmation.
    /// Stops at the first failing step.
    pub async fn run(&self) -> Result<DeployedContract> {
        log::info!("compiling contracts");
        self.compiler.compile().await?;

        let factory = self.artifacts.contract_factory(LOCK)?;
        log::info!(
            "deploying {} from {:?}",
            factory.fully_qualified_name(),
            self.artifacts.root()
        );

        let transaction_hash = self.chain.submit(&factory).await?;
        let receipt = self.chain.confirm(transaction_hash).await?;
        let address = deployed_address(&receipt)?;

        Ok(DeployedContract {
            name: factory.name,
            address,
            transaction_hash,
            block_number: receipt.block_number,
        })
    }
}
