use std::{path::PathBuf, time::Duration};

use ethers::types::H256;
use thiserror::Error;

/// Every way a deployment run can fail. All of them are fatal.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("compilation failed: {0}")]
    Compilation(String),

    #[error("artifact for contract {0} not found, run the compile task first or check the name")]
    ContractNotFound(String),

    #[error("there are multiple artifacts for contract {name}, use one of the fully qualified names: {}", .candidates.join(", "))]
    AmbiguousContract {
        name: String,
        candidates: Vec<String>,
    },

    #[error("contract {0} is abstract or an interface and can't be deployed")]
    ContractNotDeployable(String),

    #[error("contract {name} is missing links for the following libraries: {}", .libraries.join(", "))]
    UnlinkedLibraries {
        name: String,
        libraries: Vec<String>,
    },

    #[error("invalid artifact {path:?}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("deployment failed: {0}")]
    Deployment(String),

    #[error("deployment transaction {tx_hash:?} was not confirmed within {timeout:?}")]
    ConfirmationTimeout { tx_hash: H256, timeout: Duration },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("error writing deployment record {path:?}: {reason}")]
    Record { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, DeployError>;
