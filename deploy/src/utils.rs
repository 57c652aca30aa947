use std::time::Duration;

use ethers::{
    providers::{Http, Provider},
    signers::LocalWallet,
    types::{TransactionReceipt, H160, U64},
    utils::{hex, to_checksum},
};

use crate::error::{DeployError, Result};

/// Account #0 of the Hardhat and Anvil development nodes.
pub const DEV_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const DEFAULT_RPC: &str = "http://127.0.0.1:8545";

const PRIVATE_KEY_LEN: usize = 32;

pub fn parse_wallet(sk: &str) -> Result<LocalWallet> {
    let bytes = hex::decode(sk.strip_prefix("0x").unwrap_or(sk))
        .map_err(|e| DeployError::Configuration(format!("private key is not hex: {e}")))?;
    if bytes.len() != PRIVATE_KEY_LEN {
        return Err(DeployError::Configuration(format!(
            "private key must be {PRIVATE_KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    LocalWallet::from_bytes(&bytes)
        .map_err(|e| DeployError::Configuration(format!("invalid private key: {e}")))
}

/// Builds the HTTP provider without touching the network.
pub fn connect(rpc: &str, interval: Duration) -> Result<Provider<Http>> {
    let provider = Provider::<Http>::try_from(rpc)
        .map_err(|e| DeployError::Configuration(format!("invalid rpc url {rpc}: {e}")))?;
    Ok(provider.interval(interval))
}

/// Address assigned to a contract creation, once its receipt is in.
pub fn deployed_address(receipt: &TransactionReceipt) -> Result<H160> {
    if receipt.status == Some(U64::zero()) {
        return Err(DeployError::Deployment(format!(
            "transaction {:?} reverted in block {:?}",
            receipt.transaction_hash, receipt.block_number
        )));
    }
    receipt.contract_address.ok_or_else(|| {
        DeployError::Deployment(format!(
            "receipt of {:?} carries no contract address",
            receipt.transaction_hash
        ))
    })
}

pub fn checksum(address: H160) -> String {
    to_checksum(&address, None)
}
