use std::{fmt::Display, future::Future, sync::Arc, time::Duration};

use ethers::{
    contract::ContractFactory,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{TransactionReceipt, H256},
};
use tokio::sync::OnceCell;

use crate::{
    contracts::ContractArtifact,
    error::{DeployError, Result},
};

pub type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

/// The network side of a deployment.
pub trait Chain {
    /// Sends the creation transaction for `artifact` with no constructor arguments.
    async fn submit(&self, artifact: &ContractArtifact) -> Result<H256>;

    /// Waits until `tx_hash` is mined with enough confirmations.
    async fn confirm(&self, tx_hash: H256) -> Result<TransactionReceipt>;
}

#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub legacy: bool,
    pub confirmations: usize,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            legacy: false,
            confirmations: 1,
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
        }
    }
}

pub struct EthersChain {
    provider: Provider<Http>,
    wallet: LocalWallet,
    client: OnceCell<Arc<Client>>,
    options: ChainOptions,
}

impl EthersChain {
    pub fn new(provider: Provider<Http>, wallet: LocalWallet, options: ChainOptions) -> Self {
        Self {
            provider,
            wallet,
            client: OnceCell::new(),
            options,
        }
    }

    /// Known once the first transaction has been submitted.
    pub fn chain_id(&self) -> Option<u64> {
        self.client.get().map(|client| client.signer().chain_id())
    }

    // The chain id is only fetched when first needed so that compilation
    // never depends on the node being reachable.
    async fn client(&self) -> Result<Arc<Client>> {
        self.client
            .get_or_try_init(|| async {
                let chain_id = self
                    .provider
                    .get_chainid()
                    .await
                    .map_err(deployment_error)?
                    .as_u64();
                log::info!(
                    "deploying from {:?} on chain {}",
                    self.wallet.address(),
                    chain_id
                );
                Ok::<_, DeployError>(Arc::new(SignerMiddleware::new(
                    self.provider.clone(),
                    self.wallet.clone().with_chain_id(chain_id),
                )))
            })
            .await
            .cloned()
    }
}

impl Chain for EthersChain {
    async fn submit(&self, artifact: &ContractArtifact) -> Result<H256> {
        let client = self.client().await?;
        let factory = ContractFactory::new(
            artifact.abi.clone(),
            artifact.bytecode.clone(),
            client.clone(),
        );
        let mut deployer = factory.deploy(()).map_err(deployment_error)?;
        if self.options.legacy {
            deployer = deployer.legacy();
        }

        let mut tx = deployer.tx;
        client
            .fill_transaction(&mut tx, None)
            .await
            .map_err(deployment_error)?;
        log::debug!("deployment transaction: {:?}", tx);

        let transaction_hash = client
            .send_transaction(tx, None)
            .await
            .map_err(deployment_error)?
            .tx_hash();
        log::info!("transaction hash:{:?}", transaction_hash);
        Ok(transaction_hash)
    }

    async fn confirm(&self, tx_hash: H256) -> Result<TransactionReceipt> {
        let pending = PendingTransaction::new(tx_hash, &self.provider)
            .interval(self.options.poll_interval)
            .confirmations(self.options.confirmations);
        let receipt = wait_confirmed(tx_hash, self.options.timeout, pending).await?;
        log::info!(
            "transaction {:?} confirmed in block {:?}",
            tx_hash,
            receipt.block_number
        );
        Ok(receipt)
    }
}

/// Bounds a pending transaction by `timeout`. A pending transaction that
/// resolves to nothing was dropped from the mempool.
pub async fn wait_confirmed<F, E>(
    tx_hash: H256,
    timeout: Duration,
    pending: F,
) -> Result<TransactionReceipt>
where
    F: Future<Output = std::result::Result<Option<TransactionReceipt>, E>>,
    E: Display,
{
    tokio::time::timeout(timeout, pending)
        .await
        .map_err(|_| DeployError::ConfirmationTimeout { tx_hash, timeout })?
        .map_err(deployment_error)?
        .ok_or_else(|| {
            DeployError::Deployment(format!(
                "transaction {:?} was dropped from the mempool",
                tx_hash
            ))
        })
}

fn deployment_error(e: impl Display) -> DeployError {
    DeployError::Deployment(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;

    use ethers::types::U64;

    #[tokio::test]
    async fn confirmation_times_out() {
        let tx_hash = H256::repeat_byte(7);
        let pending =
            future::pending::<std::result::Result<Option<TransactionReceipt>, String>>();

        let err = wait_confirmed(tx_hash, Duration::from_millis(20), pending)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::ConfirmationTimeout { tx_hash: hash, .. } if hash == tx_hash
        ));
    }

    #[tokio::test]
    async fn confirmed_receipt_is_returned() {
        let receipt = TransactionReceipt {
            transaction_hash: H256::repeat_byte(7),
            block_number: Some(U64::from(12)),
            ..Default::default()
        };
        let pending = future::ready(Ok::<_, String>(Some(receipt.clone())));

        let confirmed = wait_confirmed(H256::repeat_byte(7), Duration::from_secs(5), pending)
            .await
            .unwrap();
        assert_eq!(confirmed, receipt);
    }

    #[tokio::test]
    async fn dropped_transaction() {
        let pending = future::ready(Ok::<_, String>(None));
        let err = wait_confirmed(H256::zero(), Duration::from_secs(5), pending)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Deployment(message) if message.contains("dropped")));
    }

    #[tokio::test]
    async fn provider_errors_are_deployment_errors() {
        let pending = future::ready(Err::<Option<TransactionReceipt>, _>(
            "insufficient funds for gas * price + value".to_string(),
        ));
        let err = wait_confirmed(H256::zero(), Duration::from_secs(5), pending)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::Deployment(message) if message.contains("insufficient funds")
        ));
    }

    #[test]
    fn chain_id_is_unknown_before_connecting() {
        let provider = crate::utils::connect(crate::utils::DEFAULT_RPC, Duration::from_secs(1))
            .unwrap();
        let wallet = crate::utils::parse_wallet(crate::utils::DEV_PRIVATE_KEY).unwrap();
        let chain = EthersChain::new(provider, wallet, ChainOptions::default());
        assert_eq!(chain.chain_id(), None);
    }

    #[tokio::test]
    async fn unreachable_node_fails_at_submission() {
        let provider =
            crate::utils::connect("http://127.0.0.1:1", Duration::from_millis(10)).unwrap();
        let wallet = crate::utils::parse_wallet(crate::utils::DEV_PRIVATE_KEY).unwrap();
        let chain = EthersChain::new(provider, wallet, ChainOptions::default());
        let artifact = ContractArtifact {
            name: "Lock".to_string(),
            source_name: "contracts/Lock.sol".to_string(),
            abi: serde_json::from_str("[]").unwrap(),
            bytecode: vec![0x60, 0x80, 0x60, 0x40, 0x52].into(),
        };

        let err = chain.submit(&artifact).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Deployment(ref message) if message.contains("Connection refused")
        ));
        assert_eq!(chain.chain_id(), None);
    }
}
