//! Alloy RPC provider integration for log and receipt retrieval.
//!
//! [`ChainClient`] is the seam between the scan/classify engine and a node.
//! [`RpcChainClient`] talks JSON-RPC over HTTP. Tests use the in-memory
//! `MockChain` from the `test-util` feature.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{Address, B256};
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::eth::{Filter, Log, TransactionReceipt};
use eyre::{eyre, Context, Result};

use crate::types::{ChainEndpoint, LogEntry, Network, TxReceipt};

type ProviderType = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider<Ethereum>,
>;

/// One `eth_getLogs` request: a contract, a set of topics OR-combined at the
/// node, and an inclusive block range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub topics: Vec<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogQuery {
    fn to_filter(&self) -> Filter {
        Filter::new()
            .address(self.address)
            .event_signature(self.topics.clone())
            .from_block(self.from_block)
            .to_block(self.to_block)
    }
}

/// Read-only chain access used by the scanner and classifier.
///
/// Implementations must be safe to share across concurrent scans.
pub trait ChainClient: Send + Sync {
    /// Network this client is connected to.
    fn network(&self) -> Network;

    /// Current head block number (`eth_blockNumber`).
    fn block_number(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Logs matching `query` (`eth_getLogs`).
    fn logs(&self, query: &LogQuery) -> impl Future<Output = Result<Vec<LogEntry>>> + Send;

    /// Receipt for `tx_hash`, `None` if the node does not know it.
    fn receipt(&self, tx_hash: B256) -> impl Future<Output = Result<Option<TxReceipt>>> + Send;
}

/// Bounded retry with capped exponential backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per unit of work, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub base_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without sleeping.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `op` until it succeeds or the attempts are spent, returning the
    /// last error on exhaustion.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(what, attempts = attempt + 1, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt + 1 < attempts => {
                    let backoff = self.backoff(attempt);
                    tracing::debug!(
                        what,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "retrying failed RPC call"
                    );
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.wrap_err(format!("{what} failed after {attempts} attempts")));
                }
            }
        }
    }
}

/// Chain client backed by an HTTP JSON-RPC endpoint.
#[derive(Clone)]
pub struct RpcChainClient {
    network: Network,
    /// Alloy FillProvider; shared by clones of this client.
    provider: Arc<ProviderType>,
}

impl RpcChainClient {
    /// Connects to `endpoint` and checks that the node serves the expected
    /// chain. The chain id lookup is retried under `retry`.
    ///
    /// # Errors
    /// Returns error if the URL is invalid, the node stays unreachable, or the
    /// reported chain id differs from the endpoint's.
    #[tracing::instrument(skip_all, fields(network = %endpoint.network))]
    pub async fn new(endpoint: &ChainEndpoint, retry: &RetryPolicy) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(
            endpoint
                .rpc_url
                .parse()
                .wrap_err_with(|| format!("invalid RPC URL for {}", endpoint.network))?,
        );
        let provider = Arc::new(provider);

        let chain_id = retry
            .run("eth_chainId", || {
                let provider = Arc::clone(&provider);
                async move { provider.get_chain_id().await.wrap_err("eth_chainId failed") }
            })
            .await
            .wrap_err_with(|| format!("failed to reach {} RPC endpoint", endpoint.network))?;
        check_chain_id(endpoint, chain_id)?;

        tracing::info!(network = %endpoint.network, chain_id, "RPC connection successful");

        Ok(Self {
            network: endpoint.network,
            provider,
        })
    }
}

fn check_chain_id(endpoint: &ChainEndpoint, chain_id: u64) -> Result<()> {
    if chain_id != endpoint.chain_id {
        return Err(eyre!(
            "{} RPC endpoint reports chain id {}, expected {}",
            endpoint.network,
            chain_id,
            endpoint.chain_id
        ));
    }
    Ok(())
}

impl ChainClient for RpcChainClient {
    fn network(&self) -> Network {
        self.network
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .wrap_err("eth_blockNumber failed")
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        let logs = self
            .provider
            .get_logs(&query.to_filter())
            .await
            .wrap_err_with(|| {
                format!(
                    "eth_getLogs failed for blocks {}..={}",
                    query.from_block, query.to_block
                )
            })?;
        Ok(logs.iter().map(log_entry).collect())
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .wrap_err_with(|| format!("eth_getTransactionReceipt failed for {tx_hash}"))?;
        Ok(receipt.as_ref().map(tx_receipt))
    }
}

fn log_entry(log: &Log) -> LogEntry {
    LogEntry {
        address: log.address(),
        topic0: log.topics().first().copied(),
        tx_hash: log.transaction_hash,
        block_number: log.block_number,
    }
}

fn tx_receipt(receipt: &TransactionReceipt) -> TxReceipt {
    TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        status: receipt.status(),
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
        logs: receipt.inner.logs().iter().map(log_entry).collect(),
    }
}

/// Chain clients keyed by network, shared read-only by every job.
pub struct ChainClients<C> {
    by_network: HashMap<Network, C>,
}

impl<C> Default for ChainClients<C> {
    fn default() -> Self {
        Self {
            by_network: HashMap::new(),
        }
    }
}

impl<C: ChainClient> ChainClients<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `client` under its own network, replacing any previous one.
    pub fn insert(&mut self, client: C) {
        self.by_network.insert(client.network(), client);
    }

    pub fn with(mut self, client: C) -> Self {
        self.insert(client);
        self
    }

    /// Client for `network`.
    ///
    /// # Errors
    /// Returns error if no endpoint was configured for `network`.
    pub fn get(&self, network: Network) -> Result<&C> {
        self.by_network
            .get(&network)
            .ok_or_else(|| eyre!("no chain client configured for {network}"))
    }
}
