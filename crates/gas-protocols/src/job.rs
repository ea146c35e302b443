//! Benchmark jobs: scan, classify and aggregate every operation of a protocol.
//!
//! Protocols, and operations within a protocol, run concurrently on the
//! caller's runtime. A failing operation is reported as an error under its own
//! name and never affects its siblings.

use std::collections::BTreeMap;

use eyre::Result;
use futures::future::join_all;
use gas_analysis::classify::{classify, DEFAULT_MAX_IN_FLIGHT};
use gas_analysis::metrics::{aggregate, ensure_min_samples};
use gas_data::chain::{ChainClient, ChainClients};
use gas_data::scanner::{scan, ScanRequest, ScanSettings};
use gas_data::store::BenchmarkRecord;
use gas_data::types::GasMetrics;

use crate::protocol::{OperationSpec, Protocol};

/// Sampling and RPC settings shared by every job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchmarkSettings {
    /// Accepted receipts below which an operation is reported as failed.
    pub min_samples: usize,
    /// Accepted receipts after which classification stops.
    pub max_samples: usize,
    /// Chunking and retry budget; the retry policy also applies to receipts.
    pub scan: ScanSettings,
    /// Receipt requests in flight per operation.
    pub max_in_flight: usize,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            min_samples: 5,
            max_samples: 30,
            scan: ScanSettings::default(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Outcome of one protocol job.
#[derive(Debug)]
pub struct ProtocolReport {
    /// `"<name>_<version>"`.
    pub key: String,
    pub operations: BTreeMap<String, Result<GasMetrics>>,
}

impl ProtocolReport {
    /// Writes successful operations into `record`. Failed operations leave
    /// whatever `record` already holds for them.
    ///
    /// Returns the number of operations written.
    pub fn merge_into(&self, record: &mut BenchmarkRecord) -> usize {
        let mut written = 0;
        for (operation, result) in &self.operations {
            if let Ok(metrics) = result {
                record.upsert(&self.key, operation, *metrics);
                written += 1;
            }
        }
        written
    }

    /// Failed operations with their error.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &eyre::Report)> {
        self.operations
            .iter()
            .filter_map(|(operation, result)| match result {
                Ok(_) => None,
                Err(e) => Some((operation.as_str(), e)),
            })
    }
}

/// Benchmarks one operation.
///
/// # Errors
/// Returns error if no client is configured for the operation's network, the
/// scan cannot determine its start block, or fewer than
/// `settings.min_samples` receipts match.
#[tracing::instrument(skip_all, fields(protocol = %protocol_key, operation = op.name, network = %op.network))]
pub async fn run_operation<C: ChainClient>(
    protocol_key: &str,
    op: &OperationSpec,
    clients: &ChainClients<C>,
    settings: &BenchmarkSettings,
) -> Result<GasMetrics> {
    let client = clients.get(op.network)?;

    let request = ScanRequest {
        contract: op.contract,
        topics: op.scan_topics(),
        sample_target: op.scan_target(settings.max_samples),
        start_block: op.start_block,
        min_block: 0,
        window: Some(op.network.block_window()),
    };
    let scanned = scan(client, &request, &settings.scan).await?;
    tracing::info!(
        candidates = scanned.transaction_count(),
        head = scanned.head,
        lowest_block = scanned.lowest_block,
        chunks_failed = scanned.chunks_failed,
        "scan finished"
    );

    let classified = classify(
        client,
        &scanned.logs,
        &op.policy(),
        settings.max_samples,
        &settings.scan.retry,
        settings.max_in_flight,
    )
    .await;

    ensure_min_samples(
        protocol_key,
        op.name,
        classified.accepted.len(),
        settings.min_samples,
    )?;

    let metrics = aggregate(&classified.accepted);
    tracing::info!(
        samples = classified.accepted.len(),
        average_gas_used = %metrics.average_gas_used,
        "operation benchmarked"
    );
    Ok(metrics)
}

/// Benchmarks every operation of `protocol` concurrently.
#[tracing::instrument(skip_all, fields(protocol = protocol.name, version = protocol.version))]
pub async fn run_protocol<C: ChainClient>(
    protocol: &Protocol,
    clients: &ChainClients<C>,
    settings: &BenchmarkSettings,
) -> ProtocolReport {
    let key = protocol.key();

    let results = join_all(
        protocol
            .operations
            .iter()
            .map(|op| run_operation(&key, op, clients, settings)),
    )
    .await;

    let mut operations = BTreeMap::new();
    for (op, result) in protocol.operations.iter().zip(results) {
        if let Err(e) = &result {
            tracing::error!(protocol = %key, operation = op.name, error = %e, "operation failed");
        }
        operations.insert(op.name.to_string(), result);
    }

    ProtocolReport { key, operations }
}

/// Benchmarks every protocol concurrently, returning reports in input order.
pub async fn run_all<C: ChainClient>(
    protocols: &[Protocol],
    clients: &ChainClients<C>,
    settings: &BenchmarkSettings,
) -> Vec<ProtocolReport> {
    join_all(
        protocols
            .iter()
            .map(|protocol| run_protocol(protocol, clients, settings)),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EventPattern, DEFAULT_OVERSAMPLE};
    use alloy::primitives::{address, Address, B256, U256};
    use gas_data::chain::RetryPolicy;
    use gas_data::mock::MockChain;
    use gas_data::types::{EventSignature, GasValue, LogEntry, Network, TxReceipt};

    const POOL: Address = address!("00000000000000000000000000000000000000aa");
    const DEPOSIT: EventSignature = EventSignature::new("Deposit", &["uint256"]);
    const NOTE: EventSignature = EventSignature::new("Note", &["bytes"]);

    fn settings(min_samples: usize, max_samples: usize) -> BenchmarkSettings {
        BenchmarkSettings {
            min_samples,
            max_samples,
            scan: ScanSettings {
                chunk_size: 100,
                retry: RetryPolicy::immediate(2),
            },
            max_in_flight: 4,
        }
    }

    fn deposit_receipt(n: u8, gas_used: u64) -> TxReceipt {
        let log = |event: &EventSignature| LogEntry {
            address: POOL,
            topic0: Some(event.topic()),
            tx_hash: None,
            block_number: None,
        };
        TxReceipt {
            tx_hash: B256::with_last_byte(n),
            block_number: Some(1_000 - u64::from(n)),
            status: true,
            gas_used,
            effective_gas_price: 10,
            logs: vec![log(&DEPOSIT), log(&NOTE)],
        }
    }

    fn protocol(network: Network) -> Protocol {
        Protocol {
            name: "pool",
            version: "1",
            operations: vec![OperationSpec {
                name: "shield_eth",
                network,
                contract: POOL,
                scan_events: vec![DEPOSIT],
                pattern: EventPattern::Sequence(vec![DEPOSIT, NOTE]),
                start_block: None,
                oversample: DEFAULT_OVERSAMPLE,
            }],
        }
    }

    #[tokio::test]
    async fn run_protocol_aggregates_matching_receipts() {
        let chain = MockChain::new(Network::Ethereum, 1_000)
            .with_receipt(deposit_receipt(1, 100))
            .with_receipt(deposit_receipt(2, 200))
            .with_receipt(deposit_receipt(3, 300));
        let clients = ChainClients::new().with(chain);

        let report = run_protocol(&protocol(Network::Ethereum), &clients, &settings(3, 30)).await;

        assert_eq!(report.key, "pool_1");
        let metrics = report.operations["shield_eth"]
            .as_ref()
            .expect("operation should succeed");
        assert_eq!(metrics.average_gas_used, GasValue::Amount(U256::from(200)));
        assert_eq!(metrics.average_tx_fee, GasValue::Amount(U256::from(2_000)));
    }

    #[tokio::test]
    async fn too_few_samples_fail_the_operation() {
        let chain = MockChain::new(Network::Ethereum, 1_000).with_receipt(deposit_receipt(1, 100));
        let clients = ChainClients::new().with(chain);

        let report = run_protocol(&protocol(Network::Ethereum), &clients, &settings(2, 30)).await;

        let err = report.operations["shield_eth"]
            .as_ref()
            .expect_err("one sample is below the minimum");
        assert!(err.to_string().contains("found 1"));
        assert_eq!(report.failures().count(), 1);
    }

    #[tokio::test]
    async fn missing_network_client_fails_only_that_protocol() {
        let chain = MockChain::new(Network::Ethereum, 1_000)
            .with_receipt(deposit_receipt(1, 100))
            .with_receipt(deposit_receipt(2, 100));
        let clients = ChainClients::new().with(chain);
        let protocols = vec![protocol(Network::Scroll), protocol(Network::Ethereum)];

        let reports = run_all(&protocols, &clients, &settings(2, 30)).await;

        assert!(reports[0].operations["shield_eth"].is_err());
        assert!(reports[1].operations["shield_eth"].is_ok());
    }

    #[tokio::test]
    async fn merge_keeps_previous_value_of_failed_operation() {
        let chain = MockChain::new(Network::Ethereum, 1_000).with_receipt(deposit_receipt(1, 100));
        let clients = ChainClients::new().with(chain);
        let report = run_protocol(&protocol(Network::Ethereum), &clients, &settings(5, 30)).await;

        let previous = GasMetrics {
            average_gas_used: GasValue::Amount(U256::from(42)),
            average_gas_price: GasValue::Amount(U256::from(1)),
            average_tx_fee: GasValue::Amount(U256::from(42)),
        };
        let mut record = BenchmarkRecord::new();
        record.upsert("pool_1", "shield_eth", previous);

        assert_eq!(report.merge_into(&mut record), 0);
        assert_eq!(record.get("pool_1", "shield_eth"), Some(&previous));
    }

    #[tokio::test]
    async fn start_block_moves_the_weekly_window_back() {
        let newer = TxReceipt {
            block_number: Some(400_000),
            ..deposit_receipt(3, 900)
        };
        let chain = MockChain::new(Network::Ethereum, 500_000)
            .with_receipt(deposit_receipt(1, 100))
            .with_receipt(deposit_receipt(2, 300))
            .with_receipt(newer);
        let mut protocol = protocol(Network::Ethereum);
        protocol.operations[0].start_block = Some(1_000);
        let clients = ChainClients::new().with(chain);

        let report = run_protocol(&protocol, &clients, &settings(2, 30)).await;
        let metrics = report.operations["shield_eth"]
            .as_ref()
            .expect("samples below the start block are found");
        assert_eq!(metrics.average_gas_used, GasValue::Amount(U256::from(200)));

        let chain = clients.get(Network::Ethereum).expect("client registered");
        assert_eq!(chain.block_number_requests(), 0);
        let queries = chain.log_queries();
        assert_eq!(queries.iter().map(|q| q.to_block).max(), Some(1_000));
        assert_eq!(queries.iter().map(|q| q.from_block).min(), Some(0));
    }
}
