//! Windowed backward log scan.
//!
//! Walks from the head (or an explicit start block) towards a lower boundary
//! in fixed-size chunks, one `eth_getLogs` call per chunk, and keeps the first
//! log seen for each transaction until enough distinct transactions are found.
//!
//! A chunk whose call keeps failing after the retry budget is skipped; the
//! walk continues with the next older chunk. Undersampling is surfaced by the
//! caller's minimum-sample check, not here.

use std::collections::HashSet;

use alloy::primitives::{Address, B256};
use eyre::Result;

use crate::chain::{ChainClient, LogQuery, RetryPolicy};
use crate::types::LogEntry;

/// What to look for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanRequest {
    /// Contract whose logs are scanned.
    pub contract: Address,
    /// Topic hashes of interest, OR-combined in each `eth_getLogs` call.
    pub topics: Vec<B256>,
    /// Number of distinct transactions to collect.
    pub sample_target: usize,
    /// Block to start from instead of the current head.
    pub start_block: Option<u64>,
    /// Lowest block the scan may reach.
    pub min_block: u64,
    /// Maximum depth below the start block, if any.
    pub window: Option<u64>,
}

/// How to walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanSettings {
    /// Blocks per `eth_getLogs` call.
    pub chunk_size: u64,
    /// Retry budget per chunk.
    pub retry: RetryPolicy,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of one scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// One log per distinct transaction, newest chunks first.
    pub logs: Vec<LogEntry>,
    /// Block the walk started from.
    pub head: u64,
    /// Lowest block covered by the last chunk requested.
    pub lowest_block: u64,
    /// Chunks whose `eth_getLogs` call succeeded.
    pub chunks_scanned: usize,
    /// Chunks skipped after exhausting their retries.
    pub chunks_failed: usize,
}

impl ScanOutcome {
    /// Distinct transactions found.
    pub fn transaction_count(&self) -> usize {
        self.logs.len()
    }

    /// Whether the target was reached.
    pub fn is_complete(&self, request: &ScanRequest) -> bool {
        self.logs.len() >= request.sample_target
    }
}

/// Scans `request.contract` backwards for logs carrying any of `request.topics`.
///
/// Returns at most `request.sample_target` logs with pairwise distinct
/// transaction hashes. Chunks are requested in strictly decreasing block
/// order and never below the boundary `max(min_block, start - window)`.
///
/// # Errors
/// Returns error only if the head block cannot be determined; per-chunk
/// failures are absorbed.
#[tracing::instrument(
    skip_all,
    fields(contract = %request.contract, target = request.sample_target)
)]
pub async fn scan<C: ChainClient>(
    client: &C,
    request: &ScanRequest,
    settings: &ScanSettings,
) -> Result<ScanOutcome> {
    let head = match request.start_block {
        Some(block) => block,
        None => {
            settings
                .retry
                .run("eth_blockNumber", || client.block_number())
                .await?
        }
    };

    let mut outcome = ScanOutcome {
        head,
        lowest_block: head,
        ..ScanOutcome::default()
    };

    if request.sample_target == 0 || request.topics.is_empty() {
        return Ok(outcome);
    }

    let boundary = match request.window {
        Some(window) => head.saturating_sub(window).max(request.min_block),
        None => request.min_block,
    };
    if boundary > head {
        tracing::warn!(head, boundary, "scan start is below the lower boundary");
        return Ok(outcome);
    }

    let chunk_size = settings.chunk_size.max(1);
    let mut seen: HashSet<B256> = HashSet::new();
    let mut to_block = head;

    tracing::debug!(head, boundary, chunk_size, "starting log scan");

    loop {
        let from_block = to_block
            .saturating_sub(chunk_size - 1)
            .max(boundary);
        let query = LogQuery {
            address: request.contract,
            topics: request.topics.clone(),
            from_block,
            to_block,
        };

        match settings
            .retry
            .run("eth_getLogs", || client.logs(&query))
            .await
        {
            Ok(batch) => {
                outcome.chunks_scanned += 1;
                for log in batch {
                    if seen.len() >= request.sample_target {
                        break;
                    }
                    let Some(tx_hash) = log.tx_hash else {
                        continue;
                    };
                    if seen.insert(tx_hash) {
                        outcome.logs.push(log);
                    }
                }
            }
            Err(e) => {
                outcome.chunks_failed += 1;
                tracing::warn!(from_block, to_block, error = %e, "skipping chunk");
            }
        }

        outcome.lowest_block = from_block;

        if seen.len() >= request.sample_target || from_block <= boundary {
            break;
        }
        to_block = from_block - 1;
    }

    tracing::info!(
        transactions = outcome.logs.len(),
        chunks_scanned = outcome.chunks_scanned,
        chunks_failed = outcome.chunks_failed,
        lowest_block = outcome.lowest_block,
        "log scan finished"
    );

    Ok(outcome)
}
