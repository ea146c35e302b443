//! In-memory chain for tests, behind the `test-util` feature.
//!
//! Serves `eth_getLogs` from the logs of the receipts it was seeded with,
//! records every request, and can inject transient failures per block range
//! or per receipt.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::B256;
use eyre::{eyre, Result};

use crate::chain::{ChainClient, LogQuery};
use crate::types::{LogEntry, Network, TxReceipt};

#[derive(Default)]
struct Calls {
    log_queries: Vec<LogQuery>,
    receipt_requests: Vec<B256>,
    block_number_requests: usize,
}

#[derive(Default)]
struct Failures {
    /// Remaining failures keyed by `(from_block, to_block)`; `None` fails forever.
    log_ranges: HashMap<(u64, u64), Option<u32>>,
    /// Remaining failures per receipt hash; `None` fails forever.
    receipts: HashMap<B256, Option<u32>>,
}

/// Chain whose state is a fixed set of receipts.
pub struct MockChain {
    network: Network,
    head: u64,
    logs: Vec<LogEntry>,
    receipts: HashMap<B256, TxReceipt>,
    failures: Mutex<Failures>,
    calls: Mutex<Calls>,
}

impl MockChain {
    pub fn new(network: Network, head: u64) -> Self {
        Self {
            network,
            head,
            logs: Vec::new(),
            receipts: HashMap::new(),
            failures: Mutex::new(Failures::default()),
            calls: Mutex::new(Calls::default()),
        }
    }

    /// Adds a transaction: its receipt becomes fetchable and its logs are
    /// served by `eth_getLogs`, stamped with the receipt's hash and block.
    pub fn with_receipt(mut self, receipt: TxReceipt) -> Self {
        for log in &receipt.logs {
            self.logs.push(LogEntry {
                tx_hash: Some(receipt.tx_hash),
                block_number: receipt.block_number,
                ..log.clone()
            });
        }
        self.receipts.insert(receipt.tx_hash, receipt);
        self
    }

    /// Adds a raw log without a backing receipt.
    pub fn with_log(mut self, log: LogEntry) -> Self {
        self.logs.push(log);
        self
    }

    /// Makes `eth_getLogs` over exactly `from..=to` fail `times` times.
    pub fn fail_logs(self, from_block: u64, to_block: u64, times: u32) -> Self {
        self.lock_failures()
            .log_ranges
            .insert((from_block, to_block), Some(times));
        self
    }

    /// Makes `eth_getLogs` over exactly `from..=to` always fail.
    pub fn break_logs(self, from_block: u64, to_block: u64) -> Self {
        self.lock_failures()
            .log_ranges
            .insert((from_block, to_block), None);
        self
    }

    /// Makes the receipt fetch for `tx_hash` fail `times` times.
    pub fn fail_receipt(self, tx_hash: B256, times: u32) -> Self {
        self.lock_failures().receipts.insert(tx_hash, Some(times));
        self
    }

    /// Makes the receipt fetch for `tx_hash` always fail.
    pub fn break_receipt(self, tx_hash: B256) -> Self {
        self.lock_failures().receipts.insert(tx_hash, None);
        self
    }

    /// Every `eth_getLogs` query received, in order.
    pub fn log_queries(&self) -> Vec<LogQuery> {
        self.lock_calls().log_queries.clone()
    }

    /// Every receipt hash requested, in order.
    pub fn receipt_requests(&self) -> Vec<B256> {
        self.lock_calls().receipt_requests.clone()
    }

    pub fn block_number_requests(&self) -> usize {
        self.lock_calls().block_number_requests
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, Failures> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_failure<K: std::hash::Hash + Eq>(
        table: &mut HashMap<K, Option<u32>>,
        key: &K,
    ) -> bool {
        match table.get_mut(key) {
            Some(None) => true,
            Some(Some(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl ChainClient for MockChain {
    fn network(&self) -> Network {
        self.network
    }

    async fn block_number(&self) -> Result<u64> {
        self.lock_calls().block_number_requests += 1;
        Ok(self.head)
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        self.lock_calls().log_queries.push(query.clone());

        if query.from_block > query.to_block {
            return Err(eyre!(
                "invalid block range {}..={}",
                query.from_block,
                query.to_block
            ));
        }
        let range = (query.from_block, query.to_block);
        if Self::take_failure(&mut self.lock_failures().log_ranges, &range) {
            return Err(eyre!("injected eth_getLogs failure for {range:?}"));
        }

        Ok(self
            .logs
            .iter()
            .filter(|log| log.address == query.address)
            .filter(|log| {
                query.topics.is_empty()
                    || log.topic0.is_some_and(|topic| query.topics.contains(&topic))
            })
            .filter(|log| {
                log.block_number
                    .is_some_and(|bn| bn >= query.from_block && bn <= query.to_block)
            })
            .cloned()
            .collect())
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>> {
        self.lock_calls().receipt_requests.push(tx_hash);
        if Self::take_failure(&mut self.lock_failures().receipts, &tx_hash) {
            return Err(eyre!("injected receipt failure for {tx_hash}"));
        }
        Ok(self.receipts.get(&tx_hash).cloned())
    }
}
