//! Shared test helpers and utilities.
//!
//! Factory functions for receipts, logs and run settings used across the
//! integration tests. Everything runs against [`MockChain`]; no RPC.

#![allow(dead_code)]

use alloy::primitives::{address, Address, B256};
use gas_data::chain::RetryPolicy;
use gas_data::mock::MockChain;
use gas_data::scanner::ScanSettings;
use gas_data::types::{EventSignature, LogEntry, Network, TxReceipt};
use gas_protocols::BenchmarkSettings;

/// ERC-20 token emitting incidental `Transfer` logs.
pub const TOKEN: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

pub const ERC20_TRANSFER: EventSignature =
    EventSignature::new("Transfer", &["address", "address", "uint256"]);

/// Flat effective gas price used by [`receipt`]: 2 gwei.
pub const GAS_PRICE: u128 = 2_000_000_000;

/// Transaction hash derived from `n`.
pub fn tx_hash(n: u64) -> B256 {
    B256::left_padding_from(&n.to_be_bytes())
}

/// A log emitted by `address` with `event` as topic0.
pub fn log(address: Address, event: &EventSignature) -> LogEntry {
    LogEntry {
        address,
        topic0: Some(event.topic()),
        tx_hash: None,
        block_number: None,
    }
}

/// A successful receipt at [`GAS_PRICE`].
///
/// # Arguments
/// * `n` - Seed for the transaction hash
/// * `block` - Block containing the transaction
/// * `gas_used` - Gas used by the transaction
/// * `logs` - Emitted logs, in order
pub fn receipt(n: u64, block: u64, gas_used: u64, logs: Vec<LogEntry>) -> TxReceipt {
    TxReceipt {
        tx_hash: tx_hash(n),
        block_number: Some(block),
        status: true,
        gas_used,
        effective_gas_price: GAS_PRICE,
        logs,
    }
}

/// Same as [`receipt`] but reverted.
pub fn reverted(n: u64, block: u64, gas_used: u64, logs: Vec<LogEntry>) -> TxReceipt {
    TxReceipt {
        status: false,
        ..receipt(n, block, gas_used, logs)
    }
}

/// Seeds a mock chain with `receipts`.
pub fn chain(network: Network, head: u64, receipts: Vec<TxReceipt>) -> MockChain {
    receipts
        .into_iter()
        .fold(MockChain::new(network, head), MockChain::with_receipt)
}

/// Settings with 1000-block chunks and retries that never sleep.
pub fn test_settings(min_samples: usize, max_samples: usize) -> BenchmarkSettings {
    BenchmarkSettings {
        min_samples,
        max_samples,
        scan: ScanSettings {
            chunk_size: 1_000,
            retry: RetryPolicy::immediate(3),
        },
        max_in_flight: 4,
    }
}
