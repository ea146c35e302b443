//! gas-data crate
//!
//! Chain access and persistence for the gas benchmarks: domain types, the
//! JSON-RPC chain client, the windowed log scanner and the report store.

pub mod chain;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod scanner;
pub mod store;
pub mod types;

pub use chain::{ChainClient, ChainClients, LogQuery, RetryPolicy, RpcChainClient};
pub use scanner::{scan, ScanOutcome, ScanRequest, ScanSettings};
pub use store::{BenchmarkRecord, ReportStore};
pub use types::{
    ChainEndpoint, EventSignature, GasMetrics, GasValue, LogEntry, Network, TopicEntry, TxReceipt,
};
