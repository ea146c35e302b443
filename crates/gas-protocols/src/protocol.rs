//! Declarative description of a protocol's benchmarked operations.

use alloy::primitives::{Address, B256};
use gas_analysis::classify::MatchPolicy;
use gas_data::store::BenchmarkRecord;
use gas_data::types::{EventSignature, Network, TopicEntry};

/// Over-fetch factor for contracts where most matching logs come from
/// account-abstraction or batched transactions that are later rejected.
pub const DEFAULT_OVERSAMPLE: usize = 5;

/// Event pattern a receipt must show to count as one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPattern {
    /// These events, in order, and nothing else.
    Sequence(Vec<EventSignature>),
    /// Every `required` event from its emitter and no `forbidden` one.
    Topics {
        required: Vec<(Address, EventSignature)>,
        forbidden: Vec<(Address, EventSignature)>,
    },
}

impl EventPattern {
    pub fn to_policy(&self) -> MatchPolicy {
        match self {
            EventPattern::Sequence(events) => MatchPolicy::exact(events),
            EventPattern::Topics {
                required,
                forbidden,
            } => MatchPolicy::topic_set(entries(required), entries(forbidden)),
        }
    }
}

fn entries(pairs: &[(Address, EventSignature)]) -> Vec<TopicEntry> {
    pairs
        .iter()
        .map(|(address, event)| TopicEntry::new(*address, event))
        .collect()
}

/// One benchmarked operation (e.g. Railgun `shield_erc20`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationSpec {
    /// Key under which the operation is stored in the report.
    pub name: &'static str,
    pub network: Network,
    /// Contract whose logs are scanned.
    pub contract: Address,
    /// Events requested from `eth_getLogs` (OR-combined).
    pub scan_events: Vec<EventSignature>,
    pub pattern: EventPattern,
    /// Block the one-week window is measured back from, instead of the
    /// current head. Set for contracts that stopped emitting events.
    pub start_block: Option<u64>,
    /// Distinct transactions scanned per wanted sample.
    pub oversample: usize,
}

impl OperationSpec {
    pub fn scan_topics(&self) -> Vec<B256> {
        let mut topics: Vec<B256> = Vec::with_capacity(self.scan_events.len());
        for topic in self.scan_events.iter().map(EventSignature::topic) {
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }

    pub fn policy(&self) -> MatchPolicy {
        self.pattern.to_policy()
    }

    /// Distinct transactions to scan for when `max_samples` are wanted.
    pub fn scan_target(&self, max_samples: usize) -> usize {
        max_samples.saturating_mul(self.oversample.max(1))
    }
}

/// A protocol version and its operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Protocol {
    pub name: &'static str,
    pub version: &'static str,
    pub operations: Vec<OperationSpec>,
}

impl Protocol {
    /// Report key, `"<name>_<version>"`.
    pub fn key(&self) -> String {
        BenchmarkRecord::protocol_key(self.name, self.version)
    }

    /// Networks this protocol needs an endpoint for.
    pub fn networks(&self) -> Vec<Network> {
        let mut networks: Vec<Network> = Vec::new();
        for op in &self.operations {
            if !networks.contains(&op.network) {
                networks.push(op.network);
            }
        }
        networks
    }
}
