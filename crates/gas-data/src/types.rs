//! Type definitions shared by the scanner, classifier and report store.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{keccak256, Address, B256, U256};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds in the fixed calendar period a scan window covers.
fn window_period_secs() -> u64 {
    chrono::Duration::weeks(1).num_seconds().unsigned_abs()
}

/// Networks the benchmarks sample from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Ethereum mainnet.
    Ethereum,
    /// Scroll roll-up (L2).
    Scroll,
}

impl Network {
    /// EIP-155 chain id.
    pub const fn chain_id(self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::Scroll => 534_352,
        }
    }

    /// Average block time in seconds.
    pub const fn block_time_secs(self) -> u64 {
        match self {
            Network::Ethereum => 12,
            Network::Scroll => 3,
        }
    }

    /// Number of blocks produced in one week at the average block time.
    pub fn block_window(self) -> u64 {
        window_period_secs() / self.block_time_secs()
    }

    /// Environment variable carrying the RPC URL for this network.
    pub const fn rpc_env_var(self) -> &'static str {
        match self {
            Network::Ethereum => "ETH_RPC_URL",
            Network::Scroll => "SCROLL_RPC_URL",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Ethereum => f.write_str("ethereum"),
            Network::Scroll => f.write_str("scroll"),
        }
    }
}

/// One configured RPC endpoint. Built once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainEndpoint {
    /// Network served by this endpoint.
    pub network: Network,
    /// Expected chain id, checked against the node on connect.
    pub chain_id: u64,
    /// HTTP JSON-RPC URL.
    pub rpc_url: String,
}

impl ChainEndpoint {
    pub fn new(network: Network, rpc_url: impl Into<String>) -> Self {
        Self {
            network,
            chain_id: network.chain_id(),
            rpc_url: rpc_url.into(),
        }
    }
}

/// A contract event identified by name and canonical parameter types.
///
/// Only used to derive the topic hash; tuple parameters are written in their
/// canonical form, e.g. `(uint8,address,uint256)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventSignature {
    /// Event name, e.g. `Transfer`.
    pub name: &'static str,
    /// Canonical parameter types in declaration order.
    pub params: &'static [&'static str],
}

impl EventSignature {
    pub const fn new(name: &'static str, params: &'static [&'static str]) -> Self {
        Self { name, params }
    }

    /// Canonical signature string, e.g. `Transfer(address,address,uint256)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }

    /// Topic hash (`topic0`) of the event: keccak256 of the canonical signature.
    pub fn topic(&self) -> B256 {
        keccak256(self.signature().as_bytes())
    }
}

/// One emitted event as returned by `eth_getLogs` or inside a receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Contract that emitted the log.
    pub address: Address,
    /// Event topic hash; `None` for anonymous events.
    pub topic0: Option<B256>,
    /// Transaction that emitted the log (absent on pending logs).
    pub tx_hash: Option<B256>,
    /// Block containing the log (absent on pending logs).
    pub block_number: Option<u64>,
}

impl LogEntry {
    /// Whether this log was emitted by `address` with topic `topic`.
    pub fn is(&self, address: Address, topic: B256) -> bool {
        self.address == address && self.topic0 == Some(topic)
    }
}

/// Outcome of one transaction, reduced to what the benchmarks need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: B256,
    /// Block containing the transaction.
    pub block_number: Option<u64>,
    /// Execution status (`true` = success).
    pub status: bool,
    /// Gas used by the transaction.
    pub gas_used: u64,
    /// Effective gas price in Wei.
    pub effective_gas_price: u128,
    /// Logs emitted by the transaction, in emission order.
    pub logs: Vec<LogEntry>,
}

impl TxReceipt {
    /// Fee paid in Wei (`gas_used * effective_gas_price`).
    pub fn tx_fee(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// A `(contract, topic)` pair matched against receipt logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TopicEntry {
    /// Emitting contract.
    pub address: Address,
    /// Event topic hash.
    pub topic: B256,
}

impl TopicEntry {
    pub fn new(address: Address, event: &EventSignature) -> Self {
        Self {
            address,
            topic: event.topic(),
        }
    }
}

/// A gas quantity, or the explicit marker that no sample was available.
///
/// Serialized as a decimal string with an `n` suffix (`"21000n"`) so values
/// wider than 64 bits survive a JSON round trip; the marker is `"no-data"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GasValue {
    Amount(U256),
    NoData,
}

impl GasValue {
    /// Literal used for [`GasValue::NoData`] in the report.
    pub const NO_DATA: &'static str = "no-data";

    pub fn amount(&self) -> Option<U256> {
        match self {
            GasValue::Amount(value) => Some(*value),
            GasValue::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, GasValue::NoData)
    }
}

impl From<U256> for GasValue {
    fn from(value: U256) -> Self {
        GasValue::Amount(value)
    }
}

impl fmt::Display for GasValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasValue::Amount(value) => write!(f, "{value}n"),
            GasValue::NoData => f.write_str(Self::NO_DATA),
        }
    }
}

/// Error parsing a [`GasValue`] from its report encoding.
#[derive(Debug, thiserror::Error)]
#[error("invalid gas value `{0}`: expected `<digits>n` or `no-data`")]
pub struct ParseGasValueError(String);

impl FromStr for GasValue {
    type Err = ParseGasValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::NO_DATA {
            return Ok(GasValue::NoData);
        }
        let digits = s
            .strip_suffix('n')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| ParseGasValueError(s.to_string()))?;
        U256::from_str_radix(digits, 10)
            .map(GasValue::Amount)
            .map_err(|_| ParseGasValueError(s.to_string()))
    }
}

impl Serialize for GasValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GasValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GasValueVisitor;

        impl Visitor<'_> for GasValueVisitor {
            type Value = GasValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a `<digits>n` string or `no-data`")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<GasValue, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(GasValueVisitor)
    }
}

/// Averages for one protocol operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasMetrics {
    /// Mean gas used.
    pub average_gas_used: GasValue,
    /// Mean effective gas price in Wei.
    pub average_gas_price: GasValue,
    /// Mean of per-transaction fees in Wei.
    pub average_tx_fee: GasValue,
}

impl GasMetrics {
    /// All three fields set to [`GasValue::NoData`].
    pub const fn no_data() -> Self {
        Self {
            average_gas_used: GasValue::NoData,
            average_gas_price: GasValue::NoData,
            average_tx_fee: GasValue::NoData,
        }
    }
}
