//! JSON report store for benchmark results.
//!
//! The report is a two-level map `"<protocol>_<version>" -> "<operation>" ->
//! GasMetrics`. It is read once at startup, merged in memory after every job
//! has finished, and rewritten in a single atomic rename.
//!
//! The file is a cache of the last successful measurements, so a missing or
//! unreadable report loads as empty instead of failing the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::GasMetrics;

/// Default location of the report file.
pub const DEFAULT_REPORT_PATH: &str = "./benchmarks.json";

/// In-memory report document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkRecord {
    protocols: BTreeMap<String, BTreeMap<String, GasMetrics>>,
}

impl BenchmarkRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which a protocol version is stored.
    pub fn protocol_key(name: &str, version: &str) -> String {
        format!("{name}_{version}")
    }

    /// Sets the metrics of one operation, keeping the protocol's other
    /// operations untouched.
    pub fn upsert(&mut self, protocol_key: &str, operation: &str, metrics: GasMetrics) {
        self.protocols
            .entry(protocol_key.to_string())
            .or_default()
            .insert(operation.to_string(), metrics);
    }

    pub fn get(&self, protocol_key: &str, operation: &str) -> Option<&GasMetrics> {
        self.protocols.get(protocol_key)?.get(operation)
    }

    /// Operations recorded for a protocol.
    pub fn protocol(&self, protocol_key: &str) -> Option<&BTreeMap<String, GasMetrics>> {
        self.protocols.get(protocol_key)
    }

    /// Iterates `(protocol_key, operation, metrics)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &GasMetrics)> {
        self.protocols.iter().flat_map(|(protocol, operations)| {
            operations
                .iter()
                .map(move |(operation, metrics)| (protocol.as_str(), operation.as_str(), metrics))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Pretty JSON with 2-space indent and a trailing newline.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let mut json =
            serde_json::to_string_pretty(self).wrap_err("failed to serialize benchmark report")?;
        json.push('\n');
        Ok(json)
    }

    /// Parses a report document.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or a gas value is not encoded as
    /// `<digits>n` / `no-data`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).wrap_err("failed to parse benchmark report")
    }
}

/// Report file on disk.
#[derive(Clone, Debug)]
pub struct ReportStore {
    path: PathBuf,
}

impl ReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the report; missing or corrupt files yield an empty record.
    #[tracing::instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> BenchmarkRecord {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no previous report, starting empty");
                return BenchmarkRecord::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read report, starting empty");
                return BenchmarkRecord::new();
            }
        };

        match BenchmarkRecord::from_json(&content) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "malformed report, starting empty");
                BenchmarkRecord::new()
            }
        }
    }

    /// Writes the report through a temporary sibling file and a rename, so a
    /// crash never leaves a truncated report behind.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or the file cannot be
    /// written or renamed.
    #[tracing::instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self, record: &BenchmarkRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .wrap_err_with(|| format!("failed to create directory {}", parent.display()))?;
        }

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, record.to_json()?)
            .await
            .wrap_err_with(|| format!("failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .wrap_err_with(|| format!("failed to replace {}", self.path.display()))?;

        tracing::info!("benchmark report written");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "benchmarks.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GasValue;
    use alloy::primitives::U256;

    fn metrics(gas_used: u64) -> GasMetrics {
        GasMetrics {
            average_gas_used: GasValue::Amount(U256::from(gas_used)),
            average_gas_price: GasValue::Amount(U256::from(1_000_000_000u64)),
            average_tx_fee: GasValue::Amount(U256::from(gas_used) * U256::from(1_000_000_000u64)),
        }
    }

    #[tokio::test]
    async fn round_trips_values_beyond_u64() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = ReportStore::new(dir.path().join("benchmarks.json"));
        let big = U256::from_str_radix("123456789012345678901234567890", 10).unwrap();

        let mut record = BenchmarkRecord::new();
        record.upsert(
            "railgun_0.0.1",
            "shield_erc20",
            GasMetrics {
                average_gas_used: GasValue::Amount(big),
                average_gas_price: GasValue::NoData,
                average_tx_fee: GasValue::Amount(big),
            },
        );
        store.save(&record).await.expect("save report");

        let loaded = store.load().await;
        assert_eq!(loaded, record);
        let content = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(content.contains("\"123456789012345678901234567890n\""));
        assert!(content.contains("\"no-data\""));
        assert!(content.ends_with('\n'));
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = ReportStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("benchmarks.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(ReportStore::new(&path).load().await.is_empty());

        tokio::fs::write(&path, r#"{"p_1":{"op":{"averageGasUsed":12,"averageGasPrice":"1n","averageTxFee":"1n"}}}"#)
            .await
            .unwrap();
        assert!(ReportStore::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn save_creates_parent_and_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("benchmarks.json");
        let store = ReportStore::new(&path);

        store.save(&BenchmarkRecord::new()).await.expect("save report");

        assert!(path.exists());
        assert!(!dir.path().join("nested").join("benchmarks.json.tmp").exists());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "{}\n");
    }

    #[test]
    fn upsert_keeps_sibling_operations() {
        let mut record = BenchmarkRecord::new();
        let key = BenchmarkRecord::protocol_key("tornado-cash", "unstoppable-release");
        record.upsert(&key, "shield_eth", metrics(900_000));
        record.upsert(&key, "unshield_eth", metrics(350_000));
        record.upsert(&key, "shield_eth", metrics(950_000));

        assert_eq!(key, "tornado-cash_unstoppable-release");
        assert_eq!(record.protocol(&key).map(|ops| ops.len()), Some(2));
        assert_eq!(record.get(&key, "shield_eth"), Some(&metrics(950_000)));
        assert_eq!(record.get(&key, "unshield_eth"), Some(&metrics(350_000)));
    }

    #[test]
    fn iter_is_sorted_by_protocol_then_operation() {
        let mut record = BenchmarkRecord::new();
        record.upsert("b_1", "z", metrics(1));
        record.upsert("a_1", "y", metrics(2));
        record.upsert("b_1", "a", metrics(3));

        let keys: Vec<(&str, &str)> = record.iter().map(|(p, o, _)| (p, o)).collect();
        assert_eq!(keys, vec![("a_1", "y"), ("b_1", "a"), ("b_1", "z")]);
    }
}
