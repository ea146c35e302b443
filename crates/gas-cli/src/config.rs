//! Run configuration: CLI flags with environment fallback, validated before
//! any RPC is made.

use clap::{Args, ValueEnum};
use gas_data::chain::RetryPolicy;
use gas_data::scanner::ScanSettings;
use gas_data::types::{ChainEndpoint, Network};
use gas_protocols::{BenchmarkSettings, Protocol};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown protocol `{name}` (expected one of: {known})")]
    UnknownProtocol { name: String, known: String },

    #[error("{var} is required to benchmark {protocol} on {network}")]
    MissingEndpoint {
        network: Network,
        var: &'static str,
        protocol: &'static str,
    },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("MIN_SAMPLES ({min}) must not exceed MAX_SAMPLES ({max})")]
    MinAboveMax { min: usize, max: usize },
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Protocol to benchmark; repeat to select several. Defaults to all.
    #[arg(long = "protocol", value_name = "NAME")]
    pub protocols: Vec<String>,

    /// Ethereum mainnet JSON-RPC endpoint.
    #[arg(long, env = "ETH_RPC_URL", hide_env_values = true)]
    pub eth_rpc_url: Option<String>,

    /// Scroll mainnet JSON-RPC endpoint.
    #[arg(long, env = "SCROLL_RPC_URL", hide_env_values = true)]
    pub scroll_rpc_url: Option<String>,

    /// Matching transactions required for an operation to be reported.
    #[arg(long, env = "MIN_SAMPLES", default_value_t = 5)]
    pub min_samples: usize,

    /// Matching transactions after which an operation stops sampling.
    #[arg(long, env = "MAX_SAMPLES", default_value_t = 30)]
    pub max_samples: usize,

    /// Blocks per eth_getLogs call.
    #[arg(long, env = "BLOCK_RANGE", default_value_t = 1_000)]
    pub block_range: u64,

    /// Attempts per log chunk or receipt, including the first.
    #[arg(long, env = "MAX_RPC_TRIES", default_value_t = 10)]
    pub max_rpc_tries: u32,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

/// Validated settings for one benchmark run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub protocols: Vec<Protocol>,
    /// One endpoint per network used by a selected protocol.
    pub endpoints: Vec<ChainEndpoint>,
    pub benchmark: BenchmarkSettings,
}

impl Settings {
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn from_args(args: &RunArgs) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("MIN_SAMPLES", args.min_samples as u64),
            ("MAX_SAMPLES", args.max_samples as u64),
            ("BLOCK_RANGE", args.block_range),
            ("MAX_RPC_TRIES", u64::from(args.max_rpc_tries)),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
        }
        if args.min_samples > args.max_samples {
            return Err(ConfigError::MinAboveMax {
                min: args.min_samples,
                max: args.max_samples,
            });
        }

        let protocols = select_protocols(&args.protocols)?;

        let mut endpoints: Vec<ChainEndpoint> = Vec::new();
        for protocol in &protocols {
            for network in protocol.networks() {
                if endpoints.iter().any(|e| e.network == network) {
                    continue;
                }
                let url = match network {
                    Network::Ethereum => args.eth_rpc_url.as_deref(),
                    Network::Scroll => args.scroll_rpc_url.as_deref(),
                }
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .ok_or(ConfigError::MissingEndpoint {
                    network,
                    var: network.rpc_env_var(),
                    protocol: protocol.name,
                })?;
                endpoints.push(ChainEndpoint::new(network, url));
            }
        }

        Ok(Self {
            protocols,
            endpoints,
            benchmark: BenchmarkSettings {
                min_samples: args.min_samples,
                max_samples: args.max_samples,
                scan: ScanSettings {
                    chunk_size: args.block_range,
                    retry: RetryPolicy {
                        max_attempts: args.max_rpc_tries,
                        ..RetryPolicy::default()
                    },
                },
                ..BenchmarkSettings::default()
            },
        })
    }
}

/// Resolves `--protocol` names; an empty selection means every protocol.
///
/// # Errors
/// Returns [`ConfigError::UnknownProtocol`] for a name no protocol carries.
pub fn select_protocols(names: &[String]) -> Result<Vec<Protocol>, ConfigError> {
    if names.is_empty() {
        return Ok(gas_protocols::all());
    }

    let mut selected: Vec<Protocol> = Vec::new();
    for name in names {
        let protocol = gas_protocols::find(name).ok_or_else(|| ConfigError::UnknownProtocol {
            name: name.clone(),
            known: gas_protocols::names().join(", "),
        })?;
        if !selected.iter().any(|p| p.name == protocol.name) {
            selected.push(protocol);
        }
    }
    Ok(selected)
}
