//! Privacy Pools entrypoint on Ethereum (ETH pool).
//!
//! The entrypoint forwards to a per-asset pool whose address is not fixed
//! here, so receipts are matched on topic order alone.

use alloy::primitives::{address, Address};
use gas_data::types::{EventSignature, Network};

use crate::protocol::{EventPattern, OperationSpec, Protocol, DEFAULT_OVERSAMPLE};

pub const NAME: &str = "privacy-pools";
pub const VERSION: &str = "1.1.1";

pub const ENTRYPOINT_PROXY: Address = address!("6818809EefCe719E480a7526D76bD3e561526b46");

/// Emitted by the pool's state tree.
pub const LEAF_INSERTED: EventSignature =
    EventSignature::new("LeafInserted", &["uint256", "uint256", "uint256"]);
/// Emitted by the pool.
pub const POOL_DEPOSITED: EventSignature = EventSignature::new(
    "Deposited",
    &["address", "uint256", "uint256", "uint256", "uint256"],
);
/// Emitted by the entrypoint.
pub const ENTRYPOINT_DEPOSITED: EventSignature =
    EventSignature::new("Deposited", &["address", "address", "uint256", "uint256"]);
/// Emitted by the pool.
pub const WITHDRAWN: EventSignature =
    EventSignature::new("Withdrawn", &["address", "uint256", "uint256", "uint256"]);
/// Emitted by the entrypoint.
pub const WITHDRAWAL_RELAYED: EventSignature = EventSignature::new(
    "WithdrawalRelayed",
    &["address", "address", "address", "uint256", "uint256"],
);

pub fn protocol() -> Protocol {
    let shield = vec![LEAF_INSERTED, POOL_DEPOSITED, ENTRYPOINT_DEPOSITED];
    let unshield = vec![LEAF_INSERTED, WITHDRAWN, WITHDRAWAL_RELAYED];

    Protocol {
        name: NAME,
        version: VERSION,
        operations: vec![
            OperationSpec {
                name: "shield_eth",
                network: Network::Ethereum,
                contract: ENTRYPOINT_PROXY,
                scan_events: shield.clone(),
                pattern: EventPattern::Sequence(shield),
                start_block: None,
                oversample: DEFAULT_OVERSAMPLE,
            },
            OperationSpec {
                name: "unshield_eth",
                network: Network::Ethereum,
                contract: ENTRYPOINT_PROXY,
                scan_events: unshield.clone(),
                pattern: EventPattern::Sequence(unshield),
                start_block: None,
                oversample: DEFAULT_OVERSAMPLE,
            },
        ],
    }
}
