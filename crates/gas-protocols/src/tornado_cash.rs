//! Tornado Cash router and relayer registry on Ethereum.
//!
//! Deposits go through the router, relayed withdrawals through the relayer
//! registry; both paths emit a fixed two-event sequence.

use alloy::primitives::{address, Address};
use gas_data::types::{EventSignature, Network};

use crate::protocol::{EventPattern, OperationSpec, Protocol, DEFAULT_OVERSAMPLE};

pub const NAME: &str = "tornado-cash";
pub const VERSION: &str = "unstoppable-release";

pub const ROUTER: Address = address!("d90e2f925DA726b50C4Ed8D0Fb90Ad053324F31b");
pub const RELAYER_REGISTRY: Address = address!("58E8dCC13BE9780fC42E8723D8EaD4CF46943dF2");

/// Emitted by the pool instance.
pub const DEPOSIT: EventSignature = EventSignature::new("Deposit", &["bytes32", "uint32", "uint256"]);
/// Emitted by the router.
pub const ENCRYPTED_NOTE: EventSignature = EventSignature::new("EncryptedNote", &["address", "bytes"]);
/// Emitted by the relayer registry.
pub const STAKE_BURNED: EventSignature = EventSignature::new("StakeBurned", &["address", "uint256"]);
/// Emitted by the pool instance.
pub const WITHDRAWAL: EventSignature =
    EventSignature::new("Withdrawal", &["address", "bytes32", "address", "uint256"]);

pub fn protocol() -> Protocol {
    Protocol {
        name: NAME,
        version: VERSION,
        operations: vec![
            OperationSpec {
                name: "shield_eth",
                network: Network::Ethereum,
                contract: ROUTER,
                scan_events: vec![DEPOSIT, ENCRYPTED_NOTE],
                pattern: EventPattern::Sequence(vec![DEPOSIT, ENCRYPTED_NOTE]),
                start_block: None,
                oversample: DEFAULT_OVERSAMPLE,
            },
            OperationSpec {
                name: "unshield_eth",
                network: Network::Ethereum,
                contract: RELAYER_REGISTRY,
                scan_events: vec![STAKE_BURNED, WITHDRAWAL],
                pattern: EventPattern::Sequence(vec![STAKE_BURNED, WITHDRAWAL]),
                start_block: None,
                oversample: DEFAULT_OVERSAMPLE,
            },
        ],
    }
}
