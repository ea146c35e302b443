//! Railgun smart wallet on Ethereum.
//!
//! Every operation goes through one proxy that emits `Shield`, `Unshield`,
//! `Transact` and `Nullified`. Wallets batch operations freely, so receipts
//! are matched on the set of emitted events rather than their order.

use alloy::primitives::{address, Address};
use gas_data::types::{EventSignature, Network};

use crate::protocol::{EventPattern, OperationSpec, Protocol, DEFAULT_OVERSAMPLE};

pub const NAME: &str = "railgun";
pub const VERSION: &str = "0.0.1";

/// Proxy in front of `RailgunSmartWallet`.
pub const SMART_WALLET_PROXY: Address = address!("fa7093cdd9ee6932b4eb2c9e1cde7ce00b1fa4b9");

pub const SHIELD: EventSignature = EventSignature::new(
    "Shield",
    &[
        "uint256",
        "uint256",
        "(bytes32,(uint8,address,uint256),uint120)[]",
        "(bytes32[3],bytes32)[]",
        "uint256[]",
    ],
);
pub const UNSHIELD: EventSignature = EventSignature::new(
    "Unshield",
    &["address", "(uint8,address,uint256)", "uint256", "uint256"],
);
pub const TRANSACT: EventSignature = EventSignature::new(
    "Transact",
    &[
        "uint256",
        "uint256",
        "bytes32[]",
        "(bytes32[4],bytes32,bytes32,bytes,bytes)[]",
    ],
);
pub const NULLIFIED: EventSignature = EventSignature::new("Nullified", &["uint16", "bytes32[]"]);

fn on_wallet(event: EventSignature) -> (Address, EventSignature) {
    (SMART_WALLET_PROXY, event)
}

fn operation(name: &'static str, scan: EventSignature, pattern: EventPattern) -> OperationSpec {
    OperationSpec {
        name,
        network: Network::Ethereum,
        contract: SMART_WALLET_PROXY,
        scan_events: vec![scan],
        pattern,
        start_block: None,
        oversample: DEFAULT_OVERSAMPLE,
    }
}

pub fn protocol() -> Protocol {
    Protocol {
        name: NAME,
        version: VERSION,
        operations: vec![
            operation(
                "shield_erc20",
                SHIELD,
                EventPattern::Topics {
                    required: vec![on_wallet(SHIELD)],
                    forbidden: vec![on_wallet(UNSHIELD), on_wallet(TRANSACT), on_wallet(NULLIFIED)],
                },
            ),
            operation(
                "unshield_erc20",
                UNSHIELD,
                EventPattern::Topics {
                    required: vec![on_wallet(UNSHIELD)],
                    forbidden: vec![on_wallet(SHIELD)],
                },
            ),
            operation(
                "transfer_erc20",
                TRANSACT,
                EventPattern::Topics {
                    required: vec![on_wallet(TRANSACT), on_wallet(NULLIFIED)],
                    forbidden: vec![on_wallet(SHIELD), on_wallet(UNSHIELD)],
                },
            ),
        ],
    }
}
