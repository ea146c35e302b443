//! Hinkal shielded pool on Ethereum.

use alloy::primitives::{address, Address};
use gas_data::types::{EventSignature, Network};

use crate::protocol::{EventPattern, OperationSpec, Protocol, DEFAULT_OVERSAMPLE};

pub const NAME: &str = "hinkal";
pub const VERSION: &str = "1.0.0";

pub const POOL: Address = address!("25e5e82f5702A27C3466fE68f14abDbbAdFca826");

/// ERC-20 transfer, emitted by the token contract.
pub const TRANSFER: EventSignature =
    EventSignature::new("Transfer", &["address", "address", "uint256"]);
pub const NEW_COMMITMENT: EventSignature =
    EventSignature::new("NewCommitment", &["uint256", "int256", "bytes"]);
pub const NULLIFIED: EventSignature = EventSignature::new("Nullified", &["uint256"]);

fn operation(name: &'static str, sequence: Vec<EventSignature>) -> OperationSpec {
    OperationSpec {
        name,
        network: Network::Ethereum,
        contract: POOL,
        scan_events: sequence.clone(),
        pattern: EventPattern::Sequence(sequence),
        start_block: None,
        oversample: DEFAULT_OVERSAMPLE,
    }
}

pub fn protocol() -> Protocol {
    Protocol {
        name: NAME,
        version: VERSION,
        operations: vec![
            operation("shield_erc20", vec![TRANSFER, NEW_COMMITMENT]),
            operation("unshield_erc20", vec![TRANSFER, NULLIFIED]),
            operation("transfer_erc20", vec![NULLIFIED, NEW_COMMITMENT, NEW_COMMITMENT]),
        ],
    }
}
