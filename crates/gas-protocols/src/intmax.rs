//! INTMAX: deposits on Ethereum, withdrawals on Scroll.
//!
//! Both contracts have been paused. Their scans cover the week before a fixed
//! pre-pause block instead of the week before the head, and over-fetch twice
//! as much as other protocols because many transactions around the pause
//! reverted.

use alloy::primitives::{address, Address};
use gas_data::types::{EventSignature, Network};

use crate::protocol::{EventPattern, OperationSpec, Protocol};

pub const NAME: &str = "intmax";
pub const VERSION: &str = "1.0.0";

const OVERSAMPLE: usize = 10;

/// Liquidity contract on Ethereum.
pub const LIQUIDITY_PROXY: Address = address!("F65e73aAc9182e353600a916a6c7681F810f79C3");
/// Shortly before deposits were paused; scans cover the week up to it.
pub const DEPOSIT_START_BLOCK: u64 = 24_402_900;

/// Withdrawal contract on Scroll.
pub const WITHDRAWAL_PROXY: Address = address!("86B06D2604D9A6f9760E8f691F86d5B2a7C9c449");
/// Shortly before withdrawals were paused.
pub const WITHDRAW_START_BLOCK: u64 = 29_328_200;

/// Scroll L2 message queue predeploy.
pub const L2_MESSAGE_QUEUE: Address = address!("5300000000000000000000000000000000000000");
/// Scroll L2 messenger.
pub const L2_SCROLL_MESSENGER: Address = address!("781e90f1c8fc4611c9b7497c3b47f99ef6969cbc");

/// Emitted by the AML predicate contract.
pub const TASK_VALIDATED: EventSignature = EventSignature::new(
    "TaskValidated",
    &[
        "address", "address", "uint256", "string", "string", "uint256", "uint256", "address[]",
    ],
);
pub const DEPOSITED: EventSignature = EventSignature::new(
    "Deposited",
    &["uint256", "address", "bytes32", "uint32", "uint256", "bool", "uint256"],
);
pub const DIRECT_WITHDRAWAL_QUEUED: EventSignature = EventSignature::new(
    "DirectWithdrawalQueued",
    &["bytes32", "address", "(address,uint32,uint256,bytes32)"],
);
pub const APPEND_MESSAGE: EventSignature = EventSignature::new("AppendMessage", &["uint256", "bytes32"]);
pub const SENT_MESSAGE: EventSignature = EventSignature::new(
    "SentMessage",
    &["address", "address", "uint256", "uint256", "uint256", "bytes"],
);
pub fn protocol() -> Protocol {
    Protocol {
        name: NAME,
        version: VERSION,
        operations: vec![
            OperationSpec {
                name: "deposit_eth",
                network: Network::Ethereum,
                contract: LIQUIDITY_PROXY,
                scan_events: vec![TASK_VALIDATED, DEPOSITED],
                pattern: EventPattern::Sequence(vec![TASK_VALIDATED, DEPOSITED]),
                start_block: Some(DEPOSIT_START_BLOCK),
                oversample: OVERSAMPLE,
            },
            // One DirectWithdrawalQueued per withdrawal in the batch.
            // ContributionRecorded is not required: it comes from the rewards
            // contribution contract, which has no pinned address here, and
            // says nothing about the withdrawal itself.
            OperationSpec {
                name: "withdraw_eth",
                network: Network::Scroll,
                contract: WITHDRAWAL_PROXY,
                scan_events: vec![DIRECT_WITHDRAWAL_QUEUED],
                pattern: EventPattern::Topics {
                    required: vec![
                        (WITHDRAWAL_PROXY, DIRECT_WITHDRAWAL_QUEUED),
                        (L2_MESSAGE_QUEUE, APPEND_MESSAGE),
                        (L2_SCROLL_MESSENGER, SENT_MESSAGE),
                    ],
                    forbidden: vec![],
                },
                start_block: Some(WITHDRAW_START_BLOCK),
                oversample: OVERSAMPLE,
            },
        ],
    }
}
