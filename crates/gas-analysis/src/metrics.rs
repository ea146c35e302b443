//! Gas metrics aggregation over accepted receipts.
//!
//! Averages are computed with integer arithmetic only: sums are accumulated in
//! 512 bits and the floored mean is narrowed back to 256 bits.

use alloy::primitives::{U256, U512};
use gas_data::types::{GasMetrics, GasValue, TxReceipt};
use thiserror::Error;

const GWEI_DECIMALS: u32 = 9;
const ETH_DECIMALS: u32 = 18;

/// Not enough accepted receipts to trust an average.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("{protocol} {operation}: found {found} matching transactions, need at least {required}")]
    Insufficient {
        protocol: String,
        operation: String,
        found: usize,
        required: usize,
    },
}

/// Averages gas used, effective gas price and transaction fee.
///
/// The fee average is the mean of per-receipt `gas_used * effective_gas_price`
/// products, not the product of the two means. An empty slice yields
/// [`GasMetrics::no_data`].
pub fn aggregate(receipts: &[TxReceipt]) -> GasMetrics {
    if receipts.is_empty() {
        return GasMetrics::no_data();
    }

    let (gas_used, gas_price, tx_fee) = receipts.iter().fold(
        (U512::ZERO, U512::ZERO, U512::ZERO),
        |(gas_used, gas_price, tx_fee), receipt| {
            let used = U512::from(receipt.gas_used);
            let price = U512::from(receipt.effective_gas_price);
            (gas_used + used, gas_price + price, tx_fee + used * price)
        },
    );

    let count = U512::from(receipts.len());
    let mean = |sum: U512| GasValue::Amount((sum / count).saturating_to::<U256>());

    GasMetrics {
        average_gas_used: mean(gas_used),
        average_gas_price: mean(gas_price),
        average_tx_fee: mean(tx_fee),
    }
}

/// Checks that an operation collected at least `required` receipts.
///
/// # Errors
/// Returns [`SampleError::Insufficient`] naming the protocol and operation.
pub fn ensure_min_samples(
    protocol: &str,
    operation: &str,
    found: usize,
    required: usize,
) -> Result<(), SampleError> {
    if found < required {
        return Err(SampleError::Insufficient {
            protocol: protocol.to_string(),
            operation: operation.to_string(),
            found,
            required,
        });
    }
    Ok(())
}

/// Formats a wei amount as gwei with 3 decimals.
pub fn format_gwei(value: &GasValue) -> String {
    format_units(value, GWEI_DECIMALS, 3)
}

/// Formats a wei amount as ETH with 6 decimals.
pub fn format_eth(value: &GasValue) -> String {
    format_units(value, ETH_DECIMALS, 6)
}

/// Formats a plain integer amount (gas units).
pub fn format_amount(value: &GasValue) -> String {
    match value.amount() {
        Some(amount) => amount.to_string(),
        None => GasValue::NO_DATA.to_string(),
    }
}

fn format_units(value: &GasValue, decimals: u32, precision: u32) -> String {
    let Some(amount) = value.amount() else {
        return GasValue::NO_DATA.to_string();
    };
    let unit = U256::from(10u64).pow(U256::from(decimals));
    let truncate = U256::from(10u64).pow(U256::from(decimals - precision));
    let whole = amount / unit;
    let fraction = (amount % unit) / truncate;
    format!(
        "{whole}.{:0>width$}",
        fraction.to_string(),
        width = precision as usize
    )
}
