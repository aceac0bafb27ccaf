//! Shared chain constants and amount utilities
//!
//! All token amounts in this crate are `U256` values in base units with 18
//! decimal places, matching both the native gas token (FIL) and the storage
//! stablecoin (USDFC). Conversions to floating point exist for display only
//! and are never fed back into allowance math.

use ethereum_types::U256;

/// Decimal places of both FIL and USDFC base units
pub const TOKEN_DECIMALS: u32 = 18;

/// Chain epoch duration is 30 seconds, so 2880 epochs per day
pub const EPOCHS_PER_DAY: u64 = 2880;

/// Billing months are normalized to 30 days
pub const DAYS_PER_MONTH: u64 = 30;

/// Epochs in one normalized billing month
pub const EPOCHS_PER_MONTH: u64 = DAYS_PER_MONTH * EPOCHS_PER_DAY;

/// Capacity units per TiB used by the pricing schedule
pub const GB_PER_TIB: u64 = 1024;

/// Number of epochs in the given number of days
pub fn epochs(days: u64) -> U256 {
    U256::from(days) * U256::from(EPOCHS_PER_DAY)
}

/// Render a base-unit amount as a decimal token string, e.g. `2.5`
///
/// Trailing fractional zeros are trimmed; whole amounts render without a
/// fractional part.
pub fn format_units(amount: U256, decimals: u32) -> String {
    let base = U256::exp10(decimals as usize);
    let integer = amount / base;
    let fraction = amount % base;
    if fraction.is_zero() {
        return integer.to_string();
    }
    let frac = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    let frac = frac.trim_end_matches('0');
    format!("{}.{}", integer, frac)
}

/// Lossy conversion for display ratios
///
/// Amounts beyond `f64` range saturate to infinity; callers only use this
/// for human-facing horizons, never for allowance arithmetic.
pub fn to_f64_lossy(amount: U256) -> f64 {
    amount.to_string().parse::<f64>().unwrap_or(f64::INFINITY)
}
