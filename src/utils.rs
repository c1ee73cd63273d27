use sp_core::crypto::{AccountId32, Ss58Codec};

use crate::error::{PayoutError, Result};

/// Render a smallest-unit amount in token units, e.g. `5.780520362127 KSM`.
/// Floor conversion: the fractional digits are the exact remainder, nothing
/// is rounded up.
pub fn format_balance(amount: u128, decimals: u32, symbol: &str) -> String {
    if decimals == 0 {
        return format!("{} {}", amount, symbol);
    }

    let divisor = 10u128.pow(decimals);
    let whole = amount / divisor;
    let frac = amount % divisor;
    format!("{}.{:0width$} {}", whole, frac, symbol, width = decimals as usize)
}

/// Shorten an address for table display.
pub fn format_account(address: &str) -> String {
    if address.len() <= 16 {
        address.to_string()
    } else {
        format!("{}...{}", &address[..8], &address[address.len() - 6..])
    }
}

/// Parse an SS58 address, any network prefix accepted.
pub fn parse_account(address: &str) -> Result<AccountId32> {
    AccountId32::from_ss58check(address)
        .map_err(|e| PayoutError::Config(format!("invalid account address {}: {:?}", address, e)))
}
