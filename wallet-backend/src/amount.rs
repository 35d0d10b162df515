use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coin::CoinParams;
use crate::errors::{WalletError, WalletResult};

/// Signed amount of atomic units.
///
/// Transaction totals are negative for outgoing transfers, so unlike balances
/// the projection works with signed values throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Amount {
    atomic: i64,
}

impl Amount {
    /// Decimal places of the coin.
    pub const DECIMALS: u8 = CoinParams::DECIMAL_PLACES;
    /// Atomic units per whole coin (10^8).
    pub const UNITS_PER_COIN: i64 = 100_000_000;

    pub const fn from_atomic(atomic: i64) -> Self {
        Self { atomic }
    }

    pub fn atomic(&self) -> i64 {
        self.atomic
    }

    /// Parse a human amount such as `12.5` into atomic units.
    pub fn from_human(amount_str: &str) -> WalletResult<Self> {
        let trimmed = amount_str.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be empty".to_string(),
            ));
        }

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut parts = digits.splitn(2, '.');
        let whole_str = parts.next().unwrap_or_default();
        let fractional_str = parts.next().unwrap_or_default();
        if fractional_str.contains('.') {
            return Err(WalletError::InvalidAmount(
                "Invalid decimal format".to_string(),
            ));
        }
        if fractional_str.len() > Self::DECIMALS as usize {
            return Err(WalletError::InvalidAmount(
                "Too many decimal places".to_string(),
            ));
        }
        if whole_str.is_empty() && fractional_str.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Invalid number format".to_string(),
            ));
        }
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(whole_str) || !is_digits(fractional_str) {
            return Err(WalletError::InvalidAmount(
                "Invalid number format".to_string(),
            ));
        }

        let whole: i64 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| WalletError::InvalidAmount("Invalid number format".to_string()))?
        };

        let fractional: i64 = if fractional_str.is_empty() {
            0
        } else {
            format!("{:0<8}", fractional_str)
                .parse()
                .map_err(|_| WalletError::InvalidAmount("Invalid fractional part".to_string()))?
        };

        let atomic = whole
            .checked_mul(Self::UNITS_PER_COIN)
            .and_then(|w| w.checked_add(fractional))
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow".to_string()))?;

        Ok(Self::from_atomic(if negative { -atomic } else { atomic }))
    }

    /// Decimal-shifted form with all eight places, e.g. `-1.50000000`.
    pub fn to_human(self) -> String {
        let sign = if self.atomic < 0 { "-" } else { "" };
        let magnitude = self.atomic.unsigned_abs();
        let units = Self::UNITS_PER_COIN as u64;
        format!(
            "{}{}.{:0width$}",
            sign,
            magnitude / units,
            magnitude % units,
            width = Self::DECIMALS as usize
        )
    }

    /// Decimal-shifted form with trailing zeros trimmed, e.g. `-1.5`.
    pub fn to_display_string(self) -> String {
        let full = self.to_human();
        let trimmed = full.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    }

    pub fn checked_add(&self, other: &Amount) -> WalletResult<Amount> {
        self.atomic
            .checked_add(other.atomic)
            .map(Amount::from_atomic)
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow in addition".to_string()))
    }

    pub fn saturating_sub(&self, other: &Amount) -> Amount {
        Amount::from_atomic(self.atomic.saturating_sub(other.atomic))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_display_string(), CoinParams::TICKER)
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::from_human(s)
    }
}

impl From<i64> for Amount {
    fn from(atomic: i64) -> Self {
        Amount::from_atomic(atomic)
    }
}

/// Shorthand used by the CSV export and notifications.
pub fn atomic_to_human(atomic: i64) -> String {
    Amount::from_atomic(atomic).to_human()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_form_keeps_eight_decimals() {
        assert_eq!(atomic_to_human(0), "0.00000000");
        assert_eq!(atomic_to_human(150_000_000), "1.50000000");
        assert_eq!(atomic_to_human(-1), "-0.00000001");
        assert_eq!(atomic_to_human(123_456_789_012), "1234.56789012");
    }

    #[test]
    fn parse_human_amounts() {
        assert_eq!(Amount::from_human("1").unwrap().atomic(), 100_000_000);
        assert_eq!(Amount::from_human("0.5").unwrap().atomic(), 50_000_000);
        assert_eq!(Amount::from_human(".25").unwrap().atomic(), 25_000_000);
        assert_eq!(Amount::from_human("2.").unwrap().atomic(), 200_000_000);
        assert_eq!(Amount::from_human("-3.1").unwrap().atomic(), -310_000_000);
        assert!(Amount::from_human("0.000000001").is_err());
        assert!(Amount::from_human("1.2.3").is_err());
        assert!(Amount::from_human(".").is_err());
        assert!(Amount::from_human("abc").is_err());
        assert!(Amount::from_human("1.-5").is_err());
        assert!(Amount::from_human("1.+5").is_err());
        assert!("+1".parse::<Amount>().is_err());
        assert!(Amount::from_human("--1").is_err());
        assert!(Amount::from_human("1. 5").is_err());
    }

    #[test]
    fn display_trims_and_appends_ticker() {
        assert_eq!(Amount::from_atomic(150_000_000).to_string(), "1.5 VRM");
        assert_eq!(Amount::from_atomic(200_000_000).to_display_string(), "2");
    }
}
