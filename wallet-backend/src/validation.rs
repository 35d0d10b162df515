use crate::amount::Amount;
use crate::coin::CoinParams;
use crate::errors::{WalletError, WalletResult};
use regex::Regex;

/// Input validation utilities for the wallet
pub struct InputValidator {
    // Compiled regex patterns for performance
    address_pattern: Regex,
    payment_id_pattern: Regex,
    amount_pattern: Regex,
    verminting_amount_pattern: Regex,
}

impl InputValidator {
    pub fn new() -> WalletResult<Self> {
        let address_pattern = Regex::new(&format!(
            r"^{}[1-9A-HJ-NP-Za-km-z]+$",
            CoinParams::TICKER
        ))
        .map_err(|e| WalletError::ValidationError(format!("Invalid address regex: {}", e)))?;

        let payment_id_pattern = Regex::new(r"^[0-9a-fA-F]{64}$").map_err(|e| {
            WalletError::ValidationError(format!("Invalid payment ID regex: {}", e))
        })?;

        let amount_pattern = Regex::new(r"^\d+(\.\d{1,8})?$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid amount regex: {}", e)))?;

        // Same rule the verminting amount box applies while typing.
        let verminting_amount_pattern = Regex::new(r"^\d*\.?\d{0,8}$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid amount regex: {}", e)))?;

        Ok(InputValidator {
            address_pattern,
            payment_id_pattern,
            amount_pattern,
            verminting_amount_pattern,
        })
    }

    /// Validate a standard or integrated address
    pub fn validate_address(&self, address: &str) -> WalletResult<()> {
        if address.is_empty() {
            return Err(WalletError::ValidationError(
                "Address cannot be empty".to_string(),
            ));
        }

        if address.len() != CoinParams::STANDARD_ADDRESS_LENGTH
            && address.len() != CoinParams::INTEGRATED_ADDRESS_LENGTH
        {
            return Err(WalletError::InvalidAddress(format!(
                "Address must be {} or {} characters",
                CoinParams::STANDARD_ADDRESS_LENGTH,
                CoinParams::INTEGRATED_ADDRESS_LENGTH
            )));
        }

        if !self.address_pattern.is_match(address) {
            return Err(WalletError::InvalidAddress(
                "Address format is invalid".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_integrated_address(&self, address: &str) -> bool {
        address.len() == CoinParams::INTEGRATED_ADDRESS_LENGTH
    }

    /// Validate a 64 character hex payment ID
    pub fn validate_payment_id(&self, payment_id: &str) -> WalletResult<()> {
        if !self.payment_id_pattern.is_match(payment_id) {
            return Err(WalletError::ValidationError(
                "Payment ID must be 64 hexadecimal characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a send amount and return it in atomic units
    pub fn validate_amount(&self, amount: &str) -> WalletResult<u64> {
        if amount.is_empty() {
            return Err(WalletError::ValidationError(
                "Amount cannot be empty".to_string(),
            ));
        }

        if !self.amount_pattern.is_match(amount) {
            return Err(WalletError::InvalidAmount(
                "Amount format is invalid".to_string(),
            ));
        }

        let atomic = Amount::from_human(amount)?.atomic();
        if atomic <= 0 {
            return Err(WalletError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        Ok(atomic as u64)
    }

    /// True when `input` is an acceptable partial entry in the verminting amount box.
    pub fn accepts_verminting_input(&self, input: &str) -> bool {
        self.verminting_amount_pattern.is_match(input)
    }

    /// A verminting amount must match the input rule and parse as a number.
    pub fn validate_verminting_amount(&self, amount: &str) -> WalletResult<()> {
        if amount.is_empty() || !self.accepts_verminting_input(amount) {
            return Err(WalletError::InvalidAmount(
                "Please enter a valid amount".to_string(),
            ));
        }
        if amount.parse::<f64>().is_err() {
            return Err(WalletError::InvalidAmount(
                "Please enter a valid amount".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a new wallet password against its confirmation
    pub fn validate_new_password(&self, password: &str, confirmation: &str) -> WalletResult<()> {
        if password != confirmation {
            return Err(WalletError::ValidationError(
                "Passwords do not match".to_string(),
            ));
        }

        if password.len() > 256 {
            return Err(WalletError::ValidationError(
                "Password too long".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new().expect("Failed to create InputValidator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses() {
        let validator = InputValidator::default();
        let standard = format!("VRM{}", "a".repeat(95));
        let integrated = format!("VRM{}", "b".repeat(183));
        assert!(validator.validate_address(&standard).is_ok());
        assert!(validator.validate_address(&integrated).is_ok());
        assert!(validator.is_integrated_address(&integrated));

        let wrong_prefix = format!("TRT{}", "a".repeat(95));
        assert!(validator.validate_address(&wrong_prefix).is_err());
        let bad_char = format!("VRM0{}", "a".repeat(94));
        assert!(validator.validate_address(&bad_char).is_err());
        assert!(validator.validate_address("").is_err());
    }

    #[test]
    fn payment_ids() {
        let validator = InputValidator::default();
        assert!(validator.validate_payment_id(&"ab".repeat(32)).is_ok());
        assert!(validator.validate_payment_id("abc").is_err());
        assert!(validator.validate_payment_id(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn amounts() {
        let validator = InputValidator::default();
        assert_eq!(validator.validate_amount("1.5").unwrap(), 150_000_000);
        assert!(validator.validate_amount("0").is_err());
        assert!(validator.validate_amount("1.123456789").is_err());
        assert!(validator.validate_amount("-1").is_err());
    }

    #[test]
    fn verminting_amounts() {
        let validator = InputValidator::default();
        assert!(validator.accepts_verminting_input(""));
        assert!(validator.accepts_verminting_input("12."));
        assert!(validator.accepts_verminting_input(".5"));
        assert!(!validator.accepts_verminting_input("1.123456789"));
        assert!(!validator.accepts_verminting_input("1e5"));

        assert!(validator.validate_verminting_amount("10.25").is_ok());
        assert!(validator.validate_verminting_amount("").is_err());
        assert!(validator.validate_verminting_amount(".").is_err());
    }

    #[test]
    fn new_passwords() {
        let validator = InputValidator::default();
        assert!(validator.validate_new_password("hunter2", "hunter2").is_ok());
        assert!(validator.validate_new_password("hunter2", "hunter3").is_err());
    }
}
