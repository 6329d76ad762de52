//! Error types for identity and amount parsing

use thiserror::Error;

/// Address parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address length: expected 40 hex digits, got {len}")]
    InvalidLength { len: usize },

    #[error("Invalid hex in address: {0}")]
    InvalidHex(String),
}

/// Amount conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Invalid amount: {input}")]
    Invalid { input: String },

    #[error("Amount must not be negative: {input}")]
    Negative { input: String },

    #[error("Amount {input} has more than {decimals} fractional digits")]
    TooPrecise { input: String, decimals: u32 },

    #[error("Unsupported decimals: {decimals} (max {max})")]
    UnsupportedDecimals { decimals: u32, max: u32 },

    #[error("Amount overflows the smallest-unit range: {input}")]
    Overflow { input: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_error_display() {
        let err = AddressError::InvalidLength { len: 12 };
        assert_eq!(
            err.to_string(),
            "Invalid address length: expected 40 hex digits, got 12"
        );
    }

    #[test]
    fn test_units_error_display() {
        let err = UnitsError::TooPrecise {
            input: "0.1234".to_string(),
            decimals: 2,
        };
        assert!(err.to_string().contains("0.1234"));
        assert!(err.to_string().contains('2'));
    }
}
