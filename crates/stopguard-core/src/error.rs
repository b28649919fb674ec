//! Error types for stopguard-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Convert a broker-reported quantity (often a float such as `3.0`) to whole
/// contracts.
pub fn whole_contracts(value: f64) -> Result<u32> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(CoreError::InvalidQuantity(value.to_string()));
    }
    Ok(value as u32)
}
