use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    /// The call-history store could not be queried (connect, timeout, or query failure).
    #[error("call history unavailable: {reason}")]
    DataUnavailable { reason: String },

    /// Posted rate must be a positive, finite dollar amount.
    #[error("invalid loadboard rate: {rate}")]
    InvalidRate { rate: f64 },
}
