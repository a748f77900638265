//! Error types for key derivation.

use thiserror::Error;

/// Errors that can occur during key derivation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Iteration-cost parameter outside the format's valid domain.
    #[error("invalid key derivation cycles: {0} (valid range is 0-63)")]
    InvalidCycles(u8),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
