//! Common Error Types for the OmniSweep Backend
//!
//! Implements the service-wide error taxonomy: validation and signer
//! errors are rejected locally without any network call; upstream and
//! chain errors keep the original message for diagnostics.

use thiserror::Error;

/// Root error type for the OmniSweep backend
#[derive(Debug, Error)]
pub enum OmniSweepError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Missing or malformed request fields; never retried
    #[error("validation error: {0}")]
    Validation(String),

    /// Aggregator or other upstream API failure
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// No transaction signer configured; service runs read-only
    #[error("no backend signer configured; transaction submission disabled")]
    SignerUnavailable,

    /// No receipt observed within the polling window. The transaction may
    /// still confirm later; callers may re-poll with the same hash.
    #[error("no receipt for {hash} within {timeout_ms}ms")]
    ConfirmationTimeout { hash: String, timeout_ms: u64 },

    /// On-chain execution failed; terminal for the attempt
    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    /// RPC or contract-read failure on either chain
    #[error("chain error: {0}")]
    Chain(String),

    /// Internal errors
    #[error("internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OmniSweepError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn chain(msg: impl Into<String>) -> Self {
        Self::Chain(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a later retry of the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OmniSweepError::UpstreamUnavailable(_)
                | OmniSweepError::Chain(_)
                | OmniSweepError::ConfirmationTimeout { .. }
                | OmniSweepError::Io(_)
        )
    }

    /// Stable error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            OmniSweepError::Config(_) => "CONFIG_ERROR",
            OmniSweepError::Validation(_) => "VALIDATION_ERROR",
            OmniSweepError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            OmniSweepError::SignerUnavailable => "SIGNER_UNAVAILABLE",
            OmniSweepError::ConfirmationTimeout { .. } => "CONFIRMATION_TIMEOUT",
            OmniSweepError::TransactionReverted(_) => "TRANSACTION_REVERTED",
            OmniSweepError::Chain(_) => "CHAIN_ERROR",
            OmniSweepError::Internal(_) => "INTERNAL_ERROR",
            OmniSweepError::Io(_) => "IO_ERROR",
        }
    }

    /// HTTP status for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            OmniSweepError::Validation(_) => 400,
            OmniSweepError::SignerUnavailable => 503,
            OmniSweepError::ConfirmationTimeout { .. } => 504,
            OmniSweepError::UpstreamUnavailable(_) | OmniSweepError::Chain(_) => 502,
            _ => 500,
        }
    }
}

/// Result type alias using OmniSweepError
pub type Result<T> = std::result::Result<T, OmniSweepError>;
