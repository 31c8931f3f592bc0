//! Backend Signer Capability
//!
//! A single backend-held key signs all server-side submissions. The signer
//! is constructed explicitly at startup from configuration and passed into
//! the sweep executor as an optional dependency; when the key is absent the
//! service runs in read-only mode and never crashes at startup.
//!
//! Never log or expose the private key.

use alloy::network::EthereumWallet;
use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::Address;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::config::OmniSweepConfig;

/// Signer errors
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

/// Backend transaction signer
#[derive(Debug, Clone)]
pub struct BackendSigner {
    inner: PrivateKeySigner,
}

impl BackendSigner {
    /// Create from a hex-encoded private key (with or without 0x prefix)
    pub fn from_key(key: &str) -> Result<Self, SignerError> {
        let key = key.trim_start_matches("0x");
        let inner =
            PrivateKeySigner::from_str(key).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Build the signer from configuration, if a key is present.
    ///
    /// An invalid key is a hard error; a missing key is read-only mode.
    pub fn from_config(config: &OmniSweepConfig) -> Result<Option<Self>, SignerError> {
        match &config.backend_private_key {
            Some(key) => {
                let signer = Self::from_key(key)?;
                info!(address = %signer.address(), "backend signer initialized");
                Ok(Some(signer))
            }
            None => Ok(None),
        }
    }

    /// Generate a throwaway signer (for tests and the demo mode)
    pub fn random() -> Self {
        Self { inner: PrivateKeySigner::random() }
    }

    /// The signer's address (transaction `from`)
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Wallet handle for provider construction
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.inner.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known anvil test key, never holds real funds.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_from_key_with_and_without_prefix() {
        let a = BackendSigner::from_key(TEST_KEY).unwrap();
        let b = BackendSigner::from_key(TEST_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(BackendSigner::from_key("not-a-key").is_err());
    }

    #[test]
    fn test_missing_key_is_read_only_not_error() {
        let config = OmniSweepConfig::default();
        assert!(BackendSigner::from_config(&config).unwrap().is_none());
    }
}
