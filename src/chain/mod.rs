//! Chain Data Sources
//!
//! Read-only access to token balances, allowances, transaction receipts,
//! and the destination-chain receipt statistics. The `ChainReader` trait
//! abstracts the source so the service can run against real RPC endpoints
//! or against deterministic demo fixtures, selected by configuration:
//!
//! - `LiveChainReader` - alloy provider over the configured RPC endpoints
//! - `FixtureChainReader` - canned demo data, no network access

pub mod fixture;
pub mod live;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contracts::Chain;

pub use fixture::FixtureChainReader;
pub use live::LiveChainReader;

/// Chain read errors
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("contract read failed: {0}")]
    Contract(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<ChainError> for crate::common::OmniSweepError {
    fn from(e: ChainError) -> Self {
        Self::Chain(e.to_string())
    }
}

/// Result type for chain reads
pub type ChainResult<T> = Result<T, ChainError>;

/// A user's balance in one token, with metadata.
///
/// The four underlying reads (balance, decimals, symbol, name) are one
/// all-or-nothing batch: if any read fails the whole call fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    /// Base units, decimal string
    pub balance: String,
    pub decimals: u8,
    pub formatted: String,
}

/// A spender allowance for one (owner, token) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAllowance {
    /// Base units, decimal string
    pub allowance: String,
    pub formatted: String,
    /// Derived: allowance == 0
    pub needs_approval: bool,
}

/// Aggregate cross-chain receipt stats for one user (6-decimal USDC)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_swept: String,
    pub sweep_count: u64,
    pub average_sweep: String,
    pub total_swept_formatted: String,
    pub average_sweep_formatted: String,
}

/// Protocol-wide receipt stats (6-decimal USDC)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolStats {
    pub total_value: String,
    pub total_count: u64,
    pub average_value: String,
    pub total_value_formatted: String,
    pub average_value_formatted: String,
}

/// Terminal transaction state as read from a chain.
///
/// `status` maps the chain's raw 1/0 success indicator to a display
/// string; it carries no additional on-chain semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceiptInfo {
    pub hash: String,
    pub block_number: u64,
    /// "success" or "failed"
    pub status: String,
    pub gas_used: String,
    pub effective_gas_price: String,
    pub logs: usize,
}

impl TxReceiptInfo {
    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

/// Snapshot of one dust token balance, superseded by a fresh fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DustToken {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Base units, decimal string
    pub balance: String,
    pub balance_formatted: String,
    pub value_usd: f64,
}

/// Read-only chain data source
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Token balance with metadata, as one all-or-nothing batch
    async fn token_balance(&self, owner: Address, token: Address) -> ChainResult<TokenBalance>;

    /// Spender allowance for (owner, token)
    async fn token_allowance(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
    ) -> ChainResult<TokenAllowance>;

    /// Per-user receipt stats from the destination-chain ReceiptOApp
    async fn user_stats(&self, user: Address) -> ChainResult<UserStats>;

    /// Protocol-wide receipt stats from the destination-chain ReceiptOApp
    async fn protocol_stats(&self) -> ChainResult<ProtocolStats>;

    /// Receipt for a transaction hash, None if not yet mined
    async fn transaction_receipt(
        &self,
        chain: Chain,
        hash: B256,
    ) -> ChainResult<Option<TxReceiptInfo>>;

    /// Sweepable dust token balances for a user
    async fn dust_tokens(&self, owner: Address) -> ChainResult<Vec<DustToken>>;
}
