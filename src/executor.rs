//! Sweep Executor
//!
//! Submits the on-chain transactions for the sweep flow through the
//! backend signer: the OmniSweeper `sweepDust` call and, for the
//! orchestrated flow, the ERC-20 `approve` that precedes it.
//!
//! Submission returns as soon as the transaction is broadcast; it never
//! waits for confirmation. One invocation is one on-chain submission -
//! callers must not retry blindly on ambiguous failures without checking
//! whether the transaction was actually broadcast.
//!
//! All submissions share the single backend signer, so they are
//! serialized behind an async mutex to keep nonce assignment collision
//! free across concurrent requests.

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::common::{OmniSweepError, Result};
use crate::contracts::{ERC20, OMNISWEEPER, OmniSweeper};
use crate::signer::BackendSigner;

/// Fixed cross-chain messaging fee attached to every sweep: 0.01 native
pub const LAYERZERO_FEE_WEI: u64 = 10_000_000_000_000_000;

/// Gas limit safety buffer applied on top of the estimate, in percent
pub const GAS_BUFFER_PERCENT: u64 = 20;

/// Identifying fields of a submitted, unconfirmed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSubmission {
    pub hash: String,
    pub from: Address,
    pub to: Address,
    /// Attached native value in wei (decimal string)
    pub value: String,
    pub gas_limit: String,
}

/// Estimate plus the fixed safety margin
pub fn buffered_gas(estimate: u64) -> u64 {
    estimate * (100 + GAS_BUFFER_PERCENT) / 100
}

fn classify_submit_error(e: impl std::fmt::Display) -> OmniSweepError {
    let msg = e.to_string();
    if msg.to_lowercase().contains("revert") {
        OmniSweepError::TransactionReverted(msg)
    } else {
        OmniSweepError::Chain(msg)
    }
}

/// Transaction submitter bound to the optional backend signer
pub struct SweepExecutor {
    provider: Option<DynProvider>,
    signer_address: Option<Address>,
    submission_lock: Mutex<()>,
}

impl SweepExecutor {
    /// Build over the source-chain RPC. A `None` signer yields a
    /// read-only executor whose submissions fail with SignerUnavailable.
    pub fn new(signer: Option<BackendSigner>, rpc_url: &str) -> Result<Self> {
        let (provider, signer_address) = match signer {
            Some(signer) => {
                let url = rpc_url
                    .parse()
                    .map_err(|_| OmniSweepError::chain(format!("invalid RPC URL: {}", rpc_url)))?;
                let provider = ProviderBuilder::new()
                    .wallet(signer.wallet())
                    .connect_http(url)
                    .erased();
                (Some(provider), Some(signer.address()))
            }
            None => (None, None),
        };

        Ok(Self {
            provider,
            signer_address,
            submission_lock: Mutex::new(()),
        })
    }

    /// Read-only executor (no signer configured)
    pub fn read_only() -> Self {
        Self {
            provider: None,
            signer_address: None,
            submission_lock: Mutex::new(()),
        }
    }

    pub fn can_submit(&self) -> bool {
        self.provider.is_some()
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer_address
    }

    fn require_provider(&self) -> Result<&DynProvider> {
        self.provider.as_ref().ok_or(OmniSweepError::SignerUnavailable)
    }

    /// Submit the OmniSweeper sweep transaction.
    ///
    /// Estimates gas, applies the fixed buffer, attaches the LayerZero
    /// messaging fee, and broadcasts. Returns once the transaction is in
    /// flight.
    pub async fn execute_sweep(
        &self,
        user_address: Address,
        token_in: Address,
        amount: U256,
        one_inch_data: Bytes,
        min_usdc_out: U256,
    ) -> Result<SweepSubmission> {
        let provider = self.require_provider()?;
        let fee = U256::from(LAYERZERO_FEE_WEI);

        let sweeper = OmniSweeper::new(OMNISWEEPER, provider.clone());
        let call = sweeper
            .sweepDust(token_in, amount, one_inch_data, min_usdc_out)
            .value(fee);

        // Nonce safety: one submission through the shared signer at a time.
        let _guard = self.submission_lock.lock().await;

        let estimate = call.estimate_gas().await.map_err(classify_submit_error)?;
        let gas_limit = buffered_gas(estimate);

        let pending = call.gas(gas_limit).send().await.map_err(classify_submit_error)?;
        let hash = format!("{:#x}", pending.tx_hash());

        info!(
            target: "omnisweep::executor",
            %hash,
            user = %user_address,
            token = %token_in,
            gas_limit,
            "sweep transaction submitted"
        );

        Ok(SweepSubmission {
            hash,
            from: self.signer_address.unwrap_or(Address::ZERO),
            to: OMNISWEEPER,
            value: fee.to_string(),
            gas_limit: gas_limit.to_string(),
        })
    }

    /// Submit an ERC-20 approval through the backend signer
    pub async fn execute_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<SweepSubmission> {
        let provider = self.require_provider()?;

        let erc20 = ERC20::new(token, provider.clone());
        let call = erc20.approve(spender, amount);

        let _guard = self.submission_lock.lock().await;

        let estimate = call.estimate_gas().await.map_err(classify_submit_error)?;
        let gas_limit = buffered_gas(estimate);

        let pending = call.gas(gas_limit).send().await.map_err(classify_submit_error)?;
        let hash = format!("{:#x}", pending.tx_hash());

        info!(
            target: "omnisweep::executor",
            %hash,
            %token,
            %spender,
            "approval transaction submitted"
        );

        Ok(SweepSubmission {
            hash,
            from: self.signer_address.unwrap_or(Address::ZERO),
            to: token,
            value: "0".to_string(),
            gas_limit: gas_limit.to_string(),
        })
    }
}
