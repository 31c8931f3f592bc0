//! Demo Sweep Backend
//!
//! Submission and settlement against the fixture reader instead of real
//! chains. Every submitted transaction confirms immediately and every
//! sweep settles for its quoted minimum, so the full orchestrated flow
//! runs offline.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::chain::{ChainReader, FixtureChainReader};
use crate::common::Result;
use crate::contracts::OMNISWEEPER;
use crate::executor::SweepSubmission;
use crate::tracker::TransactionTracker;

use super::service::{SettlementWatcher, SweepOrchestrator, SweepSubmitter, QuoteProvider};

pub struct DemoSweepBackend {
    reader: Arc<FixtureChainReader>,
    sequence: AtomicU64,
    pending: Mutex<HashMap<Address, U256>>,
}

impl DemoSweepBackend {
    pub fn new(reader: Arc<FixtureChainReader>) -> Self {
        Self {
            reader,
            sequence: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    async fn confirmed_submission(&self, to: Address, value: &str) -> SweepSubmission {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let hash = B256::from(U256::from(n));
        self.reader.insert_receipt(hash, true).await;

        SweepSubmission {
            hash: format!("{:#x}", hash),
            from: Address::ZERO,
            to,
            value: value.to_string(),
            gas_limit: "240000".to_string(),
        }
    }
}

#[async_trait]
impl SweepSubmitter for DemoSweepBackend {
    async fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<SweepSubmission> {
        self.reader.set_allowance(token, spender, amount).await;
        Ok(self.confirmed_submission(token, "0").await)
    }

    async fn submit_sweep(
        &self,
        user: Address,
        _token_in: Address,
        _amount: U256,
        _one_inch_data: Bytes,
        min_usdc_out: U256,
    ) -> Result<SweepSubmission> {
        self.pending.lock().await.insert(user, min_usdc_out);
        Ok(self
            .confirmed_submission(OMNISWEEPER, "10000000000000000")
            .await)
    }
}

#[async_trait]
impl SettlementWatcher for DemoSweepBackend {
    async fn baseline(&self, user: Address) -> Result<U256> {
        let stats = self.reader.user_stats(user).await?;
        Ok(U256::from_str_radix(&stats.total_swept, 10).unwrap_or(U256::ZERO))
    }

    async fn await_settlement(
        &self,
        user: Address,
        _baseline: U256,
        _sweep_hash: String,
        _timeout_ms: u64,
    ) -> Result<U256> {
        let amount = self
            .pending
            .lock()
            .await
            .remove(&user)
            .unwrap_or(U256::from(950_000u64));
        self.reader.record_settlement(user, amount).await;
        Ok(amount)
    }
}

/// Orchestrator wired entirely against the fixture reader
pub fn demo_orchestrator(
    reader: Arc<FixtureChainReader>,
    quotes: Arc<dyn QuoteProvider>,
) -> SweepOrchestrator {
    let backend = Arc::new(DemoSweepBackend::new(reader.clone()));
    let tracker = TransactionTracker::new(reader.clone())
        .with_poll_interval(std::time::Duration::from_millis(50));

    SweepOrchestrator::new(
        reader,
        quotes,
        backend.clone(),
        Arc::new(tracker),
        backend,
    )
}
