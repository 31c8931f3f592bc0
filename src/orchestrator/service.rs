//! Sweep Orchestrator
//!
//! Drives one sweep end to end: quote, approval (when the allowance
//! requires one), the OmniSweeper swap, and destination-chain
//! finalization. Each phase is behind a trait so the flow can run
//! against the live clients, the demo backend, or mocks.
//!
//! Flow errors never escape as transport errors: they land in the
//! attempt's terminal error state and the caller gets the snapshot.
//! Only pre-flight rejections (validation, a duplicate in-flight sweep)
//! surface as errors.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

use crate::chain::ChainReader;
use crate::common::{OmniSweepError, Result};
use crate::contracts::{Chain, OMNISWEEPER};
use crate::executor::{SweepExecutor, SweepSubmission};
use crate::quote::{Quote, QuoteClient};
use crate::tracker::{TransactionTracker, DEFAULT_CONFIRMATION_TIMEOUT_MS};
use crate::units::{format_units, USDC_DECIMALS};

use super::attempt::{FinalSettlement, SweepAttempt};

/// Window for the cross-chain receipt to land on the destination chain
pub const SETTLEMENT_TIMEOUT_MS: u64 = 120_000;

/// Terminal attempts kept for later lookup; oldest evicted beyond this
pub const MAX_RETAINED_ATTEMPTS: usize = 256;

/// Quote source for the swap leg
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, token_in: Address, amount: U256, chain_id: u64) -> Result<Quote>;
}

/// Transaction submission for the approval and swap legs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SweepSubmitter: Send + Sync {
    async fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<SweepSubmission>;

    async fn submit_sweep(
        &self,
        user: Address,
        token_in: Address,
        amount: U256,
        one_inch_data: Bytes,
        min_usdc_out: U256,
    ) -> Result<SweepSubmission>;
}

/// Source-chain confirmation waits
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReceiptWaiter: Send + Sync {
    async fn wait(
        &self,
        chain: Chain,
        hash: B256,
        timeout_ms: u64,
    ) -> Result<crate::chain::TxReceiptInfo>;
}

/// Destination-chain settlement observation.
///
/// The baseline is taken before the sweep is submitted; settlement is
/// the user's receipt total advancing past it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementWatcher: Send + Sync {
    async fn baseline(&self, user: Address) -> Result<U256>;

    /// Wait for the user's settled total to exceed `baseline`, returning
    /// the newly settled amount. `sweep_hash` is diagnostic only.
    async fn await_settlement(
        &self,
        user: Address,
        baseline: U256,
        sweep_hash: String,
        timeout_ms: u64,
    ) -> Result<U256>;
}

#[async_trait]
impl QuoteProvider for QuoteClient {
    async fn quote(&self, token_in: Address, amount: U256, chain_id: u64) -> Result<Quote> {
        self.get_quote(token_in, amount, chain_id).await
    }
}

#[async_trait]
impl SweepSubmitter for SweepExecutor {
    async fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<SweepSubmission> {
        self.execute_approval(token, spender, amount).await
    }

    async fn submit_sweep(
        &self,
        user: Address,
        token_in: Address,
        amount: U256,
        one_inch_data: Bytes,
        min_usdc_out: U256,
    ) -> Result<SweepSubmission> {
        self.execute_sweep(user, token_in, amount, one_inch_data, min_usdc_out)
            .await
    }
}

#[async_trait]
impl ReceiptWaiter for TransactionTracker {
    async fn wait(
        &self,
        chain: Chain,
        hash: B256,
        timeout_ms: u64,
    ) -> Result<crate::chain::TxReceiptInfo> {
        self.await_confirmation(chain, hash, timeout_ms).await
    }
}

/// Settlement watcher polling the ReceiptOApp user stats
pub struct StatsSettlementWatcher {
    reader: Arc<dyn ChainReader>,
    poll_interval: Duration,
}

impl StatsSettlementWatcher {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self {
            reader,
            poll_interval: Duration::from_secs(3),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn settled_total(&self, user: Address) -> Result<U256> {
        let stats = self.reader.user_stats(user).await?;
        U256::from_str_radix(&stats.total_swept, 10)
            .map_err(|_| OmniSweepError::chain("malformed totalSwept from ReceiptOApp"))
    }
}

#[async_trait]
impl SettlementWatcher for StatsSettlementWatcher {
    async fn baseline(&self, user: Address) -> Result<U256> {
        self.settled_total(user).await
    }

    async fn await_settlement(
        &self,
        user: Address,
        baseline: U256,
        sweep_hash: String,
        timeout_ms: u64,
    ) -> Result<U256> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            match self.settled_total(user).await {
                Ok(total) if total > baseline => return Ok(total - baseline),
                Ok(_) => {}
                Err(e) => {
                    warn!(target: "omnisweep::orchestrator", error = %e, "settlement poll failed, retrying");
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(OmniSweepError::ConfirmationTimeout {
                    hash: sweep_hash,
                    timeout_ms,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Retained attempt snapshots, insertion-ordered for eviction
#[derive(Default)]
struct AttemptLog {
    by_id: HashMap<String, SweepAttempt>,
    order: VecDeque<String>,
}

/// Holds the (user, token) slot for one running sweep.
///
/// The slot is released on drop, so an abandoned flow (client gone,
/// future dropped mid-await, panic in a phase) can never wedge the pair;
/// an attempt still non-terminal at that point is marked failed.
struct ActiveGuard<'a> {
    orchestrator: &'a SweepOrchestrator,
    key: (Address, Address),
    attempt_id: Option<String>,
    completed: bool,
}

impl<'a> ActiveGuard<'a> {
    fn acquire(
        orchestrator: &'a SweepOrchestrator,
        user: Address,
        token: Address,
    ) -> Result<Self> {
        if !orchestrator.lock_active().insert((user, token)) {
            return Err(OmniSweepError::validation(
                "a sweep for this user and token is already in progress",
            ));
        }
        Ok(Self {
            orchestrator,
            key: (user, token),
            attempt_id: None,
            completed: false,
        })
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.lock_active().remove(&self.key);
        if self.completed {
            return;
        }
        if let Some(id) = &self.attempt_id {
            let mut log = self.orchestrator.lock_attempts();
            if let Some(attempt) = log.by_id.get_mut(id) {
                attempt.fail("sweep abandoned before reaching a terminal state");
            }
        }
    }
}

/// End-to-end sweep driver
pub struct SweepOrchestrator {
    reader: Arc<dyn ChainReader>,
    quotes: Arc<dyn QuoteProvider>,
    submitter: Arc<dyn SweepSubmitter>,
    receipts: Arc<dyn ReceiptWaiter>,
    settlements: Arc<dyn SettlementWatcher>,
    active: Mutex<HashSet<(Address, Address)>>,
    attempts: Mutex<AttemptLog>,
}

impl SweepOrchestrator {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        quotes: Arc<dyn QuoteProvider>,
        submitter: Arc<dyn SweepSubmitter>,
        receipts: Arc<dyn ReceiptWaiter>,
        settlements: Arc<dyn SettlementWatcher>,
    ) -> Self {
        Self {
            reader,
            quotes,
            submitter,
            receipts,
            settlements,
            active: Mutex::new(HashSet::new()),
            attempts: Mutex::new(AttemptLog::default()),
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, HashSet<(Address, Address)>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_attempts(&self) -> MutexGuard<'_, AttemptLog> {
        self.attempts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one sweep to a terminal state and return the final snapshot.
    ///
    /// At most one sweep per (user, token) runs at a time; a duplicate
    /// request while one is in flight is rejected up front.
    pub async fn run_sweep(
        &self,
        user: Address,
        token: Address,
        amount: U256,
    ) -> Result<SweepAttempt> {
        if amount.is_zero() {
            return Err(OmniSweepError::validation("amount must be greater than zero"));
        }

        let mut guard = ActiveGuard::acquire(self, user, token)?;

        let mut attempt = SweepAttempt::new(user, token);
        guard.attempt_id = Some(attempt.id.clone());
        self.store(&attempt);

        if let Err(e) = self.drive(&mut attempt, amount).await {
            warn!(
                target: "omnisweep::orchestrator",
                attempt = %attempt.id,
                error = %e,
                "sweep attempt failed"
            );
            attempt.fail(e.to_string());
        }
        self.store(&attempt);
        guard.completed = true;
        Ok(attempt)
    }

    async fn drive(&self, attempt: &mut SweepAttempt, amount: U256) -> Result<()> {
        let user = attempt.user;
        let token = attempt.token;

        let quote = self
            .quotes
            .quote(token, amount, Chain::EthSepolia.chain_id())
            .await?;
        let min_out = quote.min_output_units()?;
        let calldata: Bytes = quote
            .one_inch_data
            .parse()
            .map_err(|_| OmniSweepError::validation("quote carries malformed swap calldata"))?;
        attempt.set_quote(quote)?;
        self.store(attempt);

        let allowance = self.reader.token_allowance(user, token, OMNISWEEPER).await?;
        if allowance.needs_approval {
            attempt.begin_approval()?;
            self.store(attempt);

            let submission = self
                .submitter
                .submit_approval(token, OMNISWEEPER, amount)
                .await?;
            let receipt = self.confirm_on_source(&submission.hash).await?;
            if !receipt.succeeded() {
                return Err(OmniSweepError::TransactionReverted(format!(
                    "approval {} reverted on chain",
                    submission.hash
                )));
            }
            attempt.complete_approval(
                submission.hash.clone(),
                Chain::EthSepolia.explorer_tx_url(&submission.hash),
            )?;
        } else {
            attempt.skip_approval()?;
        }
        self.store(attempt);

        // Settlement baseline before the sweep leaves, so the later stats
        // advance is attributable to this attempt.
        let baseline = self.settlements.baseline(user).await?;

        attempt.begin_swap()?;
        self.store(attempt);

        let submission = self
            .submitter
            .submit_sweep(user, token, amount, calldata, min_out)
            .await?;
        let receipt = self.confirm_on_source(&submission.hash).await?;
        if !receipt.succeeded() {
            return Err(OmniSweepError::TransactionReverted(format!(
                "sweep {} reverted on chain",
                submission.hash
            )));
        }
        attempt.complete_swap(
            submission.hash.clone(),
            Chain::EthSepolia.explorer_tx_url(&submission.hash),
        )?;
        attempt.begin_finalize()?;
        self.store(attempt);

        let settled = self
            .settlements
            .await_settlement(user, baseline, submission.hash.clone(), SETTLEMENT_TIMEOUT_MS)
            .await?;
        attempt.succeed(FinalSettlement {
            amount: settled.to_string(),
            amount_formatted: format_units(settled, USDC_DECIMALS),
            destination_chain: Chain::AvalancheFuji,
        })?;

        info!(
            target: "omnisweep::orchestrator",
            attempt = %attempt.id,
            user = %user,
            settled = %settled,
            "sweep settled on destination chain"
        );
        Ok(())
    }

    async fn confirm_on_source(&self, hash: &str) -> Result<crate::chain::TxReceiptInfo> {
        let parsed: B256 = hash
            .parse()
            .map_err(|_| OmniSweepError::internal(format!("unparseable tx hash: {}", hash)))?;
        self.receipts
            .wait(Chain::EthSepolia, parsed, DEFAULT_CONFIRMATION_TIMEOUT_MS)
            .await
    }

    fn store(&self, attempt: &SweepAttempt) {
        let mut log = self.lock_attempts();
        if !log.by_id.contains_key(&attempt.id) {
            log.order.push_back(attempt.id.clone());
        }
        log.by_id.insert(attempt.id.clone(), attempt.clone());

        // Evict the oldest terminal attempts past the retention cap;
        // non-terminal ones are bounded by the active set.
        while log.by_id.len() > MAX_RETAINED_ATTEMPTS {
            let AttemptLog { by_id, order } = &mut *log;
            let evictable = order.iter().position(|id| {
                by_id.get(id).map(|a| a.status.is_terminal()).unwrap_or(true)
            });
            match evictable {
                Some(pos) => {
                    if let Some(id) = order.remove(pos) {
                        by_id.remove(&id);
                    }
                }
                None => break,
            }
        }
    }

    /// Snapshot of one attempt by id
    pub fn attempt(&self, id: &str) -> Option<SweepAttempt> {
        self.lock_attempts().by_id.get(id).cloned()
    }

    /// Recorded attempts for a user, oldest first
    pub fn attempts_for(&self, user: Address) -> Vec<SweepAttempt> {
        let log = self.lock_attempts();
        log.order
            .iter()
            .filter_map(|id| log.by_id.get(id))
            .filter(|a| a.user == user)
            .cloned()
            .collect()
    }

    /// Number of retained attempt snapshots
    pub fn retained_count(&self) -> usize {
        self.lock_attempts().by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{FixtureChainReader, TxReceiptInfo};
    use crate::contracts::{TEST_DUST_TOKEN, USDC};
    use crate::orchestrator::attempt::{StepStatus, SweepStatus, STEP_FINALIZE, STEP_SWAP};

    fn mock_quote() -> Quote {
        Quote {
            one_inch_data: "0x".into(),
            estimated_output: "1000000".into(),
            min_output: "950000".into(),
            token_in: TEST_DUST_TOKEN,
            token_out: USDC,
            chain_id: 11155111,
            is_mock: true,
            message: None,
        }
    }

    fn submission(seed: u8) -> SweepSubmission {
        SweepSubmission {
            hash: format!("{:#x}", B256::from([seed; 32])),
            from: Address::from([9u8; 20]),
            to: OMNISWEEPER,
            value: "10000000000000000".into(),
            gas_limit: "240000".into(),
        }
    }

    fn receipt(hash: &str, success: bool) -> TxReceiptInfo {
        TxReceiptInfo {
            hash: hash.to_string(),
            block_number: 1,
            status: if success { "success" } else { "failed" }.to_string(),
            gas_used: "187000".into(),
            effective_gas_price: "1500000000".into(),
            logs: 3,
        }
    }

    struct Harness {
        reader: Arc<FixtureChainReader>,
        quotes: MockQuoteProvider,
        submitter: MockSweepSubmitter,
        receipts: MockReceiptWaiter,
        settlements: MockSettlementWatcher,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                reader: Arc::new(FixtureChainReader::new()),
                quotes: MockQuoteProvider::new(),
                submitter: MockSweepSubmitter::new(),
                receipts: MockReceiptWaiter::new(),
                settlements: MockSettlementWatcher::new(),
            }
        }

        fn build(self) -> SweepOrchestrator {
            SweepOrchestrator::new(
                self.reader,
                Arc::new(self.quotes),
                Arc::new(self.submitter),
                Arc::new(self.receipts),
                Arc::new(self.settlements),
            )
        }
    }

    #[tokio::test]
    async fn test_full_sweep_with_approval_reaches_success() {
        let mut h = Harness::new();
        let user = Address::from([1u8; 20]);

        h.quotes.expect_quote().returning(|_, _, _| Ok(mock_quote()));
        h.submitter
            .expect_submit_approval()
            .times(1)
            .returning(|_, _, _| Ok(submission(0x11)));
        h.submitter
            .expect_submit_sweep()
            .times(1)
            .returning(|_, _, _, _, _| Ok(submission(0x22)));
        h.receipts
            .expect_wait()
            .returning(|_, hash, _| Ok(receipt(&format!("{:#x}", hash), true)));
        h.settlements
            .expect_baseline()
            .returning(|_| Ok(U256::ZERO));
        h.settlements
            .expect_await_settlement()
            .returning(|_, _, _, _| Ok(U256::from(950_000u64)));

        let orchestrator = h.build();
        let attempt = orchestrator
            .run_sweep(user, TEST_DUST_TOKEN, U256::from(10u64).pow(U256::from(19u64)))
            .await
            .unwrap();

        assert_eq!(attempt.status, SweepStatus::Success);
        assert!(attempt.steps.iter().all(|s| s.status == StepStatus::Complete));
        for step in &attempt.steps[..2] {
            assert!(step.tx_hash.is_some());
            assert!(step.explorer_url.as_deref().unwrap().contains("sepolia.etherscan.io"));
        }

        let settlement = attempt.final_settlement.unwrap();
        assert_eq!(settlement.amount, "950000");
        assert_eq!(settlement.amount_formatted, "0.95");
        assert_eq!(settlement.destination_chain, Chain::AvalancheFuji);

        // Snapshot is queryable afterwards.
        let stored = orchestrator.attempt(&attempt.id).unwrap();
        assert_eq!(stored.status, SweepStatus::Success);
    }

    #[tokio::test]
    async fn test_existing_allowance_skips_approval_leg() {
        let mut h = Harness::new();
        let user = Address::from([2u8; 20]);
        h.reader
            .set_allowance(TEST_DUST_TOKEN, OMNISWEEPER, U256::MAX)
            .await;

        h.quotes.expect_quote().returning(|_, _, _| Ok(mock_quote()));
        h.submitter.expect_submit_approval().times(0);
        h.submitter
            .expect_submit_sweep()
            .returning(|_, _, _, _, _| Ok(submission(0x33)));
        h.receipts
            .expect_wait()
            .returning(|_, hash, _| Ok(receipt(&format!("{:#x}", hash), true)));
        h.settlements.expect_baseline().returning(|_| Ok(U256::ZERO));
        h.settlements
            .expect_await_settlement()
            .returning(|_, _, _, _| Ok(U256::from(950_000u64)));

        let attempt = h
            .build()
            .run_sweep(user, TEST_DUST_TOKEN, U256::from(1_000u64))
            .await
            .unwrap();

        assert_eq!(attempt.status, SweepStatus::Success);
        assert!(attempt.steps[0].tx_hash.is_none());
    }

    #[tokio::test]
    async fn test_reverted_sweep_lands_in_error_state() {
        let mut h = Harness::new();
        let user = Address::from([3u8; 20]);
        h.reader
            .set_allowance(TEST_DUST_TOKEN, OMNISWEEPER, U256::MAX)
            .await;

        h.quotes.expect_quote().returning(|_, _, _| Ok(mock_quote()));
        h.submitter
            .expect_submit_sweep()
            .returning(|_, _, _, _, _| Ok(submission(0x44)));
        h.receipts
            .expect_wait()
            .returning(|_, hash, _| Ok(receipt(&format!("{:#x}", hash), false)));
        h.settlements.expect_baseline().returning(|_| Ok(U256::ZERO));
        h.settlements.expect_await_settlement().times(0);

        let attempt = h
            .build()
            .run_sweep(user, TEST_DUST_TOKEN, U256::from(1_000u64))
            .await
            .unwrap();

        assert_eq!(attempt.status, SweepStatus::Error);
        assert_eq!(attempt.steps[STEP_SWAP].status, StepStatus::Error);
        assert_eq!(attempt.steps[STEP_FINALIZE].status, StepStatus::Pending);
        assert!(attempt.error.as_deref().unwrap().contains("reverted"));
    }

    /// Blocks in the settlement phase until released
    struct SlowSettlement;

    #[async_trait]
    impl SettlementWatcher for SlowSettlement {
        async fn baseline(&self, _user: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }

        async fn await_settlement(
            &self,
            _user: Address,
            _baseline: U256,
            _sweep_hash: String,
            _timeout_ms: u64,
        ) -> Result<U256> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(U256::from(950_000u64))
        }
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_sweep_rejected() {
        let mut h = Harness::new();
        let user = Address::from([4u8; 20]);
        let other_token = crate::chain::fixture::DEMO_OP_TOKEN;
        h.reader
            .set_allowance(TEST_DUST_TOKEN, OMNISWEEPER, U256::MAX)
            .await;
        h.reader
            .set_allowance(other_token, OMNISWEEPER, U256::MAX)
            .await;

        h.quotes.expect_quote().returning(|_, _, _| Ok(mock_quote()));
        h.submitter
            .expect_submit_sweep()
            .returning(|_, _, _, _, _| Ok(submission(0x55)));
        h.receipts
            .expect_wait()
            .returning(|_, hash, _| Ok(receipt(&format!("{:#x}", hash), true)));

        let orchestrator = Arc::new(SweepOrchestrator::new(
            h.reader,
            Arc::new(h.quotes),
            Arc::new(h.submitter),
            Arc::new(h.receipts),
            Arc::new(SlowSettlement),
        ));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .run_sweep(user, TEST_DUST_TOKEN, U256::from(1_000u64))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = orchestrator
            .run_sweep(user, TEST_DUST_TOKEN, U256::from(1_000u64))
            .await;
        assert!(matches!(second, Err(OmniSweepError::Validation(_))));

        // A different token for the same user is not blocked.
        let other = orchestrator
            .run_sweep(user, other_token, U256::from(1_000u64))
            .await
            .unwrap();
        assert!(other.status.is_terminal());

        let attempt = first.await.unwrap().unwrap();
        assert_eq!(attempt.status, SweepStatus::Success);

        // The guard is released after completion.
        let again = orchestrator
            .run_sweep(user, TEST_DUST_TOKEN, U256::from(1_000u64))
            .await
            .unwrap();
        assert!(again.status.is_terminal());
    }

    /// Hangs the first settlement wait, settles immediately afterwards
    struct FlakySettlement {
        hang_first: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl SettlementWatcher for FlakySettlement {
        async fn baseline(&self, _user: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }

        async fn await_settlement(
            &self,
            _user: Address,
            _baseline: U256,
            _sweep_hash: String,
            _timeout_ms: u64,
        ) -> Result<U256> {
            if self.hang_first.swap(false, std::sync::atomic::Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(U256::from(950_000u64))
        }
    }

    #[tokio::test]
    async fn test_dropped_sweep_releases_guard_and_fails_attempt() {
        let mut h = Harness::new();
        let user = Address::from([10u8; 20]);
        h.reader
            .set_allowance(TEST_DUST_TOKEN, OMNISWEEPER, U256::MAX)
            .await;

        h.quotes.expect_quote().returning(|_, _, _| Ok(mock_quote()));
        h.submitter
            .expect_submit_sweep()
            .returning(|_, _, _, _, _| Ok(submission(0x66)));
        h.receipts
            .expect_wait()
            .returning(|_, hash, _| Ok(receipt(&format!("{:#x}", hash), true)));

        let orchestrator = Arc::new(SweepOrchestrator::new(
            h.reader,
            Arc::new(h.quotes),
            Arc::new(h.submitter),
            Arc::new(h.receipts),
            Arc::new(FlakySettlement {
                hang_first: std::sync::atomic::AtomicBool::new(true),
            }),
        ));

        // Drop the flow mid-settlement, as a disconnecting caller would.
        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .run_sweep(user, TEST_DUST_TOKEN, U256::from(1_000u64))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        // The abandoned attempt is terminal, not wedged in finalizing.
        let attempts = orchestrator.attempts_for(user);
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, SweepStatus::Error);
        assert!(attempts[0].error.as_deref().unwrap().contains("abandoned"));

        // The slot is free again and a retry completes.
        let retry = orchestrator
            .run_sweep(user, TEST_DUST_TOKEN, U256::from(1_000u64))
            .await
            .unwrap();
        assert_eq!(retry.status, SweepStatus::Success);
    }

    #[tokio::test]
    async fn test_terminal_attempts_evicted_beyond_cap() {
        let mut h = Harness::new();
        let user = Address::from([11u8; 20]);
        h.reader
            .set_allowance(TEST_DUST_TOKEN, OMNISWEEPER, U256::MAX)
            .await;

        h.quotes.expect_quote().returning(|_, _, _| Ok(mock_quote()));
        h.submitter
            .expect_submit_sweep()
            .returning(|_, _, _, _, _| Ok(submission(0x77)));
        h.receipts
            .expect_wait()
            .returning(|_, hash, _| Ok(receipt(&format!("{:#x}", hash), true)));
        h.settlements.expect_baseline().returning(|_| Ok(U256::ZERO));
        h.settlements
            .expect_await_settlement()
            .returning(|_, _, _, _| Ok(U256::from(950_000u64)));

        let orchestrator = h.build();
        let mut last_id = String::new();
        for _ in 0..(MAX_RETAINED_ATTEMPTS + 20) {
            let attempt = orchestrator
                .run_sweep(user, TEST_DUST_TOKEN, U256::from(1_000u64))
                .await
                .unwrap();
            last_id = attempt.id;
        }

        assert_eq!(orchestrator.retained_count(), MAX_RETAINED_ATTEMPTS);
        assert!(orchestrator.attempt(&last_id).is_some());
    }

    #[tokio::test]
    async fn test_malformed_quote_calldata_fails_attempt_not_call() {
        let mut h = Harness::new();
        h.quotes.expect_quote().returning(|_, _, _| {
            let mut quote = mock_quote();
            quote.one_inch_data = "not-hex".into();
            Ok(quote)
        });
        h.submitter.expect_submit_sweep().times(0);
        h.submitter.expect_submit_approval().times(0);

        let attempt = h
            .build()
            .run_sweep(Address::from([5u8; 20]), TEST_DUST_TOKEN, U256::from(1u64))
            .await
            .unwrap();

        assert_eq!(attempt.status, SweepStatus::Error);
        assert!(attempt.error.as_deref().unwrap().contains("calldata"));
    }

    #[tokio::test]
    async fn test_stats_watcher_times_out_without_settlement() {
        let reader = Arc::new(FixtureChainReader::new());
        let watcher = StatsSettlementWatcher::new(reader.clone())
            .with_poll_interval(Duration::from_millis(5));
        let user = Address::from([6u8; 20]);

        let baseline = watcher.baseline(user).await.unwrap();
        let result = watcher
            .await_settlement(user, baseline, "0xabc".into(), 40)
            .await;
        assert!(matches!(result, Err(OmniSweepError::ConfirmationTimeout { .. })));
    }

    #[tokio::test]
    async fn test_stats_watcher_sees_advance_past_baseline() {
        let reader = Arc::new(FixtureChainReader::new());
        let watcher = StatsSettlementWatcher::new(reader.clone())
            .with_poll_interval(Duration::from_millis(5));
        let user = Address::from([7u8; 20]);

        let baseline = watcher.baseline(user).await.unwrap();
        reader.record_settlement(user, U256::from(950_000u64)).await;

        let settled = watcher
            .await_settlement(user, baseline, "0xabc".into(), 1_000)
            .await
            .unwrap();
        assert_eq!(settled, U256::from(950_000u64));
    }
}
