//! Sweep Attempt State Machine
//!
//! Pure in-memory model of one orchestrated sweep. State only moves
//! forward: idle, approving, swapping, finalizing, then success, with
//! error reachable from any non-terminal state. While a phase is active
//! exactly one step is in progress; completed steps never reopen.
//!
//! Success is asserted only from observed destination-chain settlement,
//! never from submission alone.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{OmniSweepError, Result};
use crate::contracts::Chain;
use crate::quote::Quote;

pub const STEP_APPROVE: usize = 0;
pub const STEP_SWAP: usize = 1;
pub const STEP_FINALIZE: usize = 2;

/// Overall attempt state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SweepStatus {
    Idle,
    Approving,
    Swapping,
    Finalizing,
    Success,
    Error,
}

impl SweepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SweepStatus::Success | SweepStatus::Error)
    }
}

/// State of one step within the attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Pending,
    InProgress,
    Complete,
    Error,
}

/// One step of the sweep flow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: &'static str,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl Step {
    fn pending(name: &'static str) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            tx_hash: None,
            explorer_url: None,
        }
    }
}

/// Observed destination-chain settlement for a completed sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSettlement {
    /// Settled USDC in base units (decimal string)
    pub amount: String,
    pub amount_formatted: String,
    pub destination_chain: Chain,
}

/// One orchestrated sweep, from quote to settled receipt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepAttempt {
    pub id: String,
    pub user: Address,
    pub token: Address,
    pub status: SweepStatus,
    pub steps: [Step; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_settlement: Option<FinalSettlement>,
}

impl SweepAttempt {
    pub fn new(user: Address, token: Address) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user,
            token,
            status: SweepStatus::Idle,
            steps: [
                Step::pending("approve"),
                Step::pending("swap"),
                Step::pending("finalize"),
            ],
            quote: None,
            error: None,
            final_settlement: None,
        }
    }

    fn invalid(&self, wanted: &str) -> OmniSweepError {
        OmniSweepError::internal(format!(
            "invalid sweep transition: {} while {:?}",
            wanted, self.status
        ))
    }

    /// Attach the quote. Only valid before any step starts.
    pub fn set_quote(&mut self, quote: Quote) -> Result<()> {
        if self.status != SweepStatus::Idle {
            return Err(self.invalid("set_quote"));
        }
        self.quote = Some(quote);
        Ok(())
    }

    pub fn begin_approval(&mut self) -> Result<()> {
        if self.status != SweepStatus::Idle {
            return Err(self.invalid("begin_approval"));
        }
        self.status = SweepStatus::Approving;
        self.steps[STEP_APPROVE].status = StepStatus::InProgress;
        Ok(())
    }

    /// Mark the approval step complete without a transaction. Used when
    /// the existing allowance already covers the sweep.
    pub fn skip_approval(&mut self) -> Result<()> {
        if self.status != SweepStatus::Idle {
            return Err(self.invalid("skip_approval"));
        }
        self.steps[STEP_APPROVE].status = StepStatus::Complete;
        Ok(())
    }

    pub fn complete_approval(&mut self, tx_hash: String, explorer_url: String) -> Result<()> {
        if self.status != SweepStatus::Approving {
            return Err(self.invalid("complete_approval"));
        }
        let step = &mut self.steps[STEP_APPROVE];
        step.status = StepStatus::Complete;
        step.tx_hash = Some(tx_hash);
        step.explorer_url = Some(explorer_url);
        Ok(())
    }

    pub fn begin_swap(&mut self) -> Result<()> {
        let approval_done = self.steps[STEP_APPROVE].status == StepStatus::Complete;
        let from_idle = self.status == SweepStatus::Idle;
        let from_approving = self.status == SweepStatus::Approving;
        if !approval_done || !(from_idle || from_approving) {
            return Err(self.invalid("begin_swap"));
        }
        self.status = SweepStatus::Swapping;
        self.steps[STEP_SWAP].status = StepStatus::InProgress;
        Ok(())
    }

    pub fn complete_swap(&mut self, tx_hash: String, explorer_url: String) -> Result<()> {
        if self.status != SweepStatus::Swapping {
            return Err(self.invalid("complete_swap"));
        }
        let step = &mut self.steps[STEP_SWAP];
        step.status = StepStatus::Complete;
        step.tx_hash = Some(tx_hash);
        step.explorer_url = Some(explorer_url);
        Ok(())
    }

    pub fn begin_finalize(&mut self) -> Result<()> {
        if self.status != SweepStatus::Swapping
            || self.steps[STEP_SWAP].status != StepStatus::Complete
        {
            return Err(self.invalid("begin_finalize"));
        }
        self.status = SweepStatus::Finalizing;
        self.steps[STEP_FINALIZE].status = StepStatus::InProgress;
        Ok(())
    }

    /// Terminal success, asserted from an observed settlement
    pub fn succeed(&mut self, settlement: FinalSettlement) -> Result<()> {
        if self.status != SweepStatus::Finalizing {
            return Err(self.invalid("succeed"));
        }
        self.steps[STEP_FINALIZE].status = StepStatus::Complete;
        self.final_settlement = Some(settlement);
        self.status = SweepStatus::Success;
        Ok(())
    }

    /// Terminal error from any non-terminal state. The active step (if
    /// any) is marked errored; completed steps are left untouched.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        for step in self.steps.iter_mut() {
            if step.status == StepStatus::InProgress {
                step.status = StepStatus::Error;
            }
        }
        self.error = Some(message.into());
        self.status = SweepStatus::Error;
    }

    pub fn in_progress_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::InProgress)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::TEST_DUST_TOKEN;

    fn attempt() -> SweepAttempt {
        SweepAttempt::new(Address::from([1u8; 20]), TEST_DUST_TOKEN)
    }

    fn url(hash: &str) -> String {
        Chain::EthSepolia.explorer_tx_url(hash)
    }

    #[test]
    fn test_full_flow_with_approval() {
        let mut a = attempt();
        assert_eq!(a.status, SweepStatus::Idle);
        assert_eq!(a.in_progress_count(), 0);

        a.begin_approval().unwrap();
        assert_eq!(a.in_progress_count(), 1);
        a.complete_approval("0x01".into(), url("0x01")).unwrap();
        assert_eq!(a.in_progress_count(), 0);

        a.begin_swap().unwrap();
        assert_eq!(a.in_progress_count(), 1);
        a.complete_swap("0x02".into(), url("0x02")).unwrap();

        a.begin_finalize().unwrap();
        assert_eq!(a.in_progress_count(), 1);
        a.succeed(FinalSettlement {
            amount: "950000".into(),
            amount_formatted: "0.95".into(),
            destination_chain: Chain::AvalancheFuji,
        })
        .unwrap();

        assert_eq!(a.status, SweepStatus::Success);
        assert!(a.steps.iter().all(|s| s.status == StepStatus::Complete));
        assert!(a.final_settlement.is_some());
    }

    #[test]
    fn test_skip_approval_path() {
        let mut a = attempt();
        a.skip_approval().unwrap();
        assert_eq!(a.steps[STEP_APPROVE].status, StepStatus::Complete);
        assert!(a.steps[STEP_APPROVE].tx_hash.is_none());
        a.begin_swap().unwrap();
        assert_eq!(a.status, SweepStatus::Swapping);
    }

    #[test]
    fn test_steps_cannot_be_skipped() {
        let mut a = attempt();
        // Swap before the approval step resolves.
        assert!(a.begin_swap().is_err());

        a.begin_approval().unwrap();
        // Finalize before swapping.
        assert!(a.begin_finalize().is_err());
    }

    #[test]
    fn test_at_most_one_step_in_progress() {
        let mut a = attempt();
        a.begin_approval().unwrap();
        // Starting another phase while approving is rejected.
        assert!(a.begin_swap().is_err());
        assert_eq!(a.in_progress_count(), 1);
    }

    #[test]
    fn test_failure_marks_only_active_step() {
        let mut a = attempt();
        a.skip_approval().unwrap();
        a.begin_swap().unwrap();
        a.fail("execution reverted");

        assert_eq!(a.status, SweepStatus::Error);
        assert_eq!(a.steps[STEP_APPROVE].status, StepStatus::Complete);
        assert_eq!(a.steps[STEP_SWAP].status, StepStatus::Error);
        assert_eq!(a.steps[STEP_FINALIZE].status, StepStatus::Pending);
        assert_eq!(a.error.as_deref(), Some("execution reverted"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut a = attempt();
        a.fail("aborted");
        let before = a.error.clone();
        // A later failure does not rewrite the terminal state.
        a.fail("second error");
        assert_eq!(a.error, before);

        assert!(a.begin_approval().is_err());
        assert!(a.begin_swap().is_err());
    }

    #[test]
    fn test_quote_only_before_steps_start() {
        let mut a = attempt();
        a.begin_approval().unwrap();
        let quote = Quote {
            one_inch_data: "0x".into(),
            estimated_output: "1000000".into(),
            min_output: "950000".into(),
            token_in: TEST_DUST_TOKEN,
            token_out: crate::contracts::USDC,
            chain_id: 11155111,
            is_mock: true,
            message: None,
        };
        assert!(a.set_quote(quote).is_err());
    }

    #[test]
    fn test_snapshot_wire_casing() {
        let a = attempt();
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["steps"][0]["name"], "approve");
        assert_eq!(json["steps"][0]["status"], "pending");
        assert!(json.get("finalSettlement").is_none());
    }
}
