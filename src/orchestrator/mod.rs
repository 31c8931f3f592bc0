//! Sweep Orchestration
//!
//! The attempt state machine, the end-to-end flow driver, and the demo
//! backend that runs the same flow against fixtures.

pub mod attempt;
pub mod demo;
pub mod service;

pub use attempt::{FinalSettlement, Step, StepStatus, SweepAttempt, SweepStatus};
pub use demo::{demo_orchestrator, DemoSweepBackend};
pub use service::{
    QuoteProvider, ReceiptWaiter, SettlementWatcher, StatsSettlementWatcher, SweepOrchestrator,
    SweepSubmitter, MAX_RETAINED_ATTEMPTS, SETTLEMENT_TIMEOUT_MS,
};
