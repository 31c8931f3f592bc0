//! Transaction Tracker
//!
//! Polls a chain for the receipt of a submitted transaction until one
//! confirmation is observed or the window closes. A timeout here ends the
//! tracking attempt only - the transaction may still confirm later, so
//! callers may re-poll with the same hash.

use alloy_primitives::B256;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::chain::{ChainReader, TxReceiptInfo};
use crate::common::{OmniSweepError, Result};
use crate::contracts::Chain;

/// Default confirmation window
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 60_000;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Receipt poller over a chain data source
#[derive(Clone)]
pub struct TransactionTracker {
    reader: Arc<dyn ChainReader>,
    poll_interval: Duration,
}

impl TransactionTracker {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self {
            reader,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll cadence (tests use a few milliseconds)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Wait until `hash` has a receipt on `chain`, up to `timeout_ms`.
    ///
    /// RPC blips during the wait are retried until the window closes; a
    /// closed window yields `ConfirmationTimeout`, never a fabricated
    /// "failed" status.
    pub async fn await_confirmation(
        &self,
        chain: Chain,
        hash: B256,
        timeout_ms: u64,
    ) -> Result<TxReceiptInfo> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            match self.reader.transaction_receipt(chain, hash).await {
                Ok(Some(receipt)) => {
                    debug!(
                        target: "omnisweep::tracker",
                        hash = %receipt.hash,
                        status = %receipt.status,
                        block = receipt.block_number,
                        "receipt observed"
                    );
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(target: "omnisweep::tracker", error = %e, "receipt poll failed, retrying");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(OmniSweepError::ConfirmationTimeout {
                    hash: format!("{:#x}", hash),
                    timeout_ms,
                });
            }

            let remaining = deadline - now;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}
