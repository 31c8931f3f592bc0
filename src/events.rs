//! On-chain Event Subscriptions
//!
//! Poll-based log subscriptions for the two protocol events: `DustSwept`
//! on the source chain and `SweepReceipt` on the destination chain.
//!
//! Subscriptions are explicit and cancellable: `subscribe` returns an
//! `EventSubscription` handle, and after `cancel()` returns the handler
//! is never invoked again. There is no global listener registry; each
//! subscription owns its own polling task.

use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chain::ChainError;
use crate::contracts::{OmniSweeper, ReceiptOApp, OMNISWEEPER, RECEIPT_OAPP};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Decoded DustSwept event from the source chain
#[derive(Debug, Clone)]
pub struct DustSweptEvent {
    pub user: Address,
    pub token_in: Address,
    pub amount_in: String,
    pub usdc_out: String,
    pub gas_cost: String,
    pub net_output: String,
    pub timestamp: u64,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
}

/// Decoded SweepReceipt event from the destination chain
#[derive(Debug, Clone)]
pub struct SweepReceiptEvent {
    pub user: Address,
    pub amount: String,
    pub src_chain_id: u32,
    pub timestamp: u64,
    pub guid: B256,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
}

/// Source of new logs for one subscription
#[async_trait]
pub trait LogSource: Send {
    /// Return logs that appeared since the previous poll
    async fn poll_new_logs(&mut self) -> Result<Vec<Log>, ChainError>;
}

/// RPC-backed log source scanning forward from the subscription start
pub struct RpcLogSource {
    provider: DynProvider,
    address: Address,
    topic0: B256,
    last_block: Option<u64>,
}

impl RpcLogSource {
    pub fn new(provider: DynProvider, address: Address, topic0: B256) -> Self {
        Self {
            provider,
            address,
            topic0,
            last_block: None,
        }
    }
}

#[async_trait]
impl LogSource for RpcLogSource {
    async fn poll_new_logs(&mut self) -> Result<Vec<Log>, ChainError> {
        let tip = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        let from = match self.last_block {
            // First poll establishes the baseline, nothing to report yet.
            None => {
                self.last_block = Some(tip);
                return Ok(Vec::new());
            }
            Some(last) if tip <= last => return Ok(Vec::new()),
            Some(last) => last + 1,
        };

        let filter = Filter::new()
            .address(self.address)
            .event_signature(self.topic0)
            .from_block(from)
            .to_block(tip);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        self.last_block = Some(tip);
        Ok(logs)
    }
}

/// Handle to a running subscription
pub struct EventSubscription {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl EventSubscription {
    /// Stop the subscription. After this returns the handler will not be
    /// invoked again: the polling task is joined, so an invocation that
    /// raced past the flag check has finished by the time this resolves.
    pub async fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
        let _ = self.handle.await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Subscribe a handler to a log source.
///
/// The cancellation flag is checked immediately before every handler
/// invocation, so no invocation starts after `cancel()`.
pub fn subscribe<S>(
    mut source: S,
    handler: Arc<dyn Fn(Log) + Send + Sync>,
    poll_interval: Duration,
) -> EventSubscription
where
    S: LogSource + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();

    let handle = tokio::spawn(async move {
        loop {
            if flag.load(Ordering::SeqCst) {
                return;
            }

            match source.poll_new_logs().await {
                Ok(logs) => {
                    for log in logs {
                        if flag.load(Ordering::SeqCst) {
                            return;
                        }
                        handler(log);
                    }
                }
                Err(e) => {
                    warn!(target: "omnisweep::events", error = %e, "log poll failed, retrying");
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    });

    EventSubscription { cancelled, handle }
}

/// Subscribe to DustSwept events on the source chain
pub fn subscribe_dust_swept(
    provider: DynProvider,
    handler: impl Fn(DustSweptEvent) + Send + Sync + 'static,
) -> EventSubscription {
    let source = RpcLogSource::new(
        provider,
        OMNISWEEPER,
        OmniSweeper::DustSwept::SIGNATURE_HASH,
    );

    subscribe(
        source,
        Arc::new(move |log| match decode_dust_swept(&log) {
            Ok(event) => handler(event),
            Err(e) => debug!(target: "omnisweep::events", error = %e, "undecodable DustSwept log"),
        }),
        DEFAULT_POLL_INTERVAL,
    )
}

/// Subscribe to SweepReceipt events on the destination chain
pub fn subscribe_sweep_receipts(
    provider: DynProvider,
    handler: impl Fn(SweepReceiptEvent) + Send + Sync + 'static,
) -> EventSubscription {
    let source = RpcLogSource::new(
        provider,
        RECEIPT_OAPP,
        ReceiptOApp::SweepReceipt::SIGNATURE_HASH,
    );

    subscribe(
        source,
        Arc::new(move |log| match decode_sweep_receipt(&log) {
            Ok(event) => handler(event),
            Err(e) => debug!(target: "omnisweep::events", error = %e, "undecodable SweepReceipt log"),
        }),
        DEFAULT_POLL_INTERVAL,
    )
}

/// Decode a raw log into a DustSwept event
pub fn decode_dust_swept(log: &Log) -> Result<DustSweptEvent, ChainError> {
    let data = log.data();
    let decoded = OmniSweeper::DustSwept::decode_raw_log(log.topics(), &data.data)
        .map_err(|e| ChainError::Contract(e.to_string()))?;

    Ok(DustSweptEvent {
        user: decoded.user,
        token_in: decoded.tokenIn,
        amount_in: decoded.amountIn.to_string(),
        usdc_out: decoded.usdcOut.to_string(),
        gas_cost: decoded.gasCost.to_string(),
        net_output: decoded.netOutput.to_string(),
        timestamp: decoded.timestamp.to::<u64>(),
        tx_hash: log.transaction_hash.map(|h| format!("{:#x}", h)),
        block_number: log.block_number,
    })
}

/// Decode a raw log into a SweepReceipt event
pub fn decode_sweep_receipt(log: &Log) -> Result<SweepReceiptEvent, ChainError> {
    let data = log.data();
    let decoded = ReceiptOApp::SweepReceipt::decode_raw_log(log.topics(), &data.data)
        .map_err(|e| ChainError::Contract(e.to_string()))?;

    Ok(SweepReceiptEvent {
        user: decoded.user,
        amount: decoded.amount.to_string(),
        src_chain_id: decoded.srcChainId,
        timestamp: decoded.timestamp.to::<u64>(),
        guid: decoded.guid,
        tx_hash: log.transaction_hash.map(|h| format!("{:#x}", h)),
        block_number: log.block_number,
    })
}
