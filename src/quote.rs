//! Swap Quote Service
//!
//! Thin client over the 1inch aggregator API. Requests a swap from a dust
//! token into the USDC settlement asset, executed from the OmniSweeper
//! contract, with a fixed 5% slippage tolerance.
//!
//! Aggregator failures (non-2xx, timeout, missing key) never fail the
//! caller: the client degrades to a mock quote that is explicitly flagged
//! `is_mock` so the demo flow can continue without ever presenting mock
//! data as authoritative. Only input validation errors propagate.

use alloy_primitives::{Address, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::{OmniSweepError, Result};
use crate::config::OmniSweepConfig;
use crate::contracts::{Chain, OMNISWEEPER, USDC};
use crate::logging::log_quote_event;

/// Fixed slippage tolerance applied to every quote, in percent
pub const SLIPPAGE_PERCENT: u64 = 5;

/// Mock estimated output: 1 USDC in 6-decimal base units
pub const MOCK_ESTIMATED_OUTPUT: u64 = 1_000_000;

const AGGREGATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// A swap quote, valid for a single sweep attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Swap calldata for OmniSweeper.sweepDust ("0x" when mocked)
    pub one_inch_data: String,
    /// Estimated USDC output in base units (decimal string)
    pub estimated_output: String,
    /// Minimum acceptable output under the slippage policy
    pub min_output: String,
    pub token_in: Address,
    pub token_out: Address,
    pub chain_id: u64,
    /// True when the aggregator was unavailable and this is a degraded
    /// placeholder quote, never to be treated as authoritative.
    pub is_mock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Quote {
    /// Estimated output as base units
    pub fn estimated_output_units(&self) -> Result<U256> {
        parse_base_units(&self.estimated_output)
    }

    /// Minimum output as base units
    pub fn min_output_units(&self) -> Result<U256> {
        parse_base_units(&self.min_output)
    }
}

/// `floor(estimated * (100 - slippage) / 100)`
pub fn min_output_for(estimated: U256) -> U256 {
    let keep = U256::from(100 - SLIPPAGE_PERCENT);
    match estimated.checked_mul(keep) {
        Some(scaled) => scaled / U256::from(100),
        // Estimates near U256::MAX: divide first. Rounds down further,
        // which stays on the safe side of the tolerance.
        None => estimated / U256::from(100) * keep,
    }
}

fn parse_base_units(s: &str) -> Result<U256> {
    U256::from_str_radix(s, 10)
        .map_err(|_| OmniSweepError::validation(format!("not a base-unit amount: {}", s)))
}

#[derive(Debug, Deserialize)]
struct OneInchSwapResponse {
    tx: OneInchTx,
    #[serde(rename = "toAmount")]
    to_amount: String,
}

#[derive(Debug, Deserialize)]
struct OneInchTx {
    data: String,
}

/// 1inch aggregator client
#[derive(Debug, Clone)]
pub struct QuoteClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QuoteClient {
    /// Create with a custom base URL (tests point this at a dead port)
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(AGGREGATOR_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &OmniSweepConfig) -> Self {
        Self::new(&config.oneinch_api_url, config.oneinch_api_key.clone())
    }

    /// Fetch a quote for swapping `amount` of `token_in` into USDC.
    ///
    /// Validation failures propagate without any upstream call; every
    /// aggregator-level failure is absorbed into the mock fallback.
    pub async fn get_quote(&self, token_in: Address, amount: U256, chain_id: u64) -> Result<Quote> {
        if amount.is_zero() {
            return Err(OmniSweepError::validation("amount must be greater than zero"));
        }
        if token_in == Address::ZERO {
            return Err(OmniSweepError::validation("tokenIn must be a contract address"));
        }
        if token_in == USDC {
            return Err(OmniSweepError::validation(
                "tokenIn must differ from the USDC settlement asset",
            ));
        }

        match self.fetch_aggregator_quote(token_in, amount, chain_id).await {
            Ok(quote) => {
                log_quote_event(&token_in.to_string(), &amount.to_string(), false);
                Ok(quote)
            }
            Err(e) => {
                log_quote_event(&token_in.to_string(), &amount.to_string(), true);
                tracing::warn!(target: "omnisweep::quote", error = %e, "aggregator unavailable, serving mock quote");
                Ok(self.mock_quote(token_in, chain_id))
            }
        }
    }

    async fn fetch_aggregator_quote(
        &self,
        token_in: Address,
        amount: U256,
        chain_id: u64,
    ) -> Result<Quote> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OmniSweepError::upstream("no aggregator API key configured"))?;

        let url = format!("{}/{}/swap", self.base_url, chain_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(key)
            .header("Accept", "application/json")
            .query(&[
                ("src", token_in.to_string()),
                ("dst", USDC.to_string()),
                ("amount", amount.to_string()),
                ("from", OMNISWEEPER.to_string()),
                ("slippage", SLIPPAGE_PERCENT.to_string()),
                ("disableEstimate", "true".to_string()),
                ("allowPartialFill", "false".to_string()),
            ])
            .send()
            .await
            .map_err(|e| OmniSweepError::upstream(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(OmniSweepError::upstream(format!(
                "aggregator returned {}",
                resp.status()
            )));
        }

        let body: OneInchSwapResponse =
            resp.json().await.map_err(|e| OmniSweepError::upstream(e.to_string()))?;

        let estimated = parse_base_units(&body.to_amount)
            .map_err(|_| OmniSweepError::upstream("aggregator returned malformed toAmount"))?;
        let min = min_output_for(estimated);

        Ok(Quote {
            one_inch_data: body.tx.data,
            estimated_output: estimated.to_string(),
            min_output: min.to_string(),
            token_in,
            token_out: USDC,
            chain_id,
            is_mock: false,
            message: None,
        })
    }

    /// Degraded placeholder quote: zero-effect calldata, nominal estimate.
    fn mock_quote(&self, token_in: Address, chain_id: u64) -> Quote {
        let estimated = U256::from(MOCK_ESTIMATED_OUTPUT);
        Quote {
            one_inch_data: "0x".to_string(),
            estimated_output: estimated.to_string(),
            min_output: min_output_for(estimated).to_string(),
            token_in,
            token_out: USDC,
            chain_id,
            is_mock: true,
            message: Some("aggregator unavailable - using mock data".to_string()),
        }
    }
}
