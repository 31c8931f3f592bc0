//! OmniSweep Backend
//!
//! Cross-chain dust sweep orchestration service. Sweeps small ERC-20
//! balances on Ethereum Sepolia into USDC through the OmniSweeper
//! contract and confirms settlement against the ReceiptOApp statistics
//! contract on Avalanche Fuji.
//!
//! The service is stateless: every response is derived from chain reads,
//! the swap aggregator, or in-memory orchestration state. There is no
//! database.

pub mod api;
pub mod chain;
pub mod common;
pub mod config;
pub mod contracts;
pub mod events;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod quote;
pub mod signer;
pub mod tracker;

pub use common::{OmniSweepError, Result};
pub use config::OmniSweepConfig;
pub use contracts::Chain;

/// Token amount formatting helpers
pub mod units {
    use alloy_primitives::U256;

    /// USDC settlement decimals on both chains
    pub const USDC_DECIMALS: u8 = 6;

    /// Format a base-unit amount as a decimal string.
    ///
    /// Trailing fractional zeros are trimmed, but at least one fractional
    /// digit is kept so whole amounts render as "10.0" rather than "10".
    pub fn format_units(amount: U256, decimals: u8) -> String {
        if decimals == 0 {
            return format!("{}.0", amount);
        }

        let divisor = U256::from(10u64).pow(U256::from(decimals as u64));
        let whole = amount / divisor;
        let frac = amount % divisor;

        if frac.is_zero() {
            return format!("{}.0", whole);
        }

        let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
        let trimmed = frac_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }

}
