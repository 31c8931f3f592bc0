//! Fixture Chain Reader
//!
//! Deterministic demo twin of the live reader: same trait, canned data,
//! no network access. Backs the `fixture` data source and the unit tests
//! that need receipt lookups without a chain.

use alloy_primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::contracts::{Chain, TEST_DUST_TOKEN};
use crate::units::{format_units, USDC_DECIMALS};

use super::{
    ChainReader, ChainResult, DustToken, ProtocolStats, TokenAllowance, TokenBalance,
    TxReceiptInfo, UserStats,
};

/// Second demo token alongside the deployed test dust token
pub const DEMO_OP_TOKEN: Address = address!("0x4200000000000000000000000000000000000042");

#[derive(Debug, Clone)]
struct FixtureToken {
    symbol: &'static str,
    name: &'static str,
    decimals: u8,
    balance: u128,
    value_usd: f64,
}

/// Demo data source
pub struct FixtureChainReader {
    tokens: HashMap<Address, FixtureToken>,
    allowances: RwLock<HashMap<(Address, Address), U256>>,
    receipts: RwLock<HashMap<B256, TxReceiptInfo>>,
    user_totals: RwLock<HashMap<Address, (U256, u64)>>,
}

impl FixtureChainReader {
    pub fn new() -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(
            TEST_DUST_TOKEN,
            FixtureToken {
                symbol: "DUST",
                name: "Test Dust Token",
                decimals: 18,
                balance: 10_000_000_000_000_000_000, // 10 DUST
                value_usd: 1.02,
            },
        );
        tokens.insert(
            DEMO_OP_TOKEN,
            FixtureToken {
                symbol: "OP",
                name: "Optimism",
                decimals: 18,
                balance: 2_340_000_000_000_000_000, // 2.34 OP
                value_usd: 5.21,
            },
        );

        Self {
            tokens,
            allowances: RwLock::new(HashMap::new()),
            receipts: RwLock::new(HashMap::new()),
            user_totals: RwLock::new(HashMap::new()),
        }
    }

    /// Seed an allowance for (token, spender)
    pub async fn set_allowance(&self, token: Address, spender: Address, amount: U256) {
        self.allowances.write().await.insert((token, spender), amount);
    }

    /// Seed a mined receipt so `transaction_receipt` finds it
    pub async fn insert_receipt(&self, hash: B256, success: bool) {
        let info = TxReceiptInfo {
            hash: format!("{:#x}", hash),
            block_number: 4_200_000,
            status: if success { "success" } else { "failed" }.to_string(),
            gas_used: "187000".to_string(),
            effective_gas_price: "1500000000".to_string(),
            logs: 3,
        };
        self.receipts.write().await.insert(hash, info);
    }

    /// Record a settled sweep, advancing the user's receipt stats
    pub async fn record_settlement(&self, user: Address, amount: U256) {
        let mut totals = self.user_totals.write().await;
        let entry = totals.entry(user).or_insert((U256::ZERO, 0));
        entry.0 += amount;
        entry.1 += 1;
    }
}

impl Default for FixtureChainReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainReader for FixtureChainReader {
    async fn token_balance(&self, _owner: Address, token: Address) -> ChainResult<TokenBalance> {
        let (name, symbol, decimals, balance) = match self.tokens.get(&token) {
            Some(t) => (t.name, t.symbol, t.decimals, U256::from(t.balance)),
            None => ("Unknown Token", "UNK", 18, U256::ZERO),
        };

        Ok(TokenBalance {
            address: token,
            name: name.to_string(),
            symbol: symbol.to_string(),
            balance: balance.to_string(),
            decimals,
            formatted: format_units(balance, decimals),
        })
    }

    async fn token_allowance(
        &self,
        _owner: Address,
        token: Address,
        spender: Address,
    ) -> ChainResult<TokenAllowance> {
        let allowance = self
            .allowances
            .read()
            .await
            .get(&(token, spender))
            .copied()
            .unwrap_or(U256::ZERO);

        Ok(TokenAllowance {
            allowance: allowance.to_string(),
            formatted: format_units(allowance, 18),
            needs_approval: allowance.is_zero(),
        })
    }

    async fn user_stats(&self, user: Address) -> ChainResult<UserStats> {
        let (total, count) = self
            .user_totals
            .read()
            .await
            .get(&user)
            .copied()
            .unwrap_or((U256::ZERO, 0));
        let average = if count > 0 { total / U256::from(count) } else { U256::ZERO };

        Ok(UserStats {
            total_swept: total.to_string(),
            sweep_count: count,
            average_sweep: average.to_string(),
            total_swept_formatted: format_units(total, USDC_DECIMALS),
            average_sweep_formatted: format_units(average, USDC_DECIMALS),
        })
    }

    async fn protocol_stats(&self) -> ChainResult<ProtocolStats> {
        let totals = self.user_totals.read().await;
        let mut total = U256::from(12_480_000u64); // 12.48 USDC demo baseline
        let mut count: u64 = 7;
        for (t, c) in totals.values() {
            total += *t;
            count += *c;
        }
        let average = total / U256::from(count);

        Ok(ProtocolStats {
            total_value: total.to_string(),
            total_count: count,
            average_value: average.to_string(),
            total_value_formatted: format_units(total, USDC_DECIMALS),
            average_value_formatted: format_units(average, USDC_DECIMALS),
        })
    }

    async fn transaction_receipt(
        &self,
        _chain: Chain,
        hash: B256,
    ) -> ChainResult<Option<TxReceiptInfo>> {
        Ok(self.receipts.read().await.get(&hash).cloned())
    }

    async fn dust_tokens(&self, owner: Address) -> ChainResult<Vec<DustToken>> {
        let mut tokens = Vec::new();
        for (addr, t) in &self.tokens {
            let balance = self.token_balance(owner, *addr).await?;
            tokens.push(DustToken {
                address: *addr,
                symbol: t.symbol.to_string(),
                decimals: t.decimals,
                balance: balance.balance,
                balance_formatted: balance.formatted,
                value_usd: t.value_usd,
            });
        }
        tokens.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(tokens)
    }
}
