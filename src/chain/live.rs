//! Live On-chain Reader
//!
//! Reads against the real RPC endpoints. Balance metadata reads run as a
//! single all-or-nothing batch, matching the reference behavior: partial
//! metadata is a whole-call failure, not a degraded result.

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::config::OmniSweepConfig;
use crate::contracts::{Chain, ERC20, RECEIPT_OAPP, ReceiptOApp, TEST_DUST_TOKEN};
use crate::units::{format_units, USDC_DECIMALS};

use super::{
    ChainError, ChainReader, ChainResult, DustToken, ProtocolStats, TokenAllowance, TokenBalance,
    TxReceiptInfo, UserStats,
};

/// Connect an HTTP provider to an RPC endpoint
pub fn connect(rpc_url: &str) -> ChainResult<DynProvider> {
    let url = rpc_url
        .parse()
        .map_err(|_| ChainError::InvalidEndpoint(rpc_url.to_string()))?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}

/// Live reader over both chains
#[derive(Clone)]
pub struct LiveChainReader {
    sepolia: DynProvider,
    fuji: DynProvider,
}

impl LiveChainReader {
    pub fn new(sepolia: DynProvider, fuji: DynProvider) -> Self {
        Self { sepolia, fuji }
    }

    pub fn from_config(config: &OmniSweepConfig) -> ChainResult<Self> {
        Ok(Self::new(
            connect(config.rpc_url(Chain::EthSepolia))?,
            connect(config.rpc_url(Chain::AvalancheFuji))?,
        ))
    }

    fn provider(&self, chain: Chain) -> &DynProvider {
        match chain {
            Chain::EthSepolia => &self.sepolia,
            Chain::AvalancheFuji => &self.fuji,
        }
    }
}

fn contract_err(e: impl std::fmt::Display) -> ChainError {
    ChainError::Contract(e.to_string())
}

#[async_trait]
impl ChainReader for LiveChainReader {
    async fn token_balance(&self, owner: Address, token: Address) -> ChainResult<TokenBalance> {
        let erc20 = ERC20::new(token, self.sepolia.clone());

        // One batch: any single failed read fails the whole call.
        let (balance, decimals, symbol, name) = tokio::try_join!(
            async { erc20.balanceOf(owner).call().await },
            async { erc20.decimals().call().await },
            async { erc20.symbol().call().await },
            async { erc20.name().call().await },
        )
        .map_err(contract_err)?;

        Ok(TokenBalance {
            address: token,
            name,
            symbol,
            balance: balance.to_string(),
            decimals,
            formatted: format_units(balance, decimals),
        })
    }

    async fn token_allowance(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
    ) -> ChainResult<TokenAllowance> {
        let erc20 = ERC20::new(token, self.sepolia.clone());

        let (allowance, decimals) = tokio::try_join!(
            async { erc20.allowance(owner, spender).call().await },
            async { erc20.decimals().call().await },
        )
        .map_err(contract_err)?;

        Ok(TokenAllowance {
            allowance: allowance.to_string(),
            formatted: format_units(allowance, decimals),
            needs_approval: allowance.is_zero(),
        })
    }

    async fn user_stats(&self, user: Address) -> ChainResult<UserStats> {
        let receipts = ReceiptOApp::new(RECEIPT_OAPP, self.fuji.clone());
        let stats = receipts.getUserStats(user).call().await.map_err(contract_err)?;

        Ok(UserStats {
            total_swept: stats.totalSwept.to_string(),
            sweep_count: stats.sweepCount.to::<u64>(),
            average_sweep: stats.averageSweep.to_string(),
            total_swept_formatted: format_units(stats.totalSwept, USDC_DECIMALS),
            average_sweep_formatted: format_units(stats.averageSweep, USDC_DECIMALS),
        })
    }

    async fn protocol_stats(&self) -> ChainResult<ProtocolStats> {
        let receipts = ReceiptOApp::new(RECEIPT_OAPP, self.fuji.clone());
        let stats = receipts.getProtocolStats().call().await.map_err(contract_err)?;

        Ok(ProtocolStats {
            total_value: stats.totalValue.to_string(),
            total_count: stats.totalCount.to::<u64>(),
            average_value: stats.averageValue.to_string(),
            total_value_formatted: format_units(stats.totalValue, USDC_DECIMALS),
            average_value_formatted: format_units(stats.averageValue, USDC_DECIMALS),
        })
    }

    async fn transaction_receipt(
        &self,
        chain: Chain,
        hash: B256,
    ) -> ChainResult<Option<TxReceiptInfo>> {
        let receipt = self
            .provider(chain)
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        Ok(receipt.map(|r| TxReceiptInfo {
            hash: format!("{:#x}", hash),
            block_number: r.block_number.unwrap_or_default(),
            status: if r.status() { "success" } else { "failed" }.to_string(),
            gas_used: r.gas_used.to_string(),
            effective_gas_price: r.effective_gas_price.to_string(),
            logs: r.inner.logs().len(),
        }))
    }

    async fn dust_tokens(&self, owner: Address) -> ChainResult<Vec<DustToken>> {
        // Known sweepable tokens on the testnet deployment. The USD value
        // needs a price feed the deployment does not have; surfaced as 0.
        let candidates: [Address; 1] = [TEST_DUST_TOKEN];

        let mut tokens = Vec::new();
        for token in candidates {
            let info = self.token_balance(owner, token).await?;
            let balance = U256::from_str_radix(&info.balance, 10).unwrap_or(U256::ZERO);
            if balance.is_zero() {
                continue;
            }
            tokens.push(DustToken {
                address: token,
                symbol: info.symbol,
                decimals: info.decimals,
                balance: info.balance,
                balance_formatted: info.formatted,
                value_usd: 0.0,
            });
        }

        Ok(tokens)
    }
}
