//! Contract Addresses and ABI Bindings
//!
//! Fixed external interface constants for the OmniSweep deployment:
//! the OmniSweeper sweep contract and test assets on Ethereum Sepolia,
//! and the ReceiptOApp statistics contract on Avalanche Fuji.
//!
//! These are interface constants, not configuration: the ABIs must match
//! the deployed bytecode exactly.

use alloy::sol;
use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// OmniSweeper contract on Ethereum Sepolia
pub const OMNISWEEPER: Address = address!("0xfd1411e2e3ddfC0C68649d3FEb1bE50C6d599EBd");

/// Test dust token on Ethereum Sepolia
pub const TEST_DUST_TOKEN: Address = address!("0xe523fc1cc80A6EF2f643895b556cf43A1f1bCF60");

/// USDC settlement asset on Ethereum Sepolia
pub const USDC: Address = address!("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238");

/// ReceiptOApp contract on Avalanche Fuji
pub const RECEIPT_OAPP: Address = address!("0x4c956ed76Dbe238507c06D7764440C2977Cd5275");

/// Default RPC endpoints
pub const ETH_SEPOLIA_RPC: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const AVALANCHE_FUJI_RPC: &str = "https://api.avax-test.network/ext/bc/C/rpc";

sol! {
    #[sol(rpc)]
    contract OmniSweeper {
        function sweepDust(address tokenIn, uint256 amount, bytes calldata oneInchData, uint256 minUsdcOut) external payable returns (uint256);
        function paymaster() external view returns (address);
        function USDC() external view returns (address);
        event DustSwept(address indexed user, address indexed tokenIn, uint256 amountIn, uint256 usdcOut, uint256 gasCost, uint256 netOutput, uint256 timestamp);
    }
}

sol! {
    #[sol(rpc)]
    contract ERC20 {
        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
    }
}

sol! {
    #[sol(rpc)]
    contract ReceiptOApp {
        function getUserStats(address user) external view returns (uint256 totalSwept, uint256 sweepCount, uint256 averageSweep);
        function getProtocolStats() external view returns (uint256 totalValue, uint256 totalCount, uint256 averageValue);
        event SweepReceipt(address indexed user, uint256 amount, uint32 srcChainId, uint256 timestamp, bytes32 guid);
    }
}

/// Chain selector for the two networks the service touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Chain {
    /// Source chain: dust tokens, OmniSweeper
    EthSepolia,
    /// Destination chain: ReceiptOApp stats
    AvalancheFuji,
}

impl Chain {
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::EthSepolia => 11155111,
            Chain::AvalancheFuji => 43113,
        }
    }

    pub fn default_rpc(&self) -> &'static str {
        match self {
            Chain::EthSepolia => ETH_SEPOLIA_RPC,
            Chain::AvalancheFuji => AVALANCHE_FUJI_RPC,
        }
    }

    /// Block explorer link for a transaction hash
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        match self {
            Chain::EthSepolia => format!("https://sepolia.etherscan.io/tx/{}", tx_hash),
            Chain::AvalancheFuji => format!("https://testnet.snowtrace.io/tx/{}", tx_hash),
        }
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ethsepolia" | "eth-sepolia" | "sepolia" | "11155111" => Ok(Chain::EthSepolia),
            "avalanchefuji" | "avalanche-fuji" | "fuji" | "43113" => Ok(Chain::AvalancheFuji),
            _ => Err(format!("unknown chain selector: {}", s)),
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::EthSepolia => write!(f, "ethSepolia"),
            Chain::AvalancheFuji => write!(f, "avalancheFuji"),
        }
    }
}

/// Static per-chain contract listing served by GET /api/contracts
pub fn contract_listing() -> serde_json::Value {
    serde_json::json!({
        "ethSepolia": {
            "omniSweeper": OMNISWEEPER.to_string(),
            "testDustToken": TEST_DUST_TOKEN.to_string(),
            "usdc": USDC.to_string(),
            "chainId": Chain::EthSepolia.chain_id(),
            "rpc": ETH_SEPOLIA_RPC,
        },
        "avalancheFuji": {
            "receiptOApp": RECEIPT_OAPP.to_string(),
            "chainId": Chain::AvalancheFuji.chain_id(),
            "rpc": AVALANCHE_FUJI_RPC,
        }
    })
}
