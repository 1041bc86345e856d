use std::fmt;
use std::str::FromStr;

use alloy::primitives::utils::{parse_units, ParseUnits};
use alloy::primitives::{address, Address};
use alloy::signers::local::PrivateKeySigner;

use crate::error::StartupError;

const DEFAULT_RPC_URL: &str = "https://polygon-bor-rpc.publicnode.com";
const DEFAULT_MARKETS_API_URL: &str = "https://clob.polymarket.com";
const DEFAULT_USDC: Address = address!("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174");
const DEFAULT_CTF: Address = address!("0x4D97DCd97eC945f40cF65F87097ACe5EA0476045");
const DEFAULT_MAX_FEE_GWEI: &str = "100";
const DEFAULT_MAX_PRIORITY_FEE_GWEI: &str = "30";

/// Chain every claim transaction is signed for (Polygon mainnet).
pub const CHAIN_ID: u64 = 137;

/// Configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    pub rpc_url: String,
    pub markets_api_url: String,

    // Wallet. `signer` is checked against `wallet` when the config is built.
    pub signer: PrivateKeySigner,
    pub wallet: Address,

    // Contracts
    pub collateral_token: Address,
    pub ctf_address: Address,

    // Gas, in wei
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub gas_limit: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let pk = get("PRIVATE_KEY").ok_or(StartupError::MissingVar("PRIVATE_KEY"))?;
        let signer = PrivateKeySigner::from_str(&pk).map_err(|e| StartupError::InvalidVar {
            var: "PRIVATE_KEY",
            reason: e.to_string(),
        })?;

        let wallet = get("PROXY_WALLET").ok_or(StartupError::MissingVar("PROXY_WALLET"))?;
        let wallet = parse_address("PROXY_WALLET", &wallet)?;

        let collateral_token = match get("USDC_CONTRACT_ADDRESS") {
            Some(s) => parse_address("USDC_CONTRACT_ADDRESS", &s)?,
            None => DEFAULT_USDC,
        };
        let ctf_address = match get("POLYMARKET_CTF_ADDRESS") {
            Some(s) => parse_address("POLYMARKET_CTF_ADDRESS", &s)?,
            None => DEFAULT_CTF,
        };

        let max_fee_per_gas = parse_gwei(
            "MAX_FEE",
            &get("MAX_FEE").unwrap_or_else(|| DEFAULT_MAX_FEE_GWEI.into()),
        )?;
        let max_priority_fee_per_gas = parse_gwei(
            "MAX_PRIORITY_FEE",
            &get("MAX_PRIORITY_FEE").unwrap_or_else(|| DEFAULT_MAX_PRIORITY_FEE_GWEI.into()),
        )?;
        if max_priority_fee_per_gas > max_fee_per_gas {
            return Err(StartupError::InvalidVar {
                var: "MAX_PRIORITY_FEE",
                reason: "priority fee exceeds MAX_FEE".into(),
            });
        }

        let gas_limit = match get("GAS_LIMIT") {
            Some(s) => Some(s.parse::<u64>().map_err(|e| StartupError::InvalidVar {
                var: "GAS_LIMIT",
                reason: e.to_string(),
            })?),
            None => None,
        };

        let config = Self {
            rpc_url: get("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.into()),
            markets_api_url: get("MARKETS_API_URL")
                .unwrap_or_else(|| DEFAULT_MARKETS_API_URL.into())
                .trim_end_matches('/')
                .to_string(),
            signer,
            wallet,
            collateral_token,
            ctf_address,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit,
        };
        config.verify_wallet()?;
        Ok(config)
    }

    /// The signing key must derive the configured wallet address.
    pub fn verify_wallet(&self) -> Result<(), StartupError> {
        let derived = self.signer.address();
        if derived != self.wallet {
            return Err(StartupError::WalletMismatch {
                derived,
                configured: self.wallet,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("markets_api_url", &self.markets_api_url)
            .field("wallet", &self.wallet)
            .field("collateral_token", &self.collateral_token)
            .field("ctf_address", &self.ctf_address)
            .field("max_fee_per_gas", &self.max_fee_per_gas)
            .field("max_priority_fee_per_gas", &self.max_priority_fee_per_gas)
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}

fn parse_address(var: &'static str, s: &str) -> Result<Address, StartupError> {
    Address::from_str(s).map_err(|e| StartupError::InvalidVar {
        var,
        reason: e.to_string(),
    })
}

/// Gwei string ("30", "1.5") to wei.
fn parse_gwei(var: &'static str, s: &str) -> Result<u128, StartupError> {
    let invalid = |reason: String| StartupError::InvalidVar { var, reason };
    let wei = match parse_units(s, "gwei").map_err(|e| invalid(e.to_string()))? {
        ParseUnits::U256(v) => v,
        ParseUnits::I256(v) if v.is_negative() => {
            return Err(invalid("fee must be non-negative".into()))
        }
        ParseUnits::I256(v) => v.into_raw(),
    };
    u128::try_from(wei).map_err(|_| invalid("fee does not fit in u128 wei".into()))
}
