use alloy::primitives::Address;

/// Conditions that abort the run before any market is fetched.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },

    #[error("failed to connect to RPC at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("RPC reports chain id {actual}, expected {expected}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("private key derives {derived}, which does not match wallet {configured}")]
    WalletMismatch { derived: Address, configured: Address },
}
