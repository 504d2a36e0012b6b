//! Error types for the Charms wallet core.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("hardened child {index} cannot be derived without a private key")] HardenedFromPublic { index: u32 },
    #[error("derived key out of range at depth {depth}, child {index}")] InvalidChildKey { depth: u8, index: u32 },
    #[error("seed produced an invalid master key")] InvalidMasterKey,
    #[error("invalid derivation path: {0}")] InvalidPath(String),
    #[error("maximum derivation depth exceeded")] DepthExceeded,
    #[error("invalid extended key: {0}")] InvalidExtendedKey(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid hex ({len} chars, starts {prefix:?}): {reason}")] InvalidHex { len: usize, prefix: String, reason: String },
    #[error("malformed transaction ({len} hex chars, starts {prefix:?}): {reason}")] Malformed { len: usize, prefix: String, reason: String },
}

impl DecodeError {
    /// Number of leading hex characters kept for diagnostics.
    pub const PREFIX_LEN: usize = 16;

    pub fn invalid_hex(input: &str, reason: impl ToString) -> Self {
        Self::InvalidHex { len: input.len(), prefix: diagnostic_prefix(input), reason: reason.to_string() }
    }

    pub fn malformed(input: &str, reason: impl ToString) -> Self {
        Self::Malformed { len: input.len(), prefix: diagnostic_prefix(input), reason: reason.to_string() }
    }
}

fn diagnostic_prefix(input: &str) -> String {
    input.chars().take(DecodeError::PREFIX_LEN).collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeRateError {
    #[error("fee rate must be non-negative, got {0}")] Negative(String),
    #[error("fee rate must be finite, got {0}")] NotFinite(String),
    #[error("fee rate is not a number: {0:?}")] Unparseable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutPointError {
    #[error("missing ':' separator in {0:?}")] MissingSeparator(String),
    #[error("txid must be 64 hex characters: {0:?}")] InvalidTxid(String),
    #[error("invalid output index: {0:?}")] InvalidVout(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("unknown network: {0}")] Unknown(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend: {0}")] Backend(String),
    #[error("corrupted record: {0}")] Corrupted(String),
}
