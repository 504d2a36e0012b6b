//! Wallet error types.

use charms_core::error::{
    DecodeError, DerivationError, FeeRateError, NetworkError, OutPointError, StorageError,
};
use thiserror::Error;

/// Errors that can occur in wallet operations.
///
/// Running short of funds during selection is not an error; it is reported
/// through [`Selection::sufficient_funds`](crate::coin_selection::Selection).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Invalid BIP-39 mnemonic phrase (unknown word, bad checksum, bad length).
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Unsupported mnemonic length requested for generation.
    #[error("unsupported mnemonic length: {0} words (expected 12 or 24)")]
    InvalidWordCount(usize),

    /// HD key derivation failed.
    #[error("derivation failure: {0}")]
    DerivationFailure(#[from] DerivationError),

    /// Raw transaction could not be decoded.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(#[from] DecodeError),

    /// Fee rate rejected at construction.
    #[error("invalid fee rate: {0}")]
    InvalidFeeRate(#[from] FeeRateError),

    /// Outpoint string could not be parsed.
    #[error(transparent)]
    InvalidOutPoint(#[from] OutPointError),

    /// Unknown network name.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Storage collaborator failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WalletError {
    /// Shorthand for a malformed path string.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        WalletError::DerivationFailure(DerivationError::InvalidPath(path.into()))
    }
}
