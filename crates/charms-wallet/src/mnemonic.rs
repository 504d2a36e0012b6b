//! BIP-39 mnemonic generation, validation and seed stretching.

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::WalletError;
use crate::keys::Seed;

/// Collapse runs of whitespace and lowercase the phrase.
pub fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse and validate a phrase against the English wordlist and checksum.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, WalletError> {
    Mnemonic::parse_in(Language::English, normalize(phrase))
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// Generate a fresh English mnemonic of 12 or 24 words from the OS RNG.
pub fn generate_mnemonic(word_count: usize) -> Result<String, WalletError> {
    let entropy_len = match word_count {
        12 => 16,
        24 => 32,
        other => return Err(WalletError::InvalidWordCount(other)),
    };
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy[..entropy_len]);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..entropy_len])
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();
    Ok(mnemonic?.to_string())
}

/// Stretch a phrase into its 64-byte seed (empty passphrase).
pub fn mnemonic_to_seed(phrase: &str) -> Result<Seed, WalletError> {
    let mnemonic = parse_mnemonic(phrase)?;
    Ok(Seed::from_bytes(mnemonic.to_seed_normalized("")))
}
