//! Per-network encoding parameters.
//!
//! Extended keys are serialized with network-specific version bytes
//! ([BIP-32]) and addresses with network-specific human-readable parts.
//! The wallet supports mainnet and the testnet4 test network; regtest
//! shares testnet's version bytes but uses the `bcrt` HRP.
//!
//! [BIP-32]: https://github.com/bitcoin/bips/blob/master/bip-0032.mediawiki

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NetworkError;

/// Encoding constants for one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    /// Version prefix for serialized extended public keys.
    pub xpub_version: [u8; 4],
    /// Version prefix for serialized extended private keys.
    pub xpriv_version: [u8; 4],
    /// Bech32 human-readable part for segwit addresses.
    pub hrp: &'static str,
    /// Network used by the `bitcoin` crate for address encoding.
    pub bitcoin: bitcoin::Network,
}

pub const MAINNET_PARAMS: NetworkParams = NetworkParams {
    xpub_version: [0x04, 0x88, 0xB2, 0x1E],
    xpriv_version: [0x04, 0x88, 0xAD, 0xE4],
    hrp: "bc",
    bitcoin: bitcoin::Network::Bitcoin,
};

pub const TESTNET_PARAMS: NetworkParams = NetworkParams {
    xpub_version: [0x04, 0x35, 0x87, 0xCF],
    xpriv_version: [0x04, 0x35, 0x83, 0x94],
    hrp: "tb",
    bitcoin: bitcoin::Network::Testnet,
};

pub const REGTEST_PARAMS: NetworkParams = NetworkParams {
    xpub_version: [0x04, 0x35, 0x87, 0xCF],
    xpriv_version: [0x04, 0x35, 0x83, 0x94],
    hrp: "bcrt",
    bitcoin: bitcoin::Network::Regtest,
};

/// Network the wallet operates on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin mainnet (`xpub`/`xprv`, `bc1...`).
    Mainnet,
    /// Testnet4 (`tpub`/`tprv`, `tb1...`).
    #[default]
    Testnet4,
    /// Local regression-test network (`tpub`/`tprv`, `bcrt1...`).
    Regtest,
}

impl Network {
    /// Encoding parameters for this network.
    pub fn params(&self) -> &'static NetworkParams {
        match self {
            Network::Mainnet => &MAINNET_PARAMS,
            Network::Testnet4 => &TESTNET_PARAMS,
            Network::Regtest => &REGTEST_PARAMS,
        }
    }

    /// Canonical lowercase name, as used for storage keys.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet4 => "testnet4",
            Network::Regtest => "regtest",
        }
    }

    /// Network used by the `bitcoin` crate for address encoding.
    pub fn to_bitcoin(&self) -> bitcoin::Network {
        self.params().bitcoin
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet4" | "testnet" | "test" => Ok(Network::Testnet4),
            "regtest" => Ok(Network::Regtest),
            other => Err(NetworkError::Unknown(other.to_string())),
        }
    }
}

/// Blockchain a stored record belongs to.
///
/// Part of the storage key alongside [`Network`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Blockchain {
    #[default]
    Bitcoin,
}

impl Blockchain {
    pub fn name(&self) -> &'static str {
        match self {
            Blockchain::Bitcoin => "bitcoin",
        }
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
