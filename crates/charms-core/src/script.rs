//! Output script classification.
//!
//! Classification runs in two explicit phases:
//!
//! 1. The locking script (hex) is matched against an ordered table of
//!    standard templates. Prefix, suffix and total length must all match.
//! 2. Only if no template matches, the owning address (when known) is
//!    checked: its human-readable part must be one of the supported
//!    networks', and the witness version character after the separator
//!    picks the kind.
//!
//! Anything left over is [`ScriptKind::Unclassified`]. It is never folded
//! into a known type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{P2PKH_INPUT_VBYTES, TAPROOT_INPUT_VBYTES};
use crate::network::{MAINNET_PARAMS, REGTEST_PARAMS, TESTNET_PARAMS};

/// Standard output script templates the wallet distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    /// Segwit v1 key-path output (`OP_1 <32 bytes>`).
    Taproot,
    /// Legacy pay-to-pubkey-hash.
    P2pkh,
    /// Pay-to-script-hash.
    P2sh,
    /// Segwit v0 pay-to-witness-pubkey-hash.
    P2wpkh,
    /// Segwit v0 pay-to-witness-script-hash.
    P2wsh,
    /// Script matched no template and the address gave no hint.
    Unclassified,
}

/// Template row: (prefix, suffix, total hex length, kind).
type ScriptTemplate = (&'static str, &'static str, usize, ScriptKind);

/// Phase 1 templates, checked in order.
const SCRIPT_TEMPLATES: &[ScriptTemplate] = &[
    ("5120", "", 68, ScriptKind::Taproot),
    ("76a914", "88ac", 50, ScriptKind::P2pkh),
    ("a914", "87", 46, ScriptKind::P2sh),
    ("0014", "", 44, ScriptKind::P2wpkh),
    ("0020", "", 68, ScriptKind::P2wsh),
];

/// Segwit HRPs accepted in phase 2.
const SEGWIT_HRPS: [&str; 3] = [MAINNET_PARAMS.hrp, TESTNET_PARAMS.hrp, REGTEST_PARAMS.hrp];

/// Phase 2 witness version characters (`p` = v1, `q` = v0).
const WITNESS_VERSIONS: &[(char, ScriptKind)] = &[('p', ScriptKind::Taproot), ('q', ScriptKind::P2wpkh)];

impl ScriptKind {
    /// Classify a hex locking script, falling back to the address prefix.
    pub fn classify(script_hex: &str, address: Option<&str>) -> Self {
        Self::from_script_hex(script_hex)
            .or_else(|| address.and_then(Self::from_address))
            .unwrap_or(ScriptKind::Unclassified)
    }

    /// Phase 1: match the script against the template table.
    pub fn from_script_hex(script_hex: &str) -> Option<Self> {
        let script = script_hex.trim().to_ascii_lowercase();
        SCRIPT_TEMPLATES
            .iter()
            .find(|(prefix, suffix, len, _)| {
                script.len() == *len && script.starts_with(prefix) && script.ends_with(suffix)
            })
            .map(|(_, _, _, kind)| *kind)
    }

    /// Phase 2: match a bech32 address by HRP and witness version.
    pub fn from_address(address: &str) -> Option<Self> {
        let address = address.trim().to_ascii_lowercase();
        // The bech32 data charset has no '1', so the last one is the separator.
        let (hrp, data) = address.rsplit_once('1')?;
        if !SEGWIT_HRPS.contains(&hrp) {
            return None;
        }
        let version = data.chars().next()?;
        WITNESS_VERSIONS
            .iter()
            .find(|(c, _)| *c == version)
            .map(|(_, kind)| *kind)
    }

    /// Classify a parsed script using the `bitcoin` crate's template checks.
    pub fn from_script(script: &bitcoin::Script) -> Self {
        if script.is_p2tr() {
            ScriptKind::Taproot
        } else if script.is_p2pkh() {
            ScriptKind::P2pkh
        } else if script.is_p2sh() {
            ScriptKind::P2sh
        } else if script.is_p2wpkh() {
            ScriptKind::P2wpkh
        } else if script.is_p2wsh() {
            ScriptKind::P2wsh
        } else {
            ScriptKind::Unclassified
        }
    }

    /// Estimated virtual size of an input spending this kind of output.
    ///
    /// Only P2PKH is priced separately; every other kind, including
    /// unclassified ones, is priced as a Taproot key-path spend.
    pub fn input_vbytes(&self) -> u64 {
        match self {
            ScriptKind::P2pkh => P2PKH_INPUT_VBYTES,
            _ => TAPROOT_INPUT_VBYTES,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::Taproot => "p2tr",
            ScriptKind::P2pkh => "p2pkh",
            ScriptKind::P2sh => "p2sh",
            ScriptKind::P2wpkh => "p2wpkh",
            ScriptKind::P2wsh => "p2wsh",
            ScriptKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
