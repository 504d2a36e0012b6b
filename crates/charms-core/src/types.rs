//! Wallet record types: outpoints, UTXOs, address entries.
//!
//! These mirror the records persisted by the storage collaborator, so field
//! names serialize in camelCase (`scriptPubKey`, `isChange`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::{CHARM_CARRIER_SATS, RUNE_CARRIER_SATS};
use crate::error::OutPointError;
use crate::script::ScriptKind;

/// Reference to a specific output of a previous transaction.
///
/// The txid is kept in display (big-endian) hex, as stored by the wallet.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: String,
    /// Index of the output within the transaction.
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for OutPoint {
    type Err = OutPointError;

    /// Parse `"<64 hex txid>:<vout>"`. The txid is normalized to lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (txid, vout) = s
            .rsplit_once(':')
            .ok_or_else(|| OutPointError::MissingSeparator(s.to_string()))?;
        if txid.len() != 64 || !txid.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(OutPointError::InvalidTxid(txid.to_string()));
        }
        let vout = vout
            .parse::<u32>()
            .map_err(|_| OutPointError::InvalidVout(vout.to_string()))?;
        Ok(Self::new(txid.to_lowercase(), vout))
    }
}

/// An unspent output owned by the wallet.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    /// Funding transaction id, display hex.
    pub txid: String,
    /// Output index within the funding transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub value: u64,
    /// Locking script, hex.
    #[serde(default)]
    pub script_pub_key: String,
    /// Address the output pays to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Utxo {
    /// The outpoint identifying this UTXO.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.vout)
    }

    /// Script kind, classified from the locking script and then the address.
    pub fn script_kind(&self) -> ScriptKind {
        ScriptKind::classify(&self.script_pub_key, self.address.as_deref())
    }

    /// Whether the value matches a charm or rune carrier output. Such
    /// outputs are kept out of payments even when nothing marks them.
    pub fn may_carry_asset(&self) -> bool {
        self.value == CHARM_CARRIER_SATS || self.value == RUNE_CARRIER_SATS
    }
}

/// A wallet address with its position in the derivation tree.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressEntry {
    pub address: String,
    /// Child index under the receive or change branch.
    pub index: u32,
    #[serde(default)]
    pub is_change: bool,
}

/// Persisted wallet identity: the account-level keys and their origin.
///
/// `xpriv` is empty when the identity was built from public data only.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WalletIdentity {
    /// First four bytes of HASH160(master public key), lowercase hex.
    pub master_fingerprint: String,
    /// Account path without the leading `m/`, e.g. `86'/0'/0'`.
    pub path: String,
    /// Base58check extended public key of the account node.
    pub xpub: String,
    /// Base58check extended private key of the account node.
    #[serde(default)]
    pub xpriv: String,
    /// Taproot address of the account key.
    pub address: String,
}

impl WalletIdentity {
    /// Whether private key material is present.
    pub fn has_private_key(&self) -> bool {
        !self.xpriv.is_empty()
    }
}

/// UTXOs grouped by the address that owns them.
pub type UtxoMap = BTreeMap<String, Vec<Utxo>>;

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn outpoint_display() {
        let op = OutPoint::new(TXID, 3);
        assert_eq!(op.to_string(), format!("{TXID}:3"));
    }

    #[test]
    fn outpoint_parse_roundtrip() {
        let op: OutPoint = format!("{TXID}:7").parse().unwrap();
        assert_eq!(op, OutPoint::new(TXID, 7));
    }

    #[test]
    fn outpoint_parse_lowercases_txid() {
        let upper = TXID.to_uppercase();
        let op: OutPoint = format!("{upper}:0").parse().unwrap();
        assert_eq!(op.txid, TXID);
    }

    #[test]
    fn outpoint_parse_missing_separator() {
        let err = TXID.parse::<OutPoint>().unwrap_err();
        assert!(matches!(err, OutPointError::MissingSeparator(_)));
    }

    #[test]
    fn outpoint_parse_bad_txid() {
        let err = "abcd:0".parse::<OutPoint>().unwrap_err();
        assert!(matches!(err, OutPointError::InvalidTxid(_)));
    }

    #[test]
    fn outpoint_parse_bad_vout() {
        let err = format!("{TXID}:-1").parse::<OutPoint>().unwrap_err();
        assert!(matches!(err, OutPointError::InvalidVout(_)));
    }

    #[test]
    fn utxo_serde_uses_camel_case() {
        let utxo = Utxo {
            txid: TXID.into(),
            vout: 1,
            value: 5000,
            script_pub_key: "5120".to_string() + &"11".repeat(32),
            address: None,
        };
        let json = serde_json::to_value(&utxo).unwrap();
        assert!(json.get("scriptPubKey").is_some());
        assert!(json.get("address").is_none());
    }

    #[test]
    fn utxo_deserializes_without_script() {
        let json = format!(r#"{{"txid":"{TXID}","vout":0,"value":100}}"#);
        let utxo: Utxo = serde_json::from_str(&json).unwrap();
        assert_eq!(utxo.script_pub_key, "");
        assert_eq!(utxo.script_kind(), ScriptKind::Unclassified);
    }

    #[test]
    fn carrier_values_flagged() {
        let at = |value| Utxo {
            txid: "ab".repeat(32),
            vout: 0,
            value,
            script_pub_key: String::new(),
            address: None,
        };
        assert!(at(1_000).may_carry_asset());
        assert!(at(546).may_carry_asset());
        assert!(!at(545).may_carry_asset());
        assert!(!at(999).may_carry_asset());
        assert!(!at(1_001).may_carry_asset());
    }

    #[test]
    fn utxo_outpoint_identity() {
        let a = Utxo {
            txid: TXID.into(),
            vout: 2,
            value: 1,
            script_pub_key: String::new(),
            address: None,
        };
        let b = Utxo { value: 999, ..a.clone() };
        assert_eq!(a.outpoint(), b.outpoint());
    }

    #[test]
    fn address_entry_serde() {
        let entry: AddressEntry =
            serde_json::from_str(r#"{"address":"tb1pxyz","index":4,"isChange":true}"#).unwrap();
        assert_eq!(entry.index, 4);
        assert!(entry.is_change);
    }

    fn identity() -> WalletIdentity {
        WalletIdentity {
            master_fingerprint: "73c5da0a".into(),
            path: "86'/0'/0'".into(),
            xpub: "xpub-placeholder".into(),
            xpriv: String::new(),
            address: "bc1p-placeholder".into(),
        }
    }

    #[test]
    fn public_only_identity() {
        assert!(!identity().has_private_key());
    }

    #[test]
    fn identity_serde_field_names() {
        let json = serde_json::to_value(identity()).unwrap();
        assert_eq!(json["masterFingerprint"], "73c5da0a");
        assert_eq!(json["path"], "86'/0'/0'");
    }

    #[test]
    fn identity_missing_xpriv_defaults_empty() {
        let json = r#"{"masterFingerprint":"00000000","path":"86'/0'/0'","xpub":"x","address":"a"}"#;
        let id: WalletIdentity = serde_json::from_str(json).unwrap();
        assert!(id.xpriv.is_empty());
    }
}
