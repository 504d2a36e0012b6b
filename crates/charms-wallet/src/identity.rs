//! BIP-86 account derivation and the persisted wallet identity.
//!
//! `mnemonic -> seed -> master -> m/86'/0'/0'` produces the account node.
//! Its extended keys, master fingerprint and Taproot address form the
//! [`WalletIdentity`]. Receive and change addresses live under
//! `m/86'/0'/0'/<branch>/<index>` and are reachable from the account xpub
//! alone, so a public-only [`Account`] can be rebuilt from a stored identity.

use tracing::debug;

use charms_core::constants::{BIP86_ACCOUNT_PATH, CHANGE_BRANCH, HARDENED_OFFSET, RECEIVE_BRANCH};
use charms_core::error::DerivationError;
use charms_core::network::Network;
use charms_core::types::{AddressEntry, WalletIdentity};

use crate::descriptor::{Descriptors, taproot_descriptor};
use crate::error::WalletError;
use crate::keys::{ChildNumber, DerivationPath, HdNode, Seed};
use crate::mnemonic::mnemonic_to_seed;

/// Address branch under the account node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Branch {
    Receive,
    Change,
}

impl Branch {
    pub fn index(&self) -> u32 {
        match self {
            Branch::Receive => RECEIVE_BRANCH,
            Branch::Change => CHANGE_BRANCH,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Branch::Change)
    }
}

/// The derived account node with its origin.
#[derive(Debug, Clone)]
pub struct Account {
    network: Network,
    master_fingerprint: [u8; 4],
    path: DerivationPath,
    node: HdNode,
}

impl Account {
    /// Derive the account at `path` from a mnemonic.
    pub fn from_mnemonic(mnemonic: &str, network: Network, path: &DerivationPath) -> Result<Self, WalletError> {
        let seed = mnemonic_to_seed(mnemonic)?;
        Self::from_seed(&seed, network, path)
    }

    /// Derive the account at `path` from a seed.
    pub fn from_seed(seed: &Seed, network: Network, path: &DerivationPath) -> Result<Self, WalletError> {
        let master = HdNode::master_from_seed(seed.as_bytes())?;
        let node = master.derive_path(path)?;
        debug!(%network, %path, "derived account node");
        Ok(Self {
            network,
            master_fingerprint: master.fingerprint(),
            path: path.clone(),
            node,
        })
    }

    /// Public-only account rebuilt from a stored identity.
    pub fn from_identity(identity: &WalletIdentity, network: Network) -> Result<Self, WalletError> {
        let (node, _) = HdNode::from_extended_key(&identity.xpub)?;
        let fp = hex::decode(&identity.master_fingerprint)
            .ok()
            .and_then(|bytes| <[u8; 4]>::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| {
                DerivationError::InvalidExtendedKey(format!(
                    "bad master fingerprint {:?}",
                    identity.master_fingerprint
                ))
            })?;
        Ok(Self {
            network,
            master_fingerprint: fp,
            path: identity.path.parse()?,
            node,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn node(&self) -> &HdNode {
        &self.node
    }

    /// Master fingerprint as 8 lowercase hex characters.
    pub fn master_fingerprint(&self) -> String {
        hex::encode(self.master_fingerprint)
    }

    pub fn xpub(&self) -> String {
        self.node.to_xpub(self.network)
    }

    /// Extended private key; empty for public-only accounts.
    pub fn xpriv(&self) -> String {
        self.node.to_xpriv(self.network).unwrap_or_default()
    }

    /// Taproot address of the account key itself.
    pub fn account_address(&self) -> String {
        self.node.taproot_address(self.network).to_string()
    }

    /// The persisted identity record.
    pub fn identity(&self) -> WalletIdentity {
        WalletIdentity {
            master_fingerprint: self.master_fingerprint(),
            path: self.path.to_string(),
            xpub: self.xpub(),
            xpriv: self.xpriv(),
            address: self.account_address(),
        }
    }

    /// Public receive and change descriptors.
    pub fn descriptors(&self) -> Descriptors {
        self.descriptors_with_key(&self.xpub())
    }

    /// Descriptors carrying the extended private key, for importing a
    /// spending wallet. `None` for public-only accounts.
    pub fn private_descriptors(&self) -> Option<Descriptors> {
        self.node
            .to_xpriv(self.network)
            .map(|xpriv| self.descriptors_with_key(&xpriv))
    }

    fn descriptors_with_key(&self, key: &str) -> Descriptors {
        let fp = self.master_fingerprint();
        let path = self.path.to_string();
        Descriptors {
            receive: taproot_descriptor(&fp, &path, key, RECEIVE_BRANCH),
            change: taproot_descriptor(&fp, &path, key, CHANGE_BRANCH),
        }
    }

    /// Address at `<branch>/<index>` below the account node.
    pub fn address(&self, branch: Branch, index: u32) -> Result<AddressEntry, WalletError> {
        let child = self
            .node
            .derive_child(ChildNumber::normal(branch.index())?)?
            .derive_child(ChildNumber::normal(index)?)?;
        Ok(AddressEntry {
            address: child.taproot_address(self.network).to_string(),
            index,
            is_change: branch.is_change(),
        })
    }

    /// `count` receive/change address pairs starting at `start`.
    pub fn address_pairs(&self, start: u32, count: u32) -> Result<Vec<(AddressEntry, AddressEntry)>, WalletError> {
        let receive = self.node.derive_child(ChildNumber::normal(RECEIVE_BRANCH)?)?;
        let change = self.node.derive_child(ChildNumber::normal(CHANGE_BRANCH)?)?;
        let end = start
            .checked_add(count)
            .ok_or_else(|| WalletError::invalid_path(format!("{start}+{count}")))?;

        (start..end)
            .map(|index| -> Result<(AddressEntry, AddressEntry), WalletError> {
                let step = ChildNumber::normal(index)?;
                let entry = |branch: &HdNode, is_change| -> Result<AddressEntry, WalletError> {
                    Ok(AddressEntry {
                        address: branch.derive_child(step)?.taproot_address(self.network).to_string(),
                        index,
                        is_change,
                    })
                };
                Ok((entry(&receive, false)?, entry(&change, true)?))
            })
            .collect()
    }
}

/// Derive the wallet identity at `path` (e.g. `86'/0'/0'`) for `network`.
pub fn derive_account(mnemonic: &str, network: Network, path: &str) -> Result<WalletIdentity, WalletError> {
    let path: DerivationPath = path.parse()?;
    Ok(Account::from_mnemonic(mnemonic, network, &path)?.identity())
}

/// [`derive_account`] at the fixed BIP-86 account path.
pub fn derive_bip86_identity(mnemonic: &str, network: Network) -> Result<WalletIdentity, WalletError> {
    derive_account(mnemonic, network, BIP86_ACCOUNT_PATH)
}

/// Parsed BIP-86 account path.
pub fn bip86_path() -> DerivationPath {
    DerivationPath::new(vec![
        ChildNumber::from_raw(86 | HARDENED_OFFSET),
        ChildNumber::from_raw(HARDENED_OFFSET),
        ChildNumber::from_raw(HARDENED_OFFSET),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::verify_checksum;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn mainnet_account() -> Account {
        Account::from_mnemonic(ABANDON, Network::Mainnet, &bip86_path()).unwrap()
    }

    #[test]
    fn bip86_fingerprint_and_first_address() {
        let account = mainnet_account();
        assert_eq!(account.master_fingerprint(), "73c5da0a");
        let first = account.address(Branch::Receive, 0).unwrap();
        assert_eq!(
            first.address,
            "bc1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjjwudpxqkedrcr"
        );
        assert!(!first.is_change);
    }

    #[test]
    fn bip86_account_xpub() {
        assert_eq!(
            mainnet_account().xpub(),
            "xpub6BgBgsespWvERF3LHQu6CnqdvfEvtMcQjYrcRzx53QJjSxarj2afYWcLteoGVky7D3UKDP9QyrLprQ3VCECoY49yfdDEHGCtMMj92pReUsQ"
        );
    }

    #[test]
    fn bip32_path_constant_parses_to_same_path() {
        assert_eq!(BIP86_ACCOUNT_PATH.parse::<DerivationPath>().unwrap(), bip86_path());
    }

    #[test]
    fn identity_fields() {
        let id = derive_bip86_identity(ABANDON, Network::Testnet4).unwrap();
        assert_eq!(id.path, "86'/0'/0'");
        assert_eq!(id.master_fingerprint.len(), 8);
        assert!(id.xpub.starts_with("tpub"));
        assert!(id.xpriv.starts_with("tprv"));
        assert!(id.address.starts_with("tb1p"));
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_bip86_identity(ABANDON, Network::Mainnet).unwrap();
        let b = derive_bip86_identity(ABANDON, Network::Mainnet).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn path_with_m_prefix_is_equivalent() {
        let a = derive_account(ABANDON, Network::Mainnet, "m/86'/0'/0'").unwrap();
        let b = derive_account(ABANDON, Network::Mainnet, "86h/0h/0h").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_path_is_derivation_failure() {
        let err = derive_account(ABANDON, Network::Mainnet, "86'/zero").unwrap_err();
        assert!(matches!(err, WalletError::DerivationFailure(DerivationError::InvalidPath(_))));
    }

    #[test]
    fn invalid_mnemonic_reported() {
        let err = derive_bip86_identity("abandon abandon", Network::Mainnet).unwrap_err();
        assert!(matches!(err, WalletError::InvalidMnemonic(_)));
    }

    #[test]
    fn regtest_uses_bcrt_and_tpub() {
        let id = derive_bip86_identity(ABANDON, Network::Regtest).unwrap();
        assert!(id.address.starts_with("bcrt1p"));
        assert!(id.xpub.starts_with("tpub"));
    }

    #[test]
    fn descriptors_layout() {
        let account = mainnet_account();
        let d = account.descriptors();
        assert_eq!(
            d.receive,
            format!("tr([73c5da0a/86'/0'/0']{}/0/*)", account.xpub())
        );
        assert!(d.change.ends_with("/1/*)"));
        let summed = d.checksummed().unwrap();
        assert!(verify_checksum(&summed.receive));
    }

    #[test]
    fn private_descriptors_only_with_private_key() {
        let account = mainnet_account();
        let private = account.private_descriptors().unwrap();
        assert!(private.receive.contains("xprv"));

        let public = Account::from_identity(&account.identity(), Network::Mainnet).unwrap();
        assert!(public.private_descriptors().is_none());
        assert_eq!(public.xpriv(), "");
    }

    #[test]
    fn public_account_reproduces_descriptors_and_addresses() {
        let account = mainnet_account();
        let public = Account::from_identity(&account.identity(), Network::Mainnet).unwrap();
        assert_eq!(public.descriptors(), account.descriptors());
        assert_eq!(
            public.address(Branch::Change, 3).unwrap(),
            account.address(Branch::Change, 3).unwrap()
        );
    }

    #[test]
    fn address_pairs_match_single_derivation() {
        let account = mainnet_account();
        let pairs = account.address_pairs(2, 3).unwrap();
        assert_eq!(pairs.len(), 3);
        for (i, (receive, change)) in pairs.iter().enumerate() {
            let index = 2 + i as u32;
            assert_eq!(receive, &account.address(Branch::Receive, index).unwrap());
            assert_eq!(change, &account.address(Branch::Change, index).unwrap());
            assert!(change.is_change);
        }
    }

    #[test]
    fn address_index_must_be_non_hardened() {
        let err = mainnet_account().address(Branch::Receive, 0x8000_0000).unwrap_err();
        assert!(matches!(err, WalletError::DerivationFailure(_)));
    }
}
