//! Seeds and BIP-32 hierarchical deterministic key derivation.
//!
//! Nodes are derived with HMAC-SHA512 over secp256k1 exactly as described in
//! [BIP-32]. A node may hold only public material, in which case it can still
//! derive non-hardened children (`K_child = IL*G + K_par`).
//!
//! [BIP-32]: https://github.com/bitcoin/bips/blob/master/bip-0032.mediawiki

use bitcoin::base58;
use bitcoin::hashes::{Hash, HashEngine, hash160, hmac, sha512};
use bitcoin::key::XOnlyPublicKey;
use bitcoin::secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use charms_core::constants::{BIP32_SEED_KEY, HARDENED_OFFSET};
use charms_core::error::DerivationError;
use charms_core::network::{MAINNET_PARAMS, Network, TESTNET_PARAMS};

/// Length of a serialized extended key before the base58check wrapper.
const EXTENDED_KEY_LEN: usize = 78;

/// Shared signing/verification context.
pub(crate) fn secp() -> &'static Secp256k1<All> {
    static CONTEXT: OnceLock<Secp256k1<All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

/// A 64-byte BIP-39 seed.
///
/// Secret material is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 64],
}

impl Seed {
    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

/// One step of a derivation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildNumber(u32);

impl ChildNumber {
    /// Non-hardened child. `index` must be below 2^31.
    pub fn normal(index: u32) -> Result<Self, DerivationError> {
        if index >= HARDENED_OFFSET {
            return Err(DerivationError::InvalidPath(format!("index {index} out of range")));
        }
        Ok(Self(index))
    }

    /// Hardened child. `index` must be below 2^31; the offset is added here.
    pub fn hardened(index: u32) -> Result<Self, DerivationError> {
        if index >= HARDENED_OFFSET {
            return Err(DerivationError::InvalidPath(format!("index {index}' out of range")));
        }
        Ok(Self(index | HARDENED_OFFSET))
    }

    /// Child number as serialized, hardened offset included.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_hardened(&self) -> bool {
        self.0 >= HARDENED_OFFSET
    }

    /// Index without the hardened offset.
    pub fn index(&self) -> u32 {
        self.0 & !HARDENED_OFFSET
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hardened() {
            write!(f, "{}'", self.index())
        } else {
            write!(f, "{}", self.index())
        }
    }
}

/// A sequence of child numbers from some node.
///
/// Parses `m/86'/0'/0'`, `86h/0h/0h` and `86'/0'/0'` alike; renders the
/// canonical form without the `m/` prefix and with `'` markers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    pub fn new(steps: Vec<ChildNumber>) -> Self {
        Self(steps)
    }

    /// Path extended by one step.
    pub fn child(&self, step: ChildNumber) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }

    pub fn steps(&self) -> &[ChildNumber] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = match trimmed {
            "" | "m" | "M" => return Ok(Self::default()),
            _ => trimmed
                .strip_prefix("m/")
                .or_else(|| trimmed.strip_prefix("M/"))
                .unwrap_or(trimmed),
        };

        body.split('/')
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
                    Some(d) => (d, true),
                    None => (part, false),
                };
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(DerivationError::InvalidPath(s.to_string()));
                }
                let index = digits
                    .parse::<u32>()
                    .map_err(|_| DerivationError::InvalidPath(s.to_string()))?;
                let step = if hardened {
                    ChildNumber::hardened(index)
                } else {
                    ChildNumber::normal(index)
                };
                step.map_err(|_| DerivationError::InvalidPath(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// A BIP-32 extended key node.
///
/// Private material (and the chain code) is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HdNode {
    private_key: Option<[u8; 32]>,
    #[zeroize(skip)]
    public_key: PublicKey,
    chain_code: [u8; 32],
    depth: u8,
    child_number: u32,
    parent_fingerprint: [u8; 4],
}

impl HdNode {
    /// Master node from a seed: `I = HMAC-SHA512("Bitcoin seed", seed)`.
    pub fn master_from_seed(seed: &[u8]) -> Result<Self, DerivationError> {
        let mut engine = hmac::HmacEngine::<sha512::Hash>::new(BIP32_SEED_KEY);
        engine.input(seed);
        let mut i = hmac::Hmac::<sha512::Hash>::from_engine(engine).to_byte_array();

        let node = SecretKey::from_slice(&i[..32])
            .map_err(|_| DerivationError::InvalidMasterKey)
            .map(|secret| {
                let mut chain_code = [0u8; 32];
                chain_code.copy_from_slice(&i[32..]);
                Self::from_secret(secret, chain_code, 0, 0, [0u8; 4])
            });
        i.zeroize();
        node
    }

    fn from_secret(
        secret: SecretKey,
        chain_code: [u8; 32],
        depth: u8,
        child_number: u32,
        parent_fingerprint: [u8; 4],
    ) -> Self {
        Self {
            private_key: Some(secret.secret_bytes()),
            public_key: PublicKey::from_secret_key(secp(), &secret),
            chain_code,
            depth,
            child_number,
            parent_fingerprint,
        }
    }

    /// Derive one child.
    ///
    /// Hardened steps require the private key; a public-only node fails with
    /// [`DerivationError::HardenedFromPublic`]. An `IL` outside the curve
    /// order or a zero/infinite resulting key fails with
    /// [`DerivationError::InvalidChildKey`].
    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, DerivationError> {
        let depth = self.depth.checked_add(1).ok_or(DerivationError::DepthExceeded)?;
        let invalid = || DerivationError::InvalidChildKey {
            depth,
            index: child.raw(),
        };

        let mut engine = hmac::HmacEngine::<sha512::Hash>::new(&self.chain_code);
        if child.is_hardened() {
            let key = self
                .private_key
                .as_ref()
                .ok_or(DerivationError::HardenedFromPublic { index: child.raw() })?;
            engine.input(&[0u8]);
            engine.input(key);
        } else {
            engine.input(&self.public_key.serialize());
        }
        engine.input(&child.raw().to_be_bytes());
        let mut i = hmac::Hmac::<sha512::Hash>::from_engine(engine).to_byte_array();

        let mut il = [0u8; 32];
        il.copy_from_slice(&i[..32]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);
        i.zeroize();

        let tweak = Scalar::from_be_bytes(il);
        il.zeroize();
        let tweak = tweak.map_err(|_| invalid())?;
        let parent_fingerprint = self.fingerprint();

        match &self.private_key {
            Some(key) => {
                let secret = SecretKey::from_slice(key)
                    .and_then(|k| k.add_tweak(&tweak))
                    .map_err(|_| invalid())?;
                Ok(Self::from_secret(
                    secret,
                    chain_code,
                    depth,
                    child.raw(),
                    parent_fingerprint,
                ))
            }
            None => {
                let public_key = self
                    .public_key
                    .add_exp_tweak(secp(), &tweak)
                    .map_err(|_| invalid())?;
                Ok(Self {
                    private_key: None,
                    public_key,
                    chain_code,
                    depth,
                    child_number: child.raw(),
                    parent_fingerprint,
                })
            }
        }
    }

    /// Walk every step of `path` from this node.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, DerivationError> {
        path.steps()
            .iter()
            .try_fold(self.clone(), |node, step| node.derive_child(*step))
    }

    /// Copy of this node without the private key.
    pub fn neuter(&self) -> Self {
        let mut node = self.clone();
        node.private_key.zeroize();
        node.private_key = None;
        node
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Internal key for a Taproot output.
    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        self.public_key.x_only_public_key().0
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> ChildNumber {
        ChildNumber::from_raw(self.child_number)
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    /// HASH160 of the compressed public key.
    pub fn identifier(&self) -> [u8; 20] {
        hash160::Hash::hash(&self.public_key.serialize()).to_byte_array()
    }

    /// First four bytes of [`identifier`](Self::identifier).
    pub fn fingerprint(&self) -> [u8; 4] {
        let id = self.identifier();
        [id[0], id[1], id[2], id[3]]
    }

    /// Serialized extended public key (`xpub`/`tpub`).
    pub fn to_xpub(&self, network: Network) -> String {
        self.encode(network.params().xpub_version, &self.public_key.serialize())
    }

    /// Serialized extended private key (`xprv`/`tprv`), if the node has one.
    pub fn to_xpriv(&self, network: Network) -> Option<String> {
        self.private_key.as_ref().map(|key| {
            let mut data = [0u8; 33];
            data[1..].copy_from_slice(key);
            let encoded = self.encode(network.params().xpriv_version, &data);
            data.zeroize();
            encoded
        })
    }

    fn encode(&self, version: [u8; 4], key_data: &[u8; 33]) -> String {
        let mut buf = Vec::with_capacity(EXTENDED_KEY_LEN);
        buf.extend_from_slice(&version);
        buf.push(self.depth);
        buf.extend_from_slice(&self.parent_fingerprint);
        buf.extend_from_slice(&self.child_number.to_be_bytes());
        buf.extend_from_slice(&self.chain_code);
        buf.extend_from_slice(key_data);
        let encoded = base58::encode_check(&buf);
        buf.zeroize();
        encoded
    }

    /// Parse a base58check extended key.
    ///
    /// Returns the node together with the network family implied by its
    /// version bytes. Testnet and regtest share version bytes, so both map to
    /// [`Network::Testnet4`].
    pub fn from_extended_key(encoded: &str) -> Result<(Self, Network), DerivationError> {
        let bad = |reason: &str| DerivationError::InvalidExtendedKey(reason.to_string());

        let mut data = base58::decode_check(encoded.trim()).map_err(|_| bad("bad base58check"))?;
        if data.len() != EXTENDED_KEY_LEN {
            data.zeroize();
            return Err(bad("wrong length"));
        }

        let version = [data[0], data[1], data[2], data[3]];
        let (network, private) = match version {
            v if v == MAINNET_PARAMS.xpub_version => (Network::Mainnet, false),
            v if v == MAINNET_PARAMS.xpriv_version => (Network::Mainnet, true),
            v if v == TESTNET_PARAMS.xpub_version => (Network::Testnet4, false),
            v if v == TESTNET_PARAMS.xpriv_version => (Network::Testnet4, true),
            _ => {
                data.zeroize();
                return Err(bad("unknown version bytes"));
            }
        };

        let depth = data[4];
        let parent_fingerprint = [data[5], data[6], data[7], data[8]];
        let child_number = u32::from_be_bytes([data[9], data[10], data[11], data[12]]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        let key_data = &data[45..78];

        let node = if private {
            if key_data[0] != 0 {
                Err(bad("private key must be prefixed with 0x00"))
            } else {
                SecretKey::from_slice(&key_data[1..])
                    .map_err(|_| bad("private key out of range"))
                    .map(|secret| {
                        Self::from_secret(secret, chain_code, depth, child_number, parent_fingerprint)
                    })
            }
        } else {
            PublicKey::from_slice(key_data)
                .map_err(|_| bad("invalid public key"))
                .map(|public_key| Self {
                    private_key: None,
                    public_key,
                    chain_code,
                    depth,
                    child_number,
                    parent_fingerprint,
                })
        };
        data.zeroize();
        node.map(|n| (n, network))
    }

    /// Key-path-only Taproot address of this node (BIP-86: BIP-341 tweak
    /// with an empty script tree).
    pub fn taproot_address(&self, network: Network) -> bitcoin::Address {
        bitcoin::Address::p2tr(secp(), self.x_only_public_key(), None, network.to_bitcoin())
    }
}

impl fmt::Debug for HdNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdNode")
            .field("public_key", &self.public_key)
            .field("depth", &self.depth)
            .field("child_number", &self.child_number())
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::{DerivationPath as Bip32Path, Xpriv, Xpub};

    /// BIP-32 test vector 1 seed.
    const TV1_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    fn tv1_master() -> HdNode {
        HdNode::master_from_seed(&hex::decode(TV1_SEED).unwrap()).unwrap()
    }

    #[test]
    fn bip32_vector1_master() {
        let m = tv1_master();
        assert_eq!(
            m.to_xpub(Network::Mainnet),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
        assert_eq!(
            m.to_xpriv(Network::Mainnet).unwrap(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
    }

    #[test]
    fn bip32_vector1_chain() {
        let path: DerivationPath = "m/0'/1/2'/2/1000000000".parse().unwrap();
        let node = tv1_master().derive_path(&path).unwrap();
        assert_eq!(
            node.to_xpub(Network::Mainnet),
            "xpub6H1LXWLaKsWFhvm6RVpEL9P4KfRZSW7abD2ttkWP3SSQvnyA8FSVqNTEcYFgJS2UaFcxupHiYkro49S8yGasTvXEYBVPamhGW6cFJodrTHy"
        );
    }

    #[test]
    fn matches_bitcoin_bip32() {
        let seed = [0x42u8; 64];
        let path_str = "m/86'/1'/0'/1/7";
        let ours = HdNode::master_from_seed(&seed)
            .unwrap()
            .derive_path(&path_str.parse().unwrap())
            .unwrap();

        let secp = Secp256k1::new();
        let theirs = Xpriv::new_master(bitcoin::Network::Testnet, &seed)
            .unwrap()
            .derive_priv(&secp, &Bip32Path::from_str(path_str).unwrap())
            .unwrap();
        let theirs_pub = Xpub::from_priv(&secp, &theirs);

        assert_eq!(ours.to_xpriv(Network::Testnet4).unwrap(), theirs.to_string());
        assert_eq!(ours.to_xpub(Network::Testnet4), theirs_pub.to_string());
    }

    #[test]
    fn public_derivation_matches_private() {
        let account = tv1_master()
            .derive_path(&"86'/0'/0'".parse().unwrap())
            .unwrap();
        let step = ChildNumber::normal(5).unwrap();
        let from_private = account.derive_child(step).unwrap();
        let from_public = account.neuter().derive_child(step).unwrap();
        assert_eq!(from_private.public_key(), from_public.public_key());
        assert_eq!(from_private.chain_code(), from_public.chain_code());
        assert!(!from_public.has_private_key());
    }

    #[test]
    fn hardened_from_public_rejected() {
        let public = tv1_master().neuter();
        let err = public.derive_child(ChildNumber::hardened(0).unwrap()).unwrap_err();
        assert_eq!(err, DerivationError::HardenedFromPublic { index: HARDENED_OFFSET });
    }

    #[test]
    fn neutered_node_has_no_xpriv() {
        assert!(tv1_master().neuter().to_xpriv(Network::Mainnet).is_none());
    }

    #[test]
    fn child_records_parent_fingerprint() {
        let m = tv1_master();
        let c = m.derive_child(ChildNumber::hardened(0).unwrap()).unwrap();
        assert_eq!(c.parent_fingerprint(), m.fingerprint());
        assert_eq!(c.depth(), 1);
        assert!(c.child_number().is_hardened());
    }

    #[test]
    fn extended_key_parse_roundtrip() {
        let node = tv1_master().derive_path(&"86'/0'/0'".parse().unwrap()).unwrap();
        let xpub = node.to_xpub(Network::Testnet4);
        let (parsed, net) = HdNode::from_extended_key(&xpub).unwrap();
        assert_eq!(net, Network::Testnet4);
        assert!(!parsed.has_private_key());
        assert_eq!(parsed.to_xpub(Network::Testnet4), xpub);

        let xpriv = node.to_xpriv(Network::Mainnet).unwrap();
        let (parsed, net) = HdNode::from_extended_key(&xpriv).unwrap();
        assert_eq!(net, Network::Mainnet);
        assert_eq!(parsed.to_xpriv(Network::Mainnet).unwrap(), xpriv);
    }

    #[test]
    fn extended_key_parse_rejects_garbage() {
        assert!(matches!(
            HdNode::from_extended_key("xpubnotreal"),
            Err(DerivationError::InvalidExtendedKey(_))
        ));
    }

    #[test]
    fn path_parsing_variants() {
        let a: DerivationPath = "m/86'/0'/0'".parse().unwrap();
        let b: DerivationPath = "86h/0h/0h".parse().unwrap();
        let c: DerivationPath = "86'/0'/0'".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "86'/0'/0'");
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn path_parsing_master() {
        assert!("m".parse::<DerivationPath>().unwrap().is_empty());
        assert!("".parse::<DerivationPath>().unwrap().is_empty());
    }

    #[test]
    fn path_parsing_rejects_bad_components() {
        for bad in ["86'/x/0", "m//0", "86''", "2147483648", "-1", "m/0/"] {
            assert!(
                matches!(bad.parse::<DerivationPath>(), Err(DerivationError::InvalidPath(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn child_number_display() {
        assert_eq!(ChildNumber::hardened(86).unwrap().to_string(), "86'");
        assert_eq!(ChildNumber::normal(3).unwrap().to_string(), "3");
        assert!(ChildNumber::normal(HARDENED_OFFSET).is_err());
    }

    #[test]
    fn seed_debug_redacted() {
        let seed = Seed::from_bytes([7u8; 64]);
        assert!(format!("{seed:?}").contains("REDACTED"));
    }
}
