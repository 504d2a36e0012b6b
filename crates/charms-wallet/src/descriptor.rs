//! Output descriptors for the BIP-86 account.
//!
//! Only the single-key `tr()` form is produced:
//! `tr([<fingerprint>/<path>]<key>/<branch>/*)`. The optional
//! `#<checksum>` suffix follows [BIP-380].
//!
//! [BIP-380]: https://github.com/bitcoin/bips/blob/master/bip-0380.mediawiki

use serde::{Deserialize, Serialize};

const INPUT_CHARSET: &str =
    "0123456789()[],'/*abcdefgh@:$%{}IJKLMNOPQRSTUVWXYZ&+-.;<=>?!^_|~ijklmnopqrstuvwxyzABCDEFGH`#\"\\ ";
const CHECKSUM_CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const GENERATORS: [u64; 5] = [
    0xf5dee51989,
    0xa9fdca3312,
    0x1bab10e32d,
    0x3706b1677a,
    0x644d626ffd,
];

fn polymod(c: u64, val: u64) -> u64 {
    let c0 = c >> 35;
    let mut c = ((c & 0x7_ffff_ffff) << 5) ^ val;
    for (bit, generator) in GENERATORS.iter().enumerate() {
        if (c0 >> bit) & 1 == 1 {
            c ^= generator;
        }
    }
    c
}

/// Eight-character checksum of a descriptor body.
///
/// Returns `None` when the body contains a character outside the descriptor
/// character set.
pub fn descriptor_checksum(descriptor: &str) -> Option<String> {
    let mut c = 1u64;
    let mut cls = 0u64;
    let mut cls_count = 0;
    for ch in descriptor.chars() {
        let pos = INPUT_CHARSET.find(ch)? as u64;
        c = polymod(c, pos & 31);
        cls = cls * 3 + (pos >> 5);
        cls_count += 1;
        if cls_count == 3 {
            c = polymod(c, cls);
            cls = 0;
            cls_count = 0;
        }
    }
    if cls_count > 0 {
        c = polymod(c, cls);
    }
    for _ in 0..8 {
        c = polymod(c, 0);
    }
    c ^= 1;

    Some(
        (0..8)
            .map(|j| CHECKSUM_CHARSET[((c >> (5 * (7 - j))) & 31) as usize] as char)
            .collect(),
    )
}

/// `descriptor#checksum`, or `None` for an unencodable body.
pub fn with_checksum(descriptor: &str) -> Option<String> {
    descriptor_checksum(descriptor).map(|sum| format!("{descriptor}#{sum}"))
}

/// Check a `descriptor#checksum` string.
pub fn verify_checksum(full: &str) -> bool {
    match full.rsplit_once('#') {
        Some((body, sum)) => descriptor_checksum(body).is_some_and(|expected| expected == sum),
        None => false,
    }
}

/// Single-key Taproot descriptor for one branch of an account.
pub fn taproot_descriptor(fingerprint: &str, account_path: &str, key: &str, branch: u32) -> String {
    format!("tr([{fingerprint}/{account_path}]{key}/{branch}/*)")
}

/// Receive and change descriptors of one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptors {
    pub receive: String,
    pub change: String,
}

impl Descriptors {
    /// Both descriptors with their checksums appended.
    pub fn checksummed(&self) -> Option<Descriptors> {
        Some(Descriptors {
            receive: with_checksum(&self.receive)?,
            change: with_checksum(&self.change)?,
        })
    }
}
