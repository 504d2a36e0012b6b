//! Wallet constants. All monetary values in satoshis (1 BTC = 10^8 sats).

pub const SATS_PER_BTC: u64 = 100_000_000;

/// BIP-86 account path (Taproot, coin type 0, account 0).
///
/// Existing wallets and their descriptors were created with this exact path
/// on every network, so it is not configurable.
pub const BIP86_ACCOUNT_PATH: &str = "86'/0'/0'";

/// Descriptor branch for receiving addresses.
pub const RECEIVE_BRANCH: u32 = 0;

/// Descriptor branch for change addresses.
pub const CHANGE_BRANCH: u32 = 1;

/// First hardened child index (2^31).
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// HMAC key used to derive the BIP-32 master node from a seed.
pub const BIP32_SEED_KEY: &[u8] = b"Bitcoin seed";

// --- Fee estimation (virtual bytes) ---

/// Estimated size of a Taproot key-path input.
pub const TAPROOT_INPUT_VBYTES: u64 = 57;

/// Estimated size of a legacy P2PKH input.
pub const P2PKH_INPUT_VBYTES: u64 = 148;

/// Estimated size of one output.
pub const OUTPUT_VBYTES: u64 = 34;

/// Version, locktime and count fields.
pub const TX_OVERHEAD_VBYTES: u64 = 10;

// --- Coin selection ---

/// Lower bound on the provisional fee used during selection.
pub const MIN_SELECTION_FEE: u64 = 200;

/// Outputs assumed during selection: destination plus change.
pub const SELECTION_OUTPUT_COUNT: usize = 2;

/// Smallest change output worth creating. Less is added to the fee.
pub const DUST_LIMIT_SATS: u64 = 546;

/// Address placeholder for output scripts that do not map to an address.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Default lifetime of cached lookups, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

// --- Asset protection ---

/// Value of the carrier output a charm is minted onto.
pub const CHARM_CARRIER_SATS: u64 = 1000;

/// Value of a typical rune-bearing output (the dust limit).
pub const RUNE_CARRIER_SATS: u64 = DUST_LIMIT_SATS;
