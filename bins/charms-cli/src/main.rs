//! charms-cli: Command-line interface for the Charms wallet core.
//!
//! Generates and validates mnemonics, derives the BIP-86 wallet identity,
//! descriptors and addresses, estimates fees, selects UTXOs from the local
//! wallet file, and decodes raw transactions. Output is JSON on stdout.

mod config;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use charms_core::constants::BIP86_ACCOUNT_PATH;
use charms_core::network::Network;
use charms_core::script::ScriptKind;
use charms_wallet::identity::Account;
use charms_wallet::{
    DerivationPath, FeeRate, TransactionDecoder, UtxoSelector, WalletSession, estimate_fee,
    estimate_vsize, generate_mnemonic,
};

use crate::config::CliConfig;
use crate::store::JsonFileStore;

/// Charms wallet command-line interface.
#[derive(Parser, Debug)]
#[command(name = "charms-cli")]
#[command(version, about = "Non-custodial Bitcoin wallet core")]
struct Cli {
    /// Configuration file (default: ~/.charms/config.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Network override (mainnet, testnet4, regtest).
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mnemonic subcommands.
    Mnemonic {
        #[command(subcommand)]
        action: MnemonicAction,
    },
    /// Derive and print the wallet identity.
    Identity(IdentityArgs),
    /// Print receive and change descriptors.
    Descriptors(DescriptorArgs),
    /// Derive receive/change address pairs.
    Addresses(AddressArgs),
    /// Estimate a transaction fee.
    Fee(FeeArgs),
    /// Create (or load) the wallet identity in the wallet file.
    Init(MnemonicInput),
    /// Show the balance of the wallet file's UTXOs.
    Balance,
    /// Select UTXOs from the wallet file for a payment.
    Select(SelectArgs),
    /// Decode a raw transaction.
    Decode(DecodeArgs),
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug)]
enum MnemonicAction {
    /// Generate a new mnemonic.
    Generate {
        /// Number of words (12 or 24).
        #[arg(short, long, default_value = "12")]
        words: usize,
    },
    /// Check a mnemonic against the wordlist and checksum.
    Validate(MnemonicInput),
}

#[derive(Args, Debug)]
struct MnemonicInput {
    /// Mnemonic phrase. Prompted for (hidden) when omitted.
    #[arg(short, long)]
    mnemonic: Option<String>,
}

#[derive(Args, Debug)]
struct IdentityArgs {
    #[command(flatten)]
    input: MnemonicInput,

    /// Account derivation path.
    #[arg(short, long, default_value = BIP86_ACCOUNT_PATH)]
    path: String,

    /// Include the extended private key in the output.
    #[arg(long)]
    show_private: bool,
}

#[derive(Args, Debug)]
struct DescriptorArgs {
    #[command(flatten)]
    input: MnemonicInput,

    /// Emit descriptors with the extended private key.
    #[arg(long)]
    private: bool,

    /// Append BIP-380 checksums.
    #[arg(long)]
    checksum: bool,
}

#[derive(Args, Debug)]
struct AddressArgs {
    #[command(flatten)]
    input: MnemonicInput,

    /// First address index.
    #[arg(short, long, default_value = "0")]
    start: u32,

    /// Number of receive/change pairs.
    #[arg(short, long, default_value = "5")]
    count: u32,
}

#[derive(Args, Debug)]
struct FeeArgs {
    /// Input script kinds, comma separated (p2tr, p2pkh, p2wpkh, ...).
    #[arg(short, long, value_delimiter = ',', default_value = "p2tr")]
    inputs: Vec<String>,

    /// Number of outputs.
    #[arg(short, long, default_value = "2")]
    outputs: usize,

    /// Fee rate in sat/vB (default: from configuration).
    #[arg(short, long)]
    rate: Option<FeeRate>,
}

#[derive(Args, Debug)]
struct SelectArgs {
    /// Amount to pay in satoshis.
    #[arg(short, long)]
    amount: u64,

    /// Fee rate in sat/vB (default: from configuration).
    #[arg(short, long)]
    rate: Option<FeeRate>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Raw transaction hex. Read from --file when omitted.
    hex: Option<String>,

    /// File containing raw transaction hex.
    #[arg(short, long)]
    file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = CliConfig::load(cli.config.as_deref())?;
    if let Some(network) = &cli.network {
        cfg.network = network.clone();
    }

    init_tracing(&cfg.log_level, cli.json_logs);

    match cli.command {
        Commands::Mnemonic { action } => match action {
            MnemonicAction::Generate { words } => mnemonic_generate(words),
            MnemonicAction::Validate(input) => mnemonic_validate(input),
        },
        Commands::Identity(args) => identity(&cfg, args),
        Commands::Descriptors(args) => descriptors(&cfg, args),
        Commands::Addresses(args) => addresses(&cfg, args),
        Commands::Fee(args) => fee(&cfg, args),
        Commands::Init(input) => init(&cfg, input),
        Commands::Balance => balance(&cfg),
        Commands::Select(args) => select(&cfg, args),
        Commands::Decode(args) => decode(&cfg, args),
        Commands::Config => print_json(&cfg),
    }
}

fn init_tracing(default_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn mnemonic_generate(words: usize) -> Result<()> {
    let phrase = generate_mnemonic(words)?;
    eprintln!("WARNING: anyone with this phrase can spend the wallet's funds. Store it offline.");
    print_json(&json!({ "mnemonic": phrase, "words": words }))
}

fn mnemonic_validate(input: MnemonicInput) -> Result<()> {
    let phrase = read_mnemonic(input)?;
    let valid = charms_wallet::mnemonic::parse_mnemonic(&phrase).is_ok();
    print_json(&json!({ "valid": valid }))?;
    if !valid {
        bail!("mnemonic failed validation");
    }
    Ok(())
}

fn identity(cfg: &CliConfig, args: IdentityArgs) -> Result<()> {
    let network = cfg.network()?;
    let path: DerivationPath = args.path.parse().context("invalid derivation path")?;
    let account = Account::from_mnemonic(&read_mnemonic(args.input)?, network, &path)?;
    let mut identity = account.identity();
    if !args.show_private {
        identity.xpriv.clear();
    }
    print_json(&identity)
}

fn descriptors(cfg: &CliConfig, args: DescriptorArgs) -> Result<()> {
    let account = bip86_account(cfg, args.input)?;
    let descriptors = if args.private {
        account
            .private_descriptors()
            .context("account has no private key")?
    } else {
        account.descriptors()
    };
    let descriptors = if args.checksum {
        descriptors
            .checksummed()
            .context("descriptor contains characters outside the descriptor charset")?
    } else {
        descriptors
    };
    print_json(&descriptors)
}

fn addresses(cfg: &CliConfig, args: AddressArgs) -> Result<()> {
    let account = bip86_account(cfg, args.input)?;
    let pairs = account.address_pairs(args.start, args.count)?;
    let rows: Vec<_> = pairs
        .into_iter()
        .map(|(receive, change)| json!({ "index": receive.index, "receive": receive.address, "change": change.address }))
        .collect();
    print_json(&rows)
}

fn fee(cfg: &CliConfig, args: FeeArgs) -> Result<()> {
    let rate = match args.rate {
        Some(rate) => rate,
        None => cfg.fee_rate()?,
    };
    let kinds = args
        .inputs
        .iter()
        .map(|s| parse_script_kind(s))
        .collect::<Result<Vec<_>>>()?;
    print_json(&json!({
        "vsize": estimate_vsize(&kinds, args.outputs),
        "feeRate": rate.sat_per_vbyte(),
        "feeSats": estimate_fee(&kinds, args.outputs, rate),
    }))
}

fn init(cfg: &CliConfig, input: MnemonicInput) -> Result<()> {
    let session = open_session(cfg)?;
    let mut identity = session.load_or_create_identity(&read_mnemonic(input)?)?;
    identity.xpriv.clear();
    info!(file = %cfg.data_file()?.display(), "wallet identity ready");
    print_json(&identity)
}

fn balance(cfg: &CliConfig) -> Result<()> {
    let session = open_session(cfg)?;
    print_json(&session.balance()?)
}

fn select(cfg: &CliConfig, args: SelectArgs) -> Result<()> {
    let rate = match args.rate {
        Some(rate) => rate,
        None => cfg.fee_rate()?,
    };
    let session = open_session(cfg)?;
    let selection = session.prepare_payment(args.amount, rate)?;
    print_json(&selection)?;
    if !selection.sufficient_funds {
        bail!(
            "insufficient funds: selected {} sats, need {}",
            selection.total_selected,
            args.amount.saturating_add(selection.estimated_fee)
        );
    }
    Ok(())
}

fn decode(cfg: &CliConfig, args: DecodeArgs) -> Result<()> {
    let raw = match (args.hex, args.file) {
        (Some(hex), _) => hex,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => bail!("provide transaction hex or --file"),
    };
    let decoded = TransactionDecoder::new(cfg.network()?).decode(&raw)?;
    print_json(&json!({
        "transaction": decoded,
        "fullyWitnessed": decoded.is_fully_witnessed(),
    }))
}

fn open_session(cfg: &CliConfig) -> Result<WalletSession<JsonFileStore>> {
    let network: Network = cfg.network()?;
    let path = cfg.data_file()?;
    let store = JsonFileStore::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let selector = Arc::new(UtxoSelector::with_blacklist(cfg.blacklist()?));
    Ok(WalletSession::new(store, network)
        .with_selector(selector)
        .with_protected(cfg.protected()?)
        .with_cache_ttl(cfg.utxo_cache_ttl()))
}

fn bip86_account(cfg: &CliConfig, input: MnemonicInput) -> Result<Account> {
    let path: DerivationPath = BIP86_ACCOUNT_PATH.parse()?;
    Ok(Account::from_mnemonic(&read_mnemonic(input)?, cfg.network()?, &path)?)
}

/// Mnemonic from the flag, or a hidden prompt.
fn read_mnemonic(input: MnemonicInput) -> Result<String> {
    match input.mnemonic {
        Some(m) => Ok(m),
        None => rpassword::prompt_password("Mnemonic: ").context("failed to read mnemonic"),
    }
}

fn parse_script_kind(s: &str) -> Result<ScriptKind> {
    Ok(match s.trim().to_lowercase().as_str() {
        "p2tr" | "taproot" => ScriptKind::Taproot,
        "p2pkh" => ScriptKind::P2pkh,
        "p2sh" => ScriptKind::P2sh,
        "p2wpkh" => ScriptKind::P2wpkh,
        "p2wsh" => ScriptKind::P2wsh,
        "unknown" | "unclassified" => ScriptKind::Unclassified,
        other => bail!("unknown script kind: {other}"),
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
