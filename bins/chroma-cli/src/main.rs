//! chroma: command-line colored-coin wallet.
//!
//! Talks to an Esplora-compatible indexer. The mnemonic is read from
//! `CHROMA_MNEMONIC` or prompted for without echo, and is never written to
//! disk. Pending transactions, issued tokens and issuance recovery records
//! live under the state directory (default: the platform data dir, `chroma/<network>/`).

mod config;
mod state;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use chroma_core::address::Network;
use chroma_core::types::{ColorId, TokenType, Txid};
use chroma_esplora::{EsploraClient, RegistryClient};
use chroma_wallet::amount::{format_amount, parse_native, parse_token, NATIVE_DECIMALS};
use chroma_wallet::mnemonic::generate_mnemonic;
use chroma_wallet::{
    CachePolicy, FundingPropagation, IssuanceResult, Metadata, PendingKind, PendingTransaction, PollSchedule,
    SendResult, TokenMetadataCache, Wallet, WalletBalances, WalletConfig, WalletError,
};

use crate::config::{read_mnemonic, Config};
use crate::state::{IssuedToken, StateDir};

/// Non-custodial colored-coin wallet.
#[derive(Parser)]
#[command(name = "chroma")]
#[command(version, about = "Non-custodial colored-coin wallet.")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Network (prod or dev). Overrides CHROMA_NETWORK.
    #[arg(long, global = true)]
    network: Option<String>,

    /// Esplora base URL. Overrides CHROMA_ESPLORA_URL.
    #[arg(long, global = true)]
    esplora_url: Option<String>,

    /// Fee rate in smallest units per byte. Overrides CHROMA_FEE_RATE.
    #[arg(long, global = true)]
    fee_rate: Option<u64>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log format (text or json).
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new mnemonic phrase.
    GenerateMnemonic(GenerateArgs),
    /// Show the wallet's receive address.
    Address,
    /// Show native and asset balances.
    Balance(BalanceArgs),
    /// Estimate the fee of a native transfer.
    Fee(FeeArgs),
    /// Send native coins.
    Send(SendArgs),
    /// Send a colored asset.
    SendAsset(SendAssetArgs),
    /// Burn a colored asset.
    Burn(BurnArgs),
    /// Issue a new token.
    Issue(IssueArgs),
    /// Finish an issuance that stopped after its funding transaction.
    ResumeIssuance(ResumeArgs),
    /// Query a transaction's confirmation status.
    Status(StatusArgs),
    /// List pending transactions, dropping those now confirmed.
    Pending,
    /// List tokens issued from this machine.
    Tokens,
}

#[derive(Args)]
struct GenerateArgs {
    /// Number of words (12, 15, 18, 21 or 24).
    #[arg(short, long, default_value = "12")]
    words: usize,
}

#[derive(Args)]
struct BalanceArgs {
    /// Address to query (default: the wallet's own address).
    #[arg(short, long)]
    address: Option<String>,
}

#[derive(Args)]
struct FeeArgs {
    /// Amount in TPC (e.g., 0.5).
    #[arg(short, long)]
    amount: String,
}

#[derive(Args)]
struct SendArgs {
    /// Recipient address.
    #[arg(short, long)]
    to: String,

    /// Amount in TPC (e.g., 10.5).
    #[arg(short, long)]
    amount: String,
}

#[derive(Args)]
struct SendAssetArgs {
    /// Color id (66 hex characters).
    #[arg(short, long)]
    color: String,

    /// Recipient address, plain or colored.
    #[arg(short, long)]
    to: String,

    /// Amount in token units.
    #[arg(short, long)]
    amount: String,

    /// Token decimals used to parse the amount.
    #[arg(short, long, default_value = "0")]
    decimals: u8,
}

#[derive(Args)]
struct BurnArgs {
    /// Color id (66 hex characters).
    #[arg(short, long)]
    color: String,

    /// Amount in token units.
    #[arg(short, long)]
    amount: String,

    /// Token decimals used to parse the amount.
    #[arg(short, long, default_value = "0")]
    decimals: u8,
}

#[derive(Args)]
struct IssueArgs {
    /// Token name.
    #[arg(long)]
    name: Option<String>,

    /// Token symbol.
    #[arg(long)]
    symbol: Option<String>,

    /// Token type: reissuable, non_reissuable or nft.
    #[arg(long = "type", default_value = "reissuable")]
    token_type: String,

    /// Display decimals.
    #[arg(long)]
    decimals: Option<u8>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    website: Option<String>,

    #[arg(long)]
    image: Option<String>,

    /// Read full metadata from a JSON file instead of flags.
    #[arg(long, conflicts_with_all = ["name", "symbol", "description", "website", "image"])]
    metadata_file: Option<PathBuf>,

    /// Amount in token units (1 for NFTs).
    #[arg(short, long)]
    amount: String,

    /// Wait for the indexer to see the funding transaction before issuing.
    #[arg(long)]
    await_indexer: bool,
}

#[derive(Args)]
struct ResumeArgs {
    /// Recovery file (default: the oldest one in the state directory).
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct StatusArgs {
    /// Transaction id.
    txid: String,

    /// Poll until confirmed.
    #[arg(short, long)]
    wait: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global.log_level, &cli.global.log_format);

    let config = load_config(&cli.global)?;
    let out = Output { json: cli.global.json };

    match cli.command {
        Commands::GenerateMnemonic(args) => cmd_generate(args, &out),
        Commands::Address => cmd_address(&config, &out),
        Commands::Balance(args) => cmd_balance(args, &config, &out).await,
        Commands::Fee(args) => cmd_fee(args, &config, &out).await,
        Commands::Send(args) => cmd_send(args, &config, &out).await,
        Commands::SendAsset(args) => cmd_send_asset(args, &config, &out).await,
        Commands::Burn(args) => cmd_burn(args, &config, &out).await,
        Commands::Issue(args) => cmd_issue(args, &config, &out).await,
        Commands::ResumeIssuance(args) => cmd_resume(args, &config, &out).await,
        Commands::Status(args) => cmd_status(args, &config, &out).await,
        Commands::Pending => cmd_pending(&config, &out).await,
        Commands::Tokens => cmd_tokens(&config, &out),
    }
}

fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    // stdout carries command output only.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(network) = &global.network {
        config.network = network
            .parse::<Network>()
            .with_context(|| format!("Invalid network: {network}"))?;
    }
    if let Some(url) = &global.esplora_url {
        config.esplora_url = url.clone();
    }
    if let Some(rate) = global.fee_rate {
        config.fee_rate = rate;
    }
    Ok(config)
}

fn open_wallet(config: &Config, propagation: FundingPropagation) -> Result<Wallet<EsploraClient>> {
    let client = EsploraClient::new(&config.esplora_url, config.http_timeout)
        .context("Failed to build HTTP client")?;
    let wallet_config = WalletConfig {
        fee_rate: config.fee_rate,
        propagation,
        ..WalletConfig::for_network(config.network)
    };
    Wallet::new(client, wallet_config).context("Invalid wallet configuration")
}

/// Renders results either as JSON or as labelled text blocks.
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> Result<()> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("Failed to serialize output")?
            );
        } else {
            text();
        }
        Ok(())
    }
}

fn tpc(value: u64) -> String {
    format!("{} TPC", format_amount(value, NATIVE_DECIMALS))
}

fn parse_color(s: &str) -> Result<ColorId> {
    s.trim()
        .parse::<ColorId>()
        .with_context(|| format!("Invalid color id: {s}"))
}

/// Record a broadcast transaction in the pending list.
fn track(config: &Config, entry: PendingTransaction) {
    let state = StateDir::new(config.network_state_dir());
    let result = state.load_pending().and_then(|mut pending| {
        pending.add(entry);
        state.save_pending(&pending)
    });
    if let Err(e) = result {
        warn!(error = %e, "could not record pending transaction");
    }
}

fn cmd_generate(args: GenerateArgs, out: &Output) -> Result<()> {
    let phrase = generate_mnemonic(args.words).context("Failed to generate mnemonic")?;
    out.emit(&serde_json::json!({ "mnemonic": phrase }), || {
        println!("\n=== NEW MNEMONIC ({} WORDS) ===", args.words);
        println!("  {phrase}");
        println!("\nWARNING: This phrase will NOT be shown again.");
        println!("Anyone with this phrase can spend your funds.");
    })
}

fn cmd_address(config: &Config, out: &Output) -> Result<()> {
    let wallet = open_wallet(config, FundingPropagation::Immediate)?;
    let mnemonic = read_mnemonic()?;
    let address = wallet.address(&mnemonic).context("Failed to derive address")?;
    out.emit(&serde_json::json!({ "address": address.to_string() }), || {
        println!("{address}");
    })
}

async fn cmd_balance(args: BalanceArgs, config: &Config, out: &Output) -> Result<()> {
    let wallet = open_wallet(config, FundingPropagation::Immediate)?;
    let address = match &args.address {
        Some(a) => wallet.parse_address(a).context("Invalid address")?,
        None => wallet.address(&read_mnemonic()?).context("Failed to derive address")?,
    };
    let balances = wallet
        .balances(&address)
        .await
        .context("Failed to fetch balances")?;
    let tokens = token_metadata(config, &balances).await;
    let report = BalanceReport { balances: &balances, tokens };
    out.emit(&report, || print_balances(config.network, &address.to_string(), &report))
}

#[derive(Serialize)]
struct BalanceReport<'a> {
    #[serde(flatten)]
    balances: &'a WalletBalances,
    tokens: Vec<TokenInfo>,
}

/// Registry metadata of one held asset, `null` when unregistered.
#[derive(Serialize)]
struct TokenInfo {
    color_id: ColorId,
    metadata: Option<Metadata>,
}

impl BalanceReport<'_> {
    fn metadata(&self, color: &ColorId) -> Option<&Metadata> {
        self.tokens
            .iter()
            .find(|t| t.color_id == *color)
            .and_then(|t| t.metadata.as_ref())
    }
}

/// Registry metadata for every held asset. Lookup failures degrade to none.
async fn token_metadata(config: &Config, balances: &WalletBalances) -> Vec<TokenInfo> {
    let colors: Vec<ColorId> = balances.assets.iter().map(|a| a.color_id).collect();
    if colors.is_empty() {
        return Vec::new();
    }
    let registry = match RegistryClient::new(&config.registry_url, config.network, config.http_timeout) {
        Ok(registry) => registry,
        Err(e) => {
            warn!(error = %e, "token registry unavailable");
            return Vec::new();
        }
    };
    let mut cache = TokenMetadataCache::new(CachePolicy::default());
    match cache.get_many(&registry, &colors).await {
        Ok(tokens) => tokens
            .into_iter()
            .map(|(color_id, metadata)| TokenInfo { color_id, metadata })
            .collect(),
        Err(e) => {
            warn!(error = %e, "token metadata lookup failed");
            Vec::new()
        }
    }
}

fn print_balances(network: Network, address: &str, report: &BalanceReport<'_>) {
    let balances = report.balances;
    println!("\n=== WALLET BALANCE ===");
    println!("Network: {network}");
    println!("Address: {address}");
    println!("UTXOs: {}", balances.utxo_count);
    println!();
    println!("Confirmed:   {}", tpc(balances.native.confirmed));
    println!("Unconfirmed: {}", tpc(balances.native.unconfirmed));
    println!("Total:       {}", tpc(balances.native.total));
    if !balances.assets.is_empty() {
        println!();
        println!("Assets:");
        for asset in &balances.assets {
            let (label, decimals) = match report.metadata(&asset.color_id) {
                Some(m) => (format!("{} ({})", m.name, m.symbol), m.decimals()),
                None => (asset.color_id.token_type().to_string(), 0),
            };
            println!("  {} {label}", asset.color_id);
            println!(
                "    {} confirmed, {} unconfirmed",
                format_amount(asset.balance.confirmed, decimals),
                format_amount(asset.balance.unconfirmed, decimals)
            );
        }
    }
}

async fn cmd_fee(args: FeeArgs, config: &Config, out: &Output) -> Result<()> {
    let amount = parse_native(&args.amount).context("Invalid amount")?;
    let wallet = open_wallet(config, FundingPropagation::Immediate)?;
    let address = wallet.address(&read_mnemonic()?).context("Failed to derive address")?;
    let selection = wallet
        .estimate_fee(&address, amount)
        .await
        .context("Fee estimation failed")?;
    let json = serde_json::json!({
        "fee": selection.fee,
        "inputs": selection.selected.len(),
        "change": selection.change,
    });
    out.emit(&json, || {
        println!("\n=== FEE ESTIMATE ===");
        println!("Amount: {}", tpc(amount));
        println!("Fee: {} ({} inputs)", tpc(selection.fee), selection.selected.len());
        println!("Change: {}", tpc(selection.change));
    })
}

fn print_sent(title: &str, result: &SendResult, detail: &str) {
    println!("\n=== {title} ===");
    println!("TxID: {}", result.txid);
    println!("{detail}");
    println!("Fee: {}", tpc(result.fee));
}

async fn cmd_send(args: SendArgs, config: &Config, out: &Output) -> Result<()> {
    let amount = parse_native(&args.amount).context("Invalid amount")?;
    let wallet = open_wallet(config, FundingPropagation::Immediate)?;
    let mnemonic = read_mnemonic()?;
    let result = wallet
        .send(&mnemonic, &args.to, amount)
        .await
        .context("Send failed")?;
    track(config, PendingTransaction::new(result.txid, PendingKind::Send, amount, None));
    out.emit(&result, || {
        print_sent(
            "TRANSACTION SENT",
            &result,
            &format!("To: {}\nAmount: {}", args.to, tpc(amount)),
        )
    })
}

async fn cmd_send_asset(args: SendAssetArgs, config: &Config, out: &Output) -> Result<()> {
    let color = parse_color(&args.color)?;
    let amount = parse_token(&args.amount, args.decimals).context("Invalid amount")?;
    let wallet = open_wallet(config, FundingPropagation::Immediate)?;
    let mnemonic = read_mnemonic()?;
    let result = wallet
        .send_asset(&mnemonic, &color, &args.to, amount)
        .await
        .context("Asset transfer failed")?;
    track(
        config,
        PendingTransaction::new(result.txid, PendingKind::SendAsset, amount, Some(color)),
    );
    out.emit(&result, || {
        print_sent(
            "ASSET SENT",
            &result,
            &format!("To: {}\nColor: {color}\nAmount: {}", args.to, args.amount),
        )
    })
}

async fn cmd_burn(args: BurnArgs, config: &Config, out: &Output) -> Result<()> {
    let color = parse_color(&args.color)?;
    let amount = parse_token(&args.amount, args.decimals).context("Invalid amount")?;
    let wallet = open_wallet(config, FundingPropagation::Immediate)?;
    let mnemonic = read_mnemonic()?;
    let result = wallet
        .burn(&mnemonic, &color, amount)
        .await
        .context("Burn failed")?;
    track(
        config,
        PendingTransaction::new(result.txid, PendingKind::Burn, amount, Some(color)),
    );
    out.emit(&result, || {
        print_sent(
            "ASSET BURNED",
            &result,
            &format!("Color: {color}\nAmount: {}", args.amount),
        )
    })
}

fn issue_metadata(args: &IssueArgs) -> Result<Metadata> {
    if let Some(path) = &args.metadata_file {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&data)
            .with_context(|| format!("Malformed metadata in {}", path.display()));
    }

    let token_type: TokenType = args
        .token_type
        .parse()
        .with_context(|| format!("Invalid token type: {}", args.token_type))?;
    let (Some(name), Some(symbol)) = (&args.name, &args.symbol) else {
        bail!("--name and --symbol are required unless --metadata-file is given");
    };
    let mut metadata = Metadata::new(name.as_str(), symbol.as_str(), token_type);
    metadata.decimals = args.decimals;
    metadata.description = args.description.clone();
    metadata.website = args.website.clone();
    metadata.image = args.image.clone();
    Ok(metadata)
}

fn print_issued(result: &IssuanceResult) {
    println!("\n=== TOKEN ISSUED ===");
    println!("TxID: {}", result.txid);
    println!("Color: {} ({})", result.color_id, result.color_id.token_type());
    println!("Payment base: {}", result.payment_base);
    if let Some(out_point) = &result.out_point {
        println!("Out point: {out_point}");
    }
}

/// Save the recovery record of a partial issuance so `resume-issuance` can
/// finish it, and track its funding transaction.
fn save_partial(config: &Config, err: &WalletError) -> Result<()> {
    let Some(recovery) = err.recovery() else {
        return Ok(());
    };
    let state = StateDir::new(config.network_state_dir());
    let path = state.record_partial(recovery)?;
    eprintln!("\nFunding transaction {} was broadcast but issuance did not finish.", recovery.funding_txid);
    eprintln!("Recovery record saved to: {}", path.display());
    eprintln!("Run `chroma resume-issuance --file {}` to finish it.", path.display());
    Ok(())
}

async fn cmd_issue(args: IssueArgs, config: &Config, out: &Output) -> Result<()> {
    let metadata = issue_metadata(&args)?;
    let amount = parse_token(&args.amount, metadata.decimals()).context("Invalid amount")?;
    let propagation = if args.await_indexer {
        FundingPropagation::AwaitIndexer(PollSchedule::default())
    } else {
        FundingPropagation::Immediate
    };
    let wallet = open_wallet(config, propagation)?;
    let mnemonic = read_mnemonic()?;

    info!(name = %metadata.name, token_type = %metadata.token_type, amount, "issuing");
    let result = match wallet.issue(&mnemonic, metadata.clone(), amount).await {
        Ok(result) => result,
        Err(e) => {
            save_partial(config, &e)?;
            return Err(e).context("Issuance failed");
        }
    };
    track(
        config,
        PendingTransaction::new(result.txid, PendingKind::Issue, amount, Some(result.color_id)),
    );
    remember_issued(config, IssuedToken::new(&result, metadata, amount));
    out.emit(&result, || print_issued(&result))
}

fn remember_issued(config: &Config, token: IssuedToken) {
    let state = StateDir::new(config.network_state_dir());
    if let Err(e) = state.record_issued(token) {
        warn!(error = %e, "could not record issued token");
    }
}

async fn cmd_resume(args: ResumeArgs, config: &Config, out: &Output) -> Result<()> {
    let state = StateDir::new(config.network_state_dir());
    let path = match args.file {
        Some(p) => p,
        None => match state.list_recoveries()?.into_iter().next() {
            Some(p) => p,
            None => bail!("No recovery records found"),
        },
    };
    let recovery = state.load_recovery(&path)?;
    let wallet = open_wallet(config, FundingPropagation::AwaitIndexer(PollSchedule::default()))?;
    let mnemonic = read_mnemonic()?;

    let result = wallet
        .resume_issuance(&mnemonic, &recovery)
        .await
        .context("Resuming issuance failed")?;
    state.remove_recovery(&path)?;
    track(
        config,
        PendingTransaction::new(result.txid, PendingKind::Issue, recovery.amount, Some(result.color_id)),
    );
    remember_issued(
        config,
        IssuedToken::new(&result, recovery.metadata.clone(), recovery.amount),
    );
    out.emit(&result, || print_issued(&result))
}

async fn cmd_status(args: StatusArgs, config: &Config, out: &Output) -> Result<()> {
    let txid: Txid = args
        .txid
        .trim()
        .parse()
        .with_context(|| format!("Invalid txid: {}", args.txid))?;
    let wallet = open_wallet(config, FundingPropagation::Immediate)?;
    let status = if args.wait {
        wallet
            .wait_for_confirmation(&txid, &PollSchedule::default())
            .await
    } else {
        wallet.transaction_status(&txid).await
    }
    .context("Status query failed")?;

    out.emit(&status, || {
        println!("TxID: {txid}");
        match status.block_height {
            Some(height) if status.confirmed => println!("Confirmed at height {height}"),
            _ if status.confirmed => println!("Confirmed"),
            _ => println!("Unconfirmed"),
        }
    })
}

async fn cmd_pending(config: &Config, out: &Output) -> Result<()> {
    let state = StateDir::new(config.network_state_dir());
    let mut pending = state.load_pending()?;
    let wallet = open_wallet(config, FundingPropagation::Immediate)?;
    let confirmed = pending.prune_confirmed(wallet.source()).await;
    state.save_pending(&pending)?;

    out.emit(&pending, || {
        for entry in &confirmed {
            println!("confirmed  {}", entry.txid);
        }
        if pending.is_empty() {
            println!("No pending transactions.");
            return;
        }
        for entry in pending.iter() {
            println!(
                "pending    {}  {:?}  {}  {}",
                entry.txid,
                entry.kind,
                entry.amount,
                entry.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    })
}

fn cmd_tokens(config: &Config, out: &Output) -> Result<()> {
    let issued = StateDir::new(config.network_state_dir()).load_issued()?;
    out.emit(&issued, || {
        if issued.is_empty() {
            println!("No issued tokens.");
            return;
        }
        for token in &issued {
            println!(
                "{}  {} ({})  {}  {}",
                token.color_id,
                token.metadata.name,
                token.metadata.symbol,
                format_amount(token.amount, token.metadata.decimals()),
                token.issued_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    })
}
