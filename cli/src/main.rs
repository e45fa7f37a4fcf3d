//! wavestealth - command line client for WaveSwap stealth payments

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::*;

#[derive(Parser)]
#[command(name = "wavestealth")]
#[command(version)]
#[command(about = "Private payments on Solana through one-time stealth vaults")]
#[command(long_about = r#"
wavestealth pays and receives SOL through stealth addresses.

Every payment lands in a fresh vault that only the recipient can link to
their meta-address. Private sends additionally pass through the mixing
pool so the sender is not linked to the vault either.

Quick Start:
  1. wavestealth init            Derive stealth keys from your wallet
  2. wavestealth register        Publish your meta-address on-chain
  3. wavestealth scan            Look for incoming payments
  4. wavestealth claim           Move received funds to a wallet
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Solana RPC URL (overrides config and WAVESTEALTH_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Privacy relayer URL (overrides config and WAVESTEALTH_RELAYER_URL)
    #[arg(long, global = true)]
    relayer_url: Option<String>,

    /// Path to the Solana keypair file
    #[arg(long, global = true)]
    keypair: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive stealth keys from your wallet and cache them encrypted
    Init {
        /// Overwrite an existing key cache
        #[arg(short, long)]
        force: bool,

        /// Also derive the post-quantum KEM key pair
        #[arg(long)]
        hybrid: bool,
    },

    /// Publish your meta-address in the on-chain registry
    Register,

    /// Look up the meta-address a wallet registered
    Lookup {
        /// Wallet address of the registry owner
        owner: String,
    },

    /// Show your stealth meta-address
    Address,

    /// Pay a meta-address (or a registered wallet)
    Send {
        /// Recipient meta-address (`wavestealth:...`) or registered wallet address
        #[arg(short, long)]
        to: String,

        /// Amount in SOL, e.g. 0.25
        #[arg(short, long)]
        amount: String,

        /// Route through the mixing pool and relayer
        #[arg(long)]
        private: bool,
    },

    /// Scan announcements for payments to you
    Scan {
        /// Keep scanning until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Claim received payments
    Claim {
        /// Only claim this vault (default: every pending payment)
        #[arg(long)]
        vault: Option<String>,

        /// Destination wallet (default: your keypair's address)
        #[arg(long)]
        to: Option<String>,

        /// Let the relayer submit and pay fees
        #[arg(long)]
        relayed: bool,
    },

    /// Refund a private payment the relayer never executed
    Undelegate {
        /// Payment nonce (hex), as printed by `send --private`
        #[arg(long)]
        nonce: String,
    },

    /// Show total claimable balance
    Balance,

    /// Export the view key (scan-only, no spending capability)
    ExportViewKey,

    /// Show configuration and key info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::new(cli.rpc_url, cli.relayer_url, cli.keypair)?;

    match cli.command {
        Commands::Init { force, hybrid } => init::run(&ctx, force, hybrid).await?,
        Commands::Register => register::run(&ctx).await?,
        Commands::Lookup { owner } => register::lookup(&ctx, &owner).await?,
        Commands::Address => address::run()?,
        Commands::Send { to, amount, private } => send::run(&ctx, &to, &amount, private).await?,
        Commands::Scan { watch } => scan::run(&ctx, watch).await?,
        Commands::Claim { vault, to, relayed } => {
            claim::run(&ctx, vault.as_deref(), to.as_deref(), relayed).await?
        }
        Commands::Undelegate { nonce } => undelegate::run(&ctx, &nonce).await?,
        Commands::Balance => balance::run(&ctx).await?,
        Commands::ExportViewKey => export_view_key::run()?,
        Commands::Info => info::run(&ctx).await?,
    }

    Ok(())
}
