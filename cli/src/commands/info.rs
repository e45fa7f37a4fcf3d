//! Show configuration and key info

use anyhow::Result;
use colored::Colorize;
use solana_sdk::signer::Signer;
use wave_stealth::rpc::ChainRpc;
use wave_stealth::ClientConfig;

use super::{format_sol, CliContext};
use crate::config::{default_keypair_path, key_cache, load_keypair};

pub async fn run(ctx: &CliContext) -> Result<()> {
    println!();
    println!("{}", "wavestealth Configuration".yellow().bold());
    println!();

    let cache = key_cache()?;
    println!("{}:", "Stealth Keys".cyan());
    if cache.exists() {
        println!("  {}", "CONFIGURED".green());
        if let Ok(owner) = cache.owner() {
            println!("  Derived from: {}", owner);
        }
        println!("  {}", "Run 'wavestealth address' to show the meta-address".dimmed());
    } else {
        println!("  {}", "NOT CONFIGURED".red());
        println!("  Run 'wavestealth init' to derive keys");
    }
    println!();

    println!("{}:", "Solana Wallet".cyan());
    match load_keypair(ctx.keypair_path.as_deref()) {
        Ok(keypair) => {
            println!("  Address: {}", keypair.pubkey());
            if let Ok(balance) = ctx.rpc().get_balance(&keypair.pubkey()).await {
                println!("  Balance: {}", format_sol(balance));
            }
        }
        Err(_) => {
            println!("  {}", "NOT CONFIGURED".red());
            println!("  Run 'solana-keygen new' to create a wallet");
        }
    }
    println!();

    println!("{}:", "Endpoints".cyan());
    println!("  RPC:     {}", ctx.config.rpc_url);
    match &ctx.config.relayer_url {
        Some(url) => println!("  Relayer: {}", url),
        None => println!("  Relayer: {}", "not set (private sends and relayed claims disabled)".dimmed()),
    }
    println!("  Program: {}", ctx.config.program_id);
    println!();

    println!("{}:", "File Locations".cyan());
    println!("  Keys:   {}", cache.path().display());
    if let Ok(path) = ClientConfig::default_path() {
        println!("  Config: {}", path.display());
    }
    let wallet_path = match &ctx.keypair_path {
        Some(path) => Some(path.clone()),
        None => default_keypair_path().ok(),
    };
    if let Some(path) = wallet_path {
        println!("  Wallet: {}", path.display());
    }

    Ok(())
}
