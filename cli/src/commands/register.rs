//! Publish and look up meta-addresses in the on-chain registry

use anyhow::{Context, Result};
use colored::Colorize;
use solana_sdk::{pubkey::Pubkey, signer::Signer};
use wave_stealth::registry::RegistryClient;
use wave_stealth::rpc::ChainRpc;

use super::{format_sol, CliContext};
use crate::config::{key_cache, load_stealth_keys};

pub async fn run(ctx: &CliContext) -> Result<()> {
    println!("{}", "Registering stealth meta-address on-chain...".cyan());

    let keys = load_stealth_keys(&key_cache()?)?;
    let meta = keys.meta_address();
    let wallet = ctx.wallet()?;
    let rpc = ctx.rpc();

    let balance = rpc.get_balance(&wallet.keypair().pubkey()).await?;
    println!("Wallet balance: {}", format_sol(balance));
    if balance.get() < 10_000_000 {
        println!(
            "{}",
            "Warning: Low balance. You need SOL to pay for rent and fees.".yellow()
        );
    }

    let registry = RegistryClient::new(&*rpc, ctx.program_id()?, ctx.config.confirm_timeout());
    let signatures = registry
        .register(&wallet, &meta)
        .await
        .context("Registration failed")?;

    println!();
    if signatures.is_empty() {
        println!("{}", "Meta-address is already registered.".green());
    } else {
        println!("{}", "Meta-address registered!".green().bold());
        println!();
        for signature in &signatures {
            println!("Transaction: {}", signature);
        }
    }
    println!();
    println!("Owner:        {}", wallet.keypair().pubkey());
    println!("Meta-address: {}", meta);
    println!();
    println!(
        "{}",
        "Senders can now pay you with 'wavestealth send --to <your wallet address>'.".dimmed()
    );

    Ok(())
}

pub async fn lookup(ctx: &CliContext, owner: &str) -> Result<()> {
    let owner: Pubkey = owner.parse().context("Invalid wallet address")?;
    let rpc = ctx.rpc();
    let registry = RegistryClient::new(&*rpc, ctx.program_id()?, ctx.config.confirm_timeout());

    match registry.lookup(&owner).await? {
        Some(meta) => {
            println!("{}", meta);
            if let Some(kem) = &meta.kem_pubkey {
                println!("{}", format!("KEM pubkey: {} bytes", kem.len()).dimmed());
            }
        }
        None => println!("{}", format!("No meta-address registered for {}", owner).yellow()),
    }

    Ok(())
}
