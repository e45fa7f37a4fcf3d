//! Derive stealth keys from the wallet and cache them encrypted

use anyhow::{bail, Result};
use colored::Colorize;
use solana_sdk::signer::Signer;
use wave_stealth::{derive_keys, DeriveOptions};

use super::CliContext;
use crate::config::{key_cache, prompt_new_password};

pub async fn run(ctx: &CliContext, force: bool, hybrid: bool) -> Result<()> {
    let cache = key_cache()?;
    if cache.exists() && !force {
        bail!(
            "Stealth keys already exist at {}. Use --force to overwrite.",
            cache.path().display()
        );
    }

    let wallet = ctx.wallet()?;
    println!("{}", "Deriving stealth keys from wallet signature...".cyan());
    println!("Wallet: {}", wallet.keypair().pubkey());

    let keys = derive_keys(&wallet, DeriveOptions { with_hybrid: hybrid }).await?;

    println!();
    println!("{}", "Keys are encrypted at rest with a password.".dimmed());
    let password = prompt_new_password("New password: ")?;
    cache.save(&keys, &wallet.keypair().pubkey(), &password)?;

    println!();
    println!("{}", "Stealth keys ready".green().bold());
    println!();
    println!("Meta-address: {}", keys.meta_address().to_string().yellow());
    if hybrid {
        println!("KEM key:      {}", "ML-KEM-768 (registry only)".dimmed());
    }
    println!("Saved to:     {}", cache.path().display());
    println!();
    println!(
        "{}",
        "The same wallet always derives the same keys, so they can be re-created with 'init --force'.".dimmed()
    );
    println!("{}", "Next: 'wavestealth register' to publish your meta-address.".dimmed());

    Ok(())
}
