//! Display stealth meta-address

use anyhow::Result;
use colored::Colorize;

use crate::config::{key_cache, load_stealth_keys};

pub fn run() -> Result<()> {
    let keys = load_stealth_keys(&key_cache()?)?;
    let meta = keys.meta_address();

    println!();
    println!("{}", "Your Stealth Meta-Address".yellow().bold());
    println!();
    println!("{}", meta);
    println!();
    println!("{}:", "Components".dimmed());
    println!("  View pubkey:  {}", hex::encode(meta.view_pubkey));
    println!("  Spend pubkey: {}", hex::encode(meta.spend_pubkey));
    if let Some(kem) = &meta.kem_pubkey {
        println!("  KEM pubkey:   {} bytes", kem.len());
    }
    println!();
    println!(
        "{}",
        "Share the meta-address above to receive private payments.".dimmed()
    );

    Ok(())
}
