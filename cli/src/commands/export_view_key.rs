//! Export view key (scan-only capability)

use anyhow::Result;
use colored::Colorize;

use crate::config::{key_cache, load_stealth_keys};

pub fn run() -> Result<()> {
    let keys = load_stealth_keys(&key_cache()?)?;

    println!();
    println!("{}", "View Key Export".yellow().bold());
    println!();
    println!(
        "{}",
        "The view key finds your payments WITHOUT being able to spend them.".dimmed()
    );
    println!(
        "{}",
        "Share it with accountants or auditors who need to see incoming funds.".dimmed()
    );
    println!();
    println!("{}:", "View Key (view secret + spend pubkey)".yellow());
    println!();
    println!("  {}", keys.viewing_key().export());
    println!();

    println!(
        "{}",
        "WARNING: Anyone with this key can see all your incoming payments!".red()
    );
    println!("{}", "         They CANNOT spend your funds.".green());

    Ok(())
}
