//! Show total claimable balance

use anyhow::Result;
use colored::Colorize;

use super::{format_sol, CliContext};
use crate::config::{key_cache, load_stealth_keys};

pub async fn run(ctx: &CliContext) -> Result<()> {
    println!("{}", "Calculating total stealth balance...".cyan());

    let keys = load_stealth_keys(&key_cache()?)?;
    let scanner = ctx.scanner(&keys)?;
    let report = scanner.scan_chain(&*ctx.rpc()).await?;

    println!();
    println!("{}", "Stealth Balance Summary".yellow().bold());
    println!();
    println!("Total:  {}", format_sol(report.total()).green());
    println!("Vaults: {} with balance", report.claims.len());
    println!();

    if !report.claims.is_empty() {
        println!(
            "{}",
            "Use 'wavestealth scan' to see individual vaults.".dimmed()
        );
    }

    Ok(())
}
