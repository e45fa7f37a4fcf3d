//! Claim received payments

use anyhow::{bail, Context, Result};
use colored::Colorize;
use solana_sdk::{pubkey::Pubkey, signer::Signer};
use wave_stealth::{ClaimMode, ClaimOutcome, ClaimStatus, KeypairWallet, Lamports};

use super::{format_sol, CliContext};
use crate::config::{key_cache, load_stealth_keys};

pub async fn run(ctx: &CliContext, vault: Option<&str>, to: Option<&str>, relayed: bool) -> Result<()> {
    let keys = load_stealth_keys(&key_cache()?)?;
    let only_vault: Option<Pubkey> = vault.map(str::parse::<Pubkey>).transpose().context("Invalid vault address")?;

    // A relayed claim to an explicit destination never touches the local wallet
    let wallet: Option<KeypairWallet> = if relayed && to.is_some() {
        None
    } else {
        Some(ctx.wallet()?)
    };
    let destination: Pubkey = match (to, &wallet) {
        (Some(to), _) => to.parse().context("Invalid destination address")?,
        (None, Some(wallet)) => wallet.keypair().pubkey(),
        (None, None) => bail!("No destination: pass --to or --keypair"),
    };

    println!("{}", "Scanning for claimable payments...".cyan());
    let report = ctx.scanner(&keys)?.scan_chain(&*ctx.rpc()).await?;
    let mut pending: Vec<_> = report
        .claims
        .into_iter()
        .filter(|claim| claim.status == ClaimStatus::Pending)
        .filter(|claim| only_vault.map_or(true, |v| v == claim.vault))
        .collect();

    if pending.is_empty() {
        match only_vault {
            Some(v) => println!("{}", format!("Vault {} has nothing to claim.", v).yellow()),
            None => println!("{}", "No claimable payments found.".yellow()),
        }
        return Ok(());
    }

    let orchestrator = ctx.orchestrator()?;
    println!(
        "Claiming {} payment(s) to {}{}",
        pending.len(),
        destination,
        if relayed { " via relayer" } else { "" }
    );
    println!();

    let mut total = Lamports::ZERO;
    let mut failures = 0usize;
    for claim in pending.iter_mut() {
        let mode = match &wallet {
            Some(wallet) if !relayed => ClaimMode::Direct(wallet),
            _ => ClaimMode::Relayed,
        };

        match orchestrator.claim(&keys, claim, &destination, mode).await {
            Ok(ClaimOutcome::Claimed { signature, amount }) => {
                total = total + amount;
                println!("{} {} ({})", "✓".green(), claim.vault, format_sol(amount));
                println!("  Transaction: {}", signature);
            }
            Ok(ClaimOutcome::AlreadyClaimed) => {
                println!("{} {} already claimed", "-".dimmed(), claim.vault);
            }
            Err(e) => {
                failures += 1;
                println!("{} {}: {}", "✗".red(), claim.vault, e);
            }
        }
    }

    println!();
    println!("{}", format!("Claimed {} total", format_sol(total)).green().bold());
    if failures > 0 {
        bail!("{} claim(s) failed; run 'wavestealth claim' again to retry", failures);
    }

    Ok(())
}
