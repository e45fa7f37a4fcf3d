//! Pay a stealth meta-address

use anyhow::{bail, Context, Result};
use colored::Colorize;
use solana_sdk::pubkey::Pubkey;
use wave_stealth::registry::RegistryClient;
use wave_stealth::{Lamports, PaymentState, Recovery, SendMode, StealthMetaAddress};

use super::{format_sol, CliContext};

pub async fn run(ctx: &CliContext, recipient: &str, amount: &str, private: bool) -> Result<()> {
    let amount = Lamports::from_sol(amount).context("Invalid amount")?;
    let mode = if private { SendMode::Private } else { SendMode::Direct };
    let meta = resolve_recipient(ctx, recipient).await?;

    let wallet = ctx.wallet()?;
    let orchestrator = ctx.orchestrator()?;

    println!(
        "{}",
        format!("Sending {} ({:?})...", format_sol(amount), mode).cyan()
    );
    let session = orchestrator.send(&wallet, &meta, amount, mode).await?;

    println!();
    match session.state() {
        PaymentState::Failed => {
            println!("{}", "Payment did not complete".red().bold());
            if let Some(reason) = &session.failure {
                println!("Reason: {}", reason);
            }
        }
        state => {
            println!("{}", "Payment sent!".green().bold());
            println!("State:        {}", state);
        }
    }
    println!();
    println!("Amount:       {}", format_sol(session.amount));
    println!("Vault:        {}", session.vault);
    println!("Announcement: {}", session.announcement);
    println!("Nonce:        {}", hex::encode(session.nonce));
    for (label, signature) in [
        ("Announce tx", session.announce_signature),
        ("Deposit tx", session.deposit_signature),
        ("Mix tx", session.mix_signature),
    ] {
        if let Some(signature) = signature {
            println!("{:<13} {}", format!("{}:", label), signature);
        }
    }

    if let Some(Recovery::Undelegate { nonce }) = session.recovery {
        println!();
        println!(
            "{}",
            "The relayer did not execute the transfer. Your deposit is still in the pool.".yellow()
        );
        println!(
            "Recover it with: {}",
            format!("wavestealth undelegate --nonce {}", hex::encode(nonce)).bold()
        );
    } else {
        println!();
        println!(
            "{}",
            "The recipient can find this payment by scanning with their view key.".dimmed()
        );
    }

    Ok(())
}

/// A `wavestealth:` meta-address, or a wallet address looked up in the registry
async fn resolve_recipient(ctx: &CliContext, input: &str) -> Result<StealthMetaAddress> {
    if input.starts_with("wavestealth:") {
        return input.parse().context("Invalid meta-address");
    }
    if let Ok(meta) = input.parse::<StealthMetaAddress>() {
        return Ok(meta);
    }

    let owner: Pubkey = match input.parse() {
        Ok(owner) => owner,
        Err(_) => bail!("Recipient is neither a meta-address nor a wallet address: {}", input),
    };
    let rpc = ctx.rpc();
    let registry = RegistryClient::new(&*rpc, ctx.program_id()?, ctx.config.confirm_timeout());
    registry
        .lookup(&owner)
        .await?
        .with_context(|| format!("{} has not registered a meta-address", owner))
}
