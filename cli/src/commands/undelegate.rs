//! Refund an unexecuted private payment

use anyhow::{bail, Context, Result};
use colored::Colorize;

use super::CliContext;

pub async fn run(ctx: &CliContext, nonce: &str) -> Result<()> {
    let nonce = parse_nonce(nonce)?;
    let wallet = ctx.wallet()?;
    let orchestrator = ctx.orchestrator()?;

    println!("{}", "Refunding mixer deposit...".cyan());
    let signature = orchestrator
        .undelegate(&wallet, &nonce)
        .await
        .context("Undelegate failed")?;

    println!();
    println!("{}", "Deposit refunded".green().bold());
    println!("Transaction: {}", signature);

    Ok(())
}

fn parse_nonce(input: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(input.trim()).context("Nonce must be hex")?;
    match <[u8; 32]>::try_from(bytes.as_slice()) {
        Ok(nonce) => Ok(nonce),
        Err(_) => bail!("Nonce must be 32 bytes, got {}", bytes.len()),
    }
}
