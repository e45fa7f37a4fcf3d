//! Scan for incoming stealth payments

use anyhow::Result;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use wave_stealth::{ClaimStatus, ScanReport};

use super::{format_sol, CliContext};
use crate::config::{key_cache, load_stealth_keys};

pub async fn run(ctx: &CliContext, watch: bool) -> Result<()> {
    let keys = load_stealth_keys(&key_cache()?)?;
    let scanner = if watch {
        ctx.watching_scanner(&keys)?
    } else {
        ctx.scanner(&keys)?
    };
    let rpc = ctx.rpc();

    println!(
        "{}",
        format!("Scanning announcements from program {}...", scanner.program_id()).cyan()
    );

    if !watch {
        let report = scanner.scan_chain(&*rpc).await?;
        print_report(&report);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let (mut reports, handle) = scanner.watch(rpc, ctx.config.scan_interval(), cancel.clone());
    println!("{}", "Watching for payments (Ctrl-C to stop)...".dimmed());

    let mut seen = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            report = reports.recv() => match report {
                Some(report) => {
                    if report.claims.len() != seen {
                        seen = report.claims.len();
                        print_report(&report);
                    }
                }
                None => break,
            },
        }
    }

    cancel.cancel();
    handle.await?;
    Ok(())
}

fn print_report(report: &ScanReport) {
    let stats = &report.stats;
    println!();
    println!(
        "{}",
        format!(
            "Scanned {} announcements ({} filtered by view tag)",
            stats.scanned, stats.tag_rejected
        )
        .dimmed()
    );
    if stats.malformed > 0 {
        println!("{}", format!("Skipped {} malformed accounts", stats.malformed).dimmed());
    }
    if stats.balance_unavailable > 0 {
        println!(
            "{}",
            format!("Could not read {} vault balance(s); they will be retried", stats.balance_unavailable).yellow()
        );
    }
    println!();

    if report.claims.is_empty() {
        println!("{}", "No claimable payments found.".yellow());
        return;
    }

    println!(
        "{}",
        format!("Found {} payment(s):", report.claims.len()).green().bold()
    );
    println!();

    for (i, claim) in report.claims.iter().enumerate() {
        let status = match claim.status {
            ClaimStatus::Pending => "AVAILABLE".green(),
            ClaimStatus::Claiming => "CLAIMING".yellow(),
            ClaimStatus::Claimed => "CLAIMED".dimmed(),
            ClaimStatus::Failed => "FAILED".red(),
        };
        println!("{}. {} [{}]", i + 1, "Payment".yellow(), status);
        println!("   Vault:        {}", claim.vault);
        println!("   Announcement: {}", claim.announcement);
        println!("   Amount:       {}", format_sol(claim.amount));
        println!();
    }

    println!(
        "{}",
        format!("Total available: {}", format_sol(report.total())).green().bold()
    );
    println!();
    println!(
        "{}",
        "Use 'wavestealth claim' to move funds to your wallet.".dimmed()
    );
}
