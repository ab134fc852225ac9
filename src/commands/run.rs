use anyhow::{Context, Result};
use chrono::NaiveDate;

use dailypress::orchestrator::{RunRequest, RunSummary, RunTrigger};
use dailypress::scheduler::RecoveryPass;
use dailypress::storage::ScheduleRepository;

use super::Runtime;

/// Run the orchestrator once for a date, optionally limited to some sites
pub async fn run(rt: &Runtime, date: Option<NaiveDate>, sites: Vec<String>) -> Result<()> {
    let date = rt.date_or_today(date);

    let request = if sites.is_empty() {
        RunRequest::full(date, RunTrigger::Manual)
    } else {
        let keys = rt
            .store
            .get_slots_for_day(date)
            .context("Failed to load slots")?
            .into_iter()
            .filter(|s| sites.contains(&s.key.site))
            .map(|s| s.key)
            .collect();
        RunRequest::restricted(date, RunTrigger::Manual, keys)
    };

    println!("Publishing run for {date}");
    println!("========================");

    let summary = rt.orchestrator.run(request).await?;
    print_summary(&summary);

    if let Some(reason) = summary.aborted {
        anyhow::bail!("run aborted: {reason}");
    }
    Ok(())
}

/// Reclassify stalled slots and retry everything not yet published
pub async fn recover(rt: &Runtime, date: Option<NaiveDate>) -> Result<()> {
    let date = rt.date_or_today(date);
    let pass = RecoveryPass::new(rt.orchestrator.clone());

    println!("Recovery pass for {date}");
    println!("========================");

    let report = pass.run(date).await?;
    println!("Stalled slots reclassified: {}", report.reclassified.len());
    for key in &report.reclassified {
        println!("  {key}");
    }

    match report.summary {
        Some(summary) => print_summary(&summary),
        None => println!("Nothing to retry, every slot is published"),
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for result in &summary.results {
        println!(
            "  [{:<9}] {} {}",
            result.status.as_str(),
            result.key,
            result
                .url
                .as_deref()
                .or(result.error.as_deref())
                .unwrap_or_default()
        );
    }

    println!("\nRun Summary");
    println!("===========");
    println!("Run id: {}", summary.run_id);
    println!("Published: {}", summary.published);
    println!("Failed: {}", summary.failed);
    println!("Skipped: {}", summary.skipped);
    if let Some(reason) = &summary.aborted {
        println!("Aborted: {reason}");
    }
}
