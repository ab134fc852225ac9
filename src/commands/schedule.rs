use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};

use dailypress::models::{week_start_of, SlotKey, SlotStatus};
use dailypress::scheduler::TriggerStatus;
use dailypress::storage::{AttemptRepository, ScheduleRepository};

use super::Runtime;

/// Populate the week containing `date`; `next` shifts to the following week
pub fn plan_week(rt: &Runtime, date: Option<NaiveDate>, next: bool) -> Result<()> {
    let mut week = week_start_of(rt.date_or_today(date));
    if next {
        week += Duration::days(7);
    }

    let report = rt.planner.populate_week(week)?;
    println!("Week of {week}");
    println!("  Created: {}", report.created);
    println!("  Already present: {}", report.existing);
    Ok(())
}

/// Throw away the week's slots and plan it again
pub fn recreate_week(rt: &Runtime, date: Option<NaiveDate>) -> Result<()> {
    let week = week_start_of(rt.date_or_today(date));
    let inserted = rt.planner.recreate_week(week)?;
    println!("Week of {week} recreated with {inserted} slots");
    Ok(())
}

/// Manual `failed -> planned` reset of one slot
pub fn reset_slot(rt: &Runtime, date: NaiveDate, site: &str, category: &str) -> Result<()> {
    let key = SlotKey::for_date(date, site, category);
    let slot = rt
        .store
        .reset_slot(&key)
        .with_context(|| format!("Failed to reset slot {key}"))?;
    println!("Slot {} is now {}", slot.key, slot.status.as_str());
    Ok(())
}

/// Print the day's slots, trigger times and recent attempts
pub fn status(rt: &Runtime, date: Option<NaiveDate>) -> Result<()> {
    let date = rt.date_or_today(date);
    let slots = rt.store.get_slots_for_day(date)?;

    println!("Schedule for {date}");
    println!("{:-<60}", "");
    if slots.is_empty() {
        println!("(no slots planned)");
    }
    for slot in &slots {
        println!(
            "{:<10} {:<14} {:<10} {}",
            slot.key.site,
            slot.key.category,
            slot.status.as_str(),
            slot.topic
        );
        match slot.status {
            SlotStatus::Published => {
                if let Some(url) = &slot.published_url {
                    println!("{:>36} {url}", "->");
                }
            }
            SlotStatus::Failed => {
                if let Some(error) = &slot.last_error {
                    println!("{:>36} {error}", "!!");
                }
            }
            _ => {}
        }
    }

    println!();
    print!("{}", TriggerStatus::at(&rt.config.scheduler, Utc::now())?.display());

    let attempts = rt.store.recent_attempts(None, 10)?;
    if !attempts.is_empty() {
        println!("\nRecent Attempts");
        println!("{:-<60}", "");
        for attempt in attempts {
            println!(
                "{} {:<10} {:<8} {}",
                attempt.published_at.format("%Y-%m-%d %H:%M"),
                attempt.site,
                attempt.status.as_str(),
                attempt
                    .url
                    .as_deref()
                    .or(attempt.error_message.as_deref())
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}
