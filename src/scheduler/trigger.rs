//! Trigger times
//!
//! Three wall-clock triggers in a fixed UTC offset (default +09:00 KST):
//! the nightly run, the recovery pass `recovery_offset_hours` later, and the
//! weekly pre-population of next week's slots. All arithmetic takes `now` as
//! an argument so it can be tested without a clock.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::week_start_of;

use super::error::{SchedulerError, SchedulerResult};

// ============================================================================
// Trigger Configuration
// ============================================================================

/// Configuration for the daemon's triggers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Nightly run time (24h format, e.g. "03:00")
    pub nightly_time: String,

    /// Hours after the nightly run for the recovery pass; a slot still
    /// `generating` by then counts as stalled
    pub recovery_offset_hours: u32,

    /// Day of the weekly pre-population (e.g. "sun")
    pub weekly_day: String,

    pub weekly_time: String,

    /// Offset of the trigger clock from UTC, in minutes
    pub utc_offset_minutes: i32,

    /// Populate the current and next week when the daemon starts
    pub run_on_startup: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            nightly_time: "03:00".to_string(),
            recovery_offset_hours: 6,
            weekly_day: "sun".to_string(),
            weekly_time: "22:00".to_string(),
            utc_offset_minutes: 9 * 60,
            run_on_startup: false,
        }
    }
}

fn parse_time(field: &str, value: &str) -> SchedulerResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        SchedulerError::trigger_config(field, format!("Invalid time format '{value}'. Expected HH:MM"))
    })
}

impl TriggerConfig {
    /// Create a new config builder
    pub fn builder() -> TriggerConfigBuilder {
        TriggerConfigBuilder::default()
    }

    /// Load from `DAILYPRESS_*` variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            nightly_time: std::env::var("DAILYPRESS_NIGHTLY_TIME").unwrap_or(defaults.nightly_time),
            recovery_offset_hours: std::env::var("DAILYPRESS_RECOVERY_OFFSET_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.recovery_offset_hours),
            weekly_day: std::env::var("DAILYPRESS_WEEKLY_DAY").unwrap_or(defaults.weekly_day),
            weekly_time: std::env::var("DAILYPRESS_WEEKLY_TIME").unwrap_or(defaults.weekly_time),
            utc_offset_minutes: std::env::var("DAILYPRESS_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.utc_offset_minutes),
            run_on_startup: std::env::var("DAILYPRESS_RUN_ON_STARTUP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.run_on_startup),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        self.nightly()?;
        self.weekly()?;
        self.weekday()?;
        self.offset()?;

        if !(1..=23).contains(&self.recovery_offset_hours) {
            return Err(SchedulerError::trigger_config(
                "recovery_offset_hours",
                format!("{} is outside 1-23", self.recovery_offset_hours),
            ));
        }

        Ok(())
    }

    pub fn nightly(&self) -> SchedulerResult<NaiveTime> {
        parse_time("nightly_time", &self.nightly_time)
    }

    pub fn weekly(&self) -> SchedulerResult<NaiveTime> {
        parse_time("weekly_time", &self.weekly_time)
    }

    pub fn weekday(&self) -> SchedulerResult<Weekday> {
        self.weekly_day.parse::<Weekday>().map_err(|_| {
            SchedulerError::trigger_config("weekly_day", format!("Unknown weekday '{}'", self.weekly_day))
        })
    }

    pub fn offset(&self) -> SchedulerResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            SchedulerError::trigger_config(
                "utc_offset_minutes",
                format!("{} is not a valid UTC offset", self.utc_offset_minutes),
            )
        })
    }

    /// Delay between the nightly and the recovery trigger
    pub fn recovery_offset(&self) -> Duration {
        Duration::hours(i64::from(self.recovery_offset_hours))
    }

    /// Calendar date at `now` in the trigger clock
    pub fn local_date(&self, now: DateTime<Utc>) -> SchedulerResult<NaiveDate> {
        Ok(now.with_timezone(&self.offset()?).date_naive())
    }
}

/// Builder for TriggerConfig
#[derive(Debug, Default)]
pub struct TriggerConfigBuilder {
    nightly_time: Option<String>,
    recovery_offset_hours: Option<u32>,
    weekly_day: Option<String>,
    weekly_time: Option<String>,
    utc_offset_minutes: Option<i32>,
    run_on_startup: Option<bool>,
}

impl TriggerConfigBuilder {
    pub fn nightly_time(mut self, time: impl Into<String>) -> Self {
        self.nightly_time = Some(time.into());
        self
    }

    pub fn recovery_offset_hours(mut self, hours: u32) -> Self {
        self.recovery_offset_hours = Some(hours);
        self
    }

    pub fn weekly(mut self, day: impl Into<String>, time: impl Into<String>) -> Self {
        self.weekly_day = Some(day.into());
        self.weekly_time = Some(time.into());
        self
    }

    pub fn utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = Some(minutes);
        self
    }

    pub fn run_on_startup(mut self, value: bool) -> Self {
        self.run_on_startup = Some(value);
        self
    }

    /// Build the config
    pub fn build(self) -> SchedulerResult<TriggerConfig> {
        let defaults = TriggerConfig::default();
        let config = TriggerConfig {
            nightly_time: self.nightly_time.unwrap_or(defaults.nightly_time),
            recovery_offset_hours: self
                .recovery_offset_hours
                .unwrap_or(defaults.recovery_offset_hours),
            weekly_day: self.weekly_day.unwrap_or(defaults.weekly_day),
            weekly_time: self.weekly_time.unwrap_or(defaults.weekly_time),
            utc_offset_minutes: self.utc_offset_minutes.unwrap_or(defaults.utc_offset_minutes),
            run_on_startup: self.run_on_startup.unwrap_or(defaults.run_on_startup),
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Trigger arithmetic
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Nightly,
    Recovery,
    Weekly,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 3] = [Self::Nightly, Self::Recovery, Self::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nightly => "nightly",
            Self::Recovery => "recovery",
            Self::Weekly => "weekly",
        }
    }
}

/// Computes when each trigger fires next
#[derive(Debug, Clone)]
pub struct TriggerClock {
    offset: FixedOffset,
    nightly: NaiveTime,
    recovery: NaiveTime,
    recovery_offset: Duration,
    weekly_day: Weekday,
    weekly_time: NaiveTime,
}

impl TriggerClock {
    pub fn new(config: &TriggerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        let nightly = config.nightly()?;
        let recovery_offset = config.recovery_offset();
        let (recovery, _) = nightly.overflowing_add_signed(recovery_offset);

        Ok(Self {
            offset: config.offset()?,
            nightly,
            recovery,
            recovery_offset,
            weekly_day: config.weekday()?,
            weekly_time: config.weekly()?,
        })
    }

    fn at(&self, date: NaiveDate, time: NaiveTime) -> SchedulerResult<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| SchedulerError::trigger_config("time", format!("{date} {time} is ambiguous")))
    }

    /// First instant strictly after `now` at local `time` on a day accepted by `day_ok`
    fn next_matching(
        &self,
        now: DateTime<Utc>,
        time: NaiveTime,
        day_ok: impl Fn(NaiveDate) -> bool,
    ) -> SchedulerResult<DateTime<Utc>> {
        let today = now.with_timezone(&self.offset).date_naive();
        for days in 0..=7 {
            let date = today + Duration::days(days);
            if !day_ok(date) {
                continue;
            }
            let candidate = self.at(date, time)?;
            if candidate > now {
                return Ok(candidate);
            }
        }
        Err(SchedulerError::trigger_config("time", "no fire time within a week"))
    }

    pub fn next_fire(&self, kind: TriggerKind, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
        match kind {
            TriggerKind::Nightly => self.next_matching(now, self.nightly, |_| true),
            TriggerKind::Recovery => self.next_matching(now, self.recovery, |_| true),
            TriggerKind::Weekly => {
                let day = self.weekly_day;
                self.next_matching(now, self.weekly_time, move |d| d.weekday() == day)
            }
        }
    }

    /// Nearest upcoming trigger
    pub fn next_trigger(&self, now: DateTime<Utc>) -> SchedulerResult<(TriggerKind, DateTime<Utc>)> {
        let mut best: Option<(TriggerKind, DateTime<Utc>)> = None;
        for kind in TriggerKind::ALL {
            let at = self.next_fire(kind, now)?;
            match best {
                Some((_, current)) if current <= at => {}
                _ => best = Some((kind, at)),
            }
        }
        best.ok_or_else(|| SchedulerError::trigger_config("triggers", "none configured"))
    }

    /// Nearest trigger after both `now` and the last fired instant, so an
    /// early timer wake-up cannot fire the same trigger twice
    pub fn next_trigger_after(
        &self,
        now: DateTime<Utc>,
        last_fired: Option<DateTime<Utc>>,
    ) -> SchedulerResult<(TriggerKind, DateTime<Utc>)> {
        let from = match last_fired {
            Some(fired) if fired > now => fired,
            _ => now,
        };
        self.next_trigger(from)
    }

    /// Date a job fired at `fired_at` works on: today for the nightly run,
    /// the nightly run's date for recovery, next week's Monday for weekly
    pub fn job_date(&self, kind: TriggerKind, fired_at: DateTime<Utc>) -> NaiveDate {
        let local = fired_at.with_timezone(&self.offset);
        match kind {
            TriggerKind::Nightly => local.date_naive(),
            TriggerKind::Recovery => (local - self.recovery_offset).date_naive(),
            TriggerKind::Weekly => week_start_of(local.date_naive()) + Duration::days(7),
        }
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }
}

// ============================================================================
// Status
// ============================================================================

/// Trigger status information
#[derive(Debug, Clone, Serialize)]
pub struct TriggerStatus {
    pub config: TriggerConfig,
    pub next_nightly: DateTime<Utc>,
    pub next_recovery: DateTime<Utc>,
    pub next_weekly: DateTime<Utc>,
}

impl TriggerStatus {
    pub fn at(config: &TriggerConfig, now: DateTime<Utc>) -> SchedulerResult<Self> {
        let clock = TriggerClock::new(config)?;
        Ok(Self {
            config: config.clone(),
            next_nightly: clock.next_fire(TriggerKind::Nightly, now)?,
            next_recovery: clock.next_fire(TriggerKind::Recovery, now)?,
            next_weekly: clock.next_fire(TriggerKind::Weekly, now)?,
        })
    }

    /// Format as display string
    pub fn display(&self) -> String {
        let mut output = String::from("Trigger Status\n");
        output.push_str(&format!("{:-<40}\n", ""));
        output.push_str(&format!("Nightly:  {} ({})\n", self.next_nightly, self.config.nightly_time));
        output.push_str(&format!(
            "Recovery: {} (+{}h)\n",
            self.next_recovery, self.config.recovery_offset_hours
        ));
        output.push_str(&format!(
            "Weekly:   {} ({} {})\n",
            self.next_weekly, self.config.weekly_day, self.config.weekly_time
        ));
        output
    }
}

// ============================================================================
// Tests
// ============================================================================
