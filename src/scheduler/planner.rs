//! Weekly slot planning
//!
//! Fills a week's `(day, site, category)` grid through the topic selector.
//! Topics already published by a site, and topics picked earlier in the same
//! week, count as "previous" for duplicate avoidance.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use crate::config::Config;
use crate::models::{week_start_of, ScheduleSlot, SlotKey, Topic};
use crate::storage::{ScheduleRepository, SharedStore};
use crate::topics::{TopicPool, TopicSelector};

use super::error::{SchedulerError, SchedulerResult};

/// Outcome of populating a week
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub created: usize,
    pub existing: usize,
}

pub struct WeekPlanner {
    store: SharedStore,
    pool: TopicPool,
    selector: TopicSelector,
    sites: Vec<String>,
}

impl WeekPlanner {
    pub fn new(store: SharedStore, pool: TopicPool, selector: TopicSelector, sites: Vec<String>) -> Self {
        Self {
            store,
            pool,
            selector,
            sites,
        }
    }

    pub fn from_config(config: &Config, store: SharedStore) -> Self {
        let selector = config
            .sites
            .iter()
            .fold(TopicSelector::new(), |selector, site| match site.seed_offset {
                Some(offset) => selector.with_offset(site.name(), offset),
                None => selector,
            });

        Self::new(
            store,
            TopicPool::from_sites(&config.sites),
            selector,
            config.site_order(),
        )
    }

    pub fn pool(&self) -> &TopicPool {
        &self.pool
    }

    /// Build every slot of the week without touching slots in `skip`
    fn build_week(
        &self,
        week_start: NaiveDate,
        skip: &HashSet<SlotKey>,
        existing: &[ScheduleSlot],
    ) -> SchedulerResult<Vec<ScheduleSlot>> {
        let mut slots = Vec::new();

        for site in &self.sites {
            let mut previous: Vec<Topic> = self
                .store
                .published_topics(site)
                .map_err(|e| SchedulerError::store("published_topics", e))?;
            previous.extend(
                existing
                    .iter()
                    .filter(|s| &s.key.site == site)
                    .map(ScheduleSlot::as_topic),
            );

            for day in 0..7u8 {
                for category in self.pool.categories(site) {
                    let key = SlotKey::new(week_start, day, site.as_str(), category.as_str());
                    if skip.contains(&key) {
                        continue;
                    }
                    let topic = self.selector.select_topic(
                        site,
                        week_start,
                        day,
                        &category,
                        self.pool.candidates(site, &category),
                        &previous,
                    );
                    slots.push(ScheduleSlot::planned(key, &topic));
                    previous.push(topic);
                }
            }
        }

        Ok(slots)
    }

    /// Insert a planned slot for every coordinate not already present
    pub fn populate_week(&self, week_start: NaiveDate) -> SchedulerResult<PlanReport> {
        let week_start = week_start_of(week_start);
        let existing = self
            .store
            .get_week(week_start)
            .map_err(|e| SchedulerError::store("get_week", e))?;
        let present: HashSet<SlotKey> = existing.iter().map(|s| s.key.clone()).collect();

        let slots = self.build_week(week_start, &present, &existing)?;
        for slot in &slots {
            self.store
                .upsert_slot(slot)
                .map_err(|e| SchedulerError::planning_failed(week_start, e.to_string()))?;
        }

        let report = PlanReport {
            created: slots.len(),
            existing: present.len(),
        };
        info!(%week_start, created = report.created, existing = report.existing, "Week populated");
        Ok(report)
    }

    /// Replace the whole week with a fresh plan in one transaction
    pub fn recreate_week(&self, week_start: NaiveDate) -> SchedulerResult<usize> {
        let week_start = week_start_of(week_start);
        let slots = self.build_week(week_start, &HashSet::new(), &[])?;
        self.store
            .recreate_week(week_start, &slots)
            .map_err(|e| SchedulerError::planning_failed(week_start, e.to_string()))
    }
}
