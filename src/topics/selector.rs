//! Deterministic topic selection
//!
//! `select_topic` is a pure function of its inputs. The raw pick is a SHA-256
//! seed over `site | ISO week | day | offset` reduced modulo the candidate
//! count. A pick that duplicates a previous topic of the site is skipped by
//! probing forward (wrapping) to the next unused candidate. When every
//! candidate is a duplicate the raw pick is returned and the repeat is logged.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::models::Topic;

/// Minimum share of the smaller keyword set that must overlap for two topics
/// to count as duplicates
pub const OVERLAP_THRESHOLD: f64 = 0.5;

/// Offsets for the default sites. Distinct primes keep sites from landing on
/// the same raw index on the same day.
const DEFAULT_OFFSETS: &[(&str, u64)] = &[
    ("unpre", 101),
    ("untab", 211),
    ("skewese", 307),
    ("tistory", 401),
];

/// Raw hashed index for a coordinate
pub fn seed_index(
    site: &str,
    week_start: NaiveDate,
    day_of_week: u8,
    offset: u64,
    candidate_count: usize,
) -> usize {
    if candidate_count == 0 {
        return 0;
    }
    let iso = week_start.iso_week();
    let key = format!(
        "{site}|{}-W{:02}|{day_of_week}|{offset}",
        iso.year(),
        iso.week()
    );
    let digest = Sha256::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % candidate_count as u64) as usize
}

fn keyword_set(keywords: &[String]) -> HashSet<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Overlap ratio relative to the smaller keyword set. Empty sets never overlap.
pub fn keyword_overlap(a: &[String], b: &[String]) -> f64 {
    let a = keyword_set(a);
    let b = keyword_set(b);
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / smaller as f64
}

/// Whether `candidate` repeats any of `previous`
pub fn is_duplicate(candidate: &Topic, previous: &[Topic]) -> bool {
    let title = candidate.title.trim().to_lowercase();
    previous.iter().any(|p| {
        p.title.trim().to_lowercase() == title
            || keyword_overlap(&candidate.keywords, &p.keywords) >= OVERLAP_THRESHOLD
    })
}

/// Topic used when a site/category has no candidates
pub fn fallback_topic(category: &str) -> Topic {
    let label = category.replace('_', " ");
    Topic::new(format!("Notes on {label}"), &[category])
}

/// Per-site offsets plus the selection entry point
#[derive(Debug, Clone)]
pub struct TopicSelector {
    offsets: HashMap<String, u64>,
}

impl Default for TopicSelector {
    fn default() -> Self {
        Self {
            offsets: DEFAULT_OFFSETS
                .iter()
                .map(|(site, offset)| (site.to_string(), *offset))
                .collect(),
        }
    }
}

impl TopicSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, site: impl Into<String>, offset: u64) -> Self {
        self.offsets.insert(site.into(), offset);
        self
    }

    /// Configured offset, or one derived from the site name
    pub fn offset_for(&self, site: &str) -> u64 {
        if let Some(offset) = self.offsets.get(site) {
            return *offset;
        }
        let digest = Sha256::digest(site.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head) % 997
    }

    /// Pick the topic for one slot
    pub fn select_topic(
        &self,
        site: &str,
        week_start: NaiveDate,
        day_of_week: u8,
        category: &str,
        candidates: &[Topic],
        already_published: &[Topic],
    ) -> Topic {
        if candidates.is_empty() {
            info!(site, category, "No candidates, using fallback topic");
            return fallback_topic(category);
        }

        let offset = self.offset_for(site);
        let start = seed_index(site, week_start, day_of_week, offset, candidates.len());

        for step in 0..candidates.len() {
            let index = (start + step) % candidates.len();
            let candidate = &candidates[index];
            if !is_duplicate(candidate, already_published) {
                if step > 0 {
                    info!(
                        site,
                        category,
                        raw_index = start,
                        chosen_index = index,
                        "Duplicate topic collision resolved by probing"
                    );
                }
                return candidate.clone();
            }
        }

        info!(
            site,
            category,
            topic = %candidates[start].title,
            "All candidates already used, accepting repeat"
        );
        candidates[start].clone()
    }
}
