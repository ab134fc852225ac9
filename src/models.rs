//! Core data structures for the publishing pipeline
//!
//! A [`ScheduleSlot`] is the unit of scheduled work: one post for one site and
//! category on one day. Its [`SlotStatus`] moves through a closed lifecycle
//! enforced by [`SlotStatus::transition`].

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Slot coordinates
// ============================================================================

/// Monday of the ISO week containing `date`
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Unique coordinate of a schedule slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    /// Monday of the scheduled week
    pub week_start: NaiveDate,
    /// 0 = Monday ... 6 = Sunday
    pub day_of_week: u8,
    pub site: String,
    pub category: String,
}

impl SlotKey {
    pub fn new(
        week_start: NaiveDate,
        day_of_week: u8,
        site: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            week_start,
            day_of_week,
            site: site.into(),
            category: category.into(),
        }
    }

    /// Build the key for a calendar date
    pub fn for_date(date: NaiveDate, site: impl Into<String>, category: impl Into<String>) -> Self {
        Self::new(
            week_start_of(date),
            date.weekday().num_days_from_monday() as u8,
            site,
            category,
        )
    }

    /// Calendar date this slot is scheduled for
    pub fn date(&self) -> NaiveDate {
        self.week_start + Duration::days(i64::from(self.day_of_week))
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}+{}/{}/{}",
            self.week_start, self.day_of_week, self.site, self.category
        )
    }
}

// ============================================================================
// Slot lifecycle
// ============================================================================

/// Lifecycle status of a schedule slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Planned,
    Generating,
    Published,
    Failed,
}

/// Rejected lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid slot transition {from} -> {to}")]
pub struct StatusTransitionError {
    pub from: SlotStatus,
    pub to: SlotStatus,
}

impl SlotStatus {
    pub const ALL: [SlotStatus; 4] = [
        SlotStatus::Planned,
        SlotStatus::Generating,
        SlotStatus::Published,
        SlotStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Planned => "planned",
            SlotStatus::Generating => "generating",
            SlotStatus::Published => "published",
            SlotStatus::Failed => "failed",
        }
    }

    /// Whether `self -> next` is in the transition table.
    ///
    /// `Failed -> Planned` is the manual reset; every other edge moves forward.
    pub fn can_transition_to(self, next: SlotStatus) -> bool {
        use SlotStatus::*;
        matches!(
            (self, next),
            (Planned, Generating)
                | (Failed, Generating)
                | (Generating, Published)
                | (Generating, Failed)
                | (Failed, Planned)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: SlotStatus) -> Result<SlotStatus, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// Slots an orchestration run will pick up
    pub fn is_runnable(self) -> bool {
        matches!(self, SlotStatus::Planned | SlotStatus::Failed)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown enum strings read back from storage or config
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for SlotStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(SlotStatus::Planned),
            "generating" => Ok(SlotStatus::Generating),
            "published" => Ok(SlotStatus::Published),
            "failed" => Ok(SlotStatus::Failed),
            other => Err(UnknownVariant {
                kind: "slot status",
                value: other.to_string(),
            }),
        }
    }
}

/// Requested length of a generated post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetLength {
    Short,
    #[default]
    Medium,
    Long,
    VeryLong,
}

impl TargetLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetLength::Short => "short",
            TargetLength::Medium => "medium",
            TargetLength::Long => "long",
            TargetLength::VeryLong => "very_long",
        }
    }

    /// Number of body sections requested from the generator
    pub fn section_count(&self) -> usize {
        match self {
            TargetLength::Short => 2,
            TargetLength::Medium => 3,
            TargetLength::Long => 4,
            TargetLength::VeryLong => 5,
        }
    }

    /// Approximate word range for each section
    pub fn words_per_section(&self) -> (u32, u32) {
        match self {
            TargetLength::Short => (150, 250),
            TargetLength::Medium => (250, 400),
            TargetLength::Long => (350, 500),
            TargetLength::VeryLong => (450, 650),
        }
    }
}

impl fmt::Display for TargetLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetLength {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(TargetLength::Short),
            "medium" => Ok(TargetLength::Medium),
            "long" => Ok(TargetLength::Long),
            "very_long" => Ok(TargetLength::VeryLong),
            other => Err(UnknownVariant {
                kind: "target length",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Topics and slots
// ============================================================================

/// A candidate topic from a topic pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub target_length: TargetLength,
}

impl Topic {
    pub fn new(title: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            title: title.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            target_length: TargetLength::default(),
        }
    }

    pub fn with_length(mut self, target_length: TargetLength) -> Self {
        self.target_length = target_length;
        self
    }
}

/// A scheduled post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub key: SlotKey,
    pub topic: String,
    pub keywords: Vec<String>,
    pub target_length: TargetLength,
    pub status: SlotStatus,
    pub generated_content_id: Option<i64>,
    pub published_url: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleSlot {
    /// Fresh `planned` slot for a selected topic
    pub fn planned(key: SlotKey, topic: &Topic) -> Self {
        let now = Utc::now();
        Self {
            key,
            topic: topic.title.clone(),
            keywords: topic.keywords.clone(),
            target_length: topic.target_length,
            status: SlotStatus::Planned,
            generated_content_id: None,
            published_url: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Topic view of this slot, used for duplicate checks
    pub fn as_topic(&self) -> Topic {
        Topic {
            title: self.topic.clone(),
            keywords: self.keywords.clone(),
            target_length: self.target_length,
        }
    }
}

/// Optional fields written together with a status change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotUpdate {
    pub generated_content_id: Option<i64>,
    pub published_url: Option<String>,
    pub last_error: Option<String>,
}

impl SlotUpdate {
    pub fn published(content_id: i64, url: impl Into<String>) -> Self {
        Self {
            generated_content_id: Some(content_id),
            published_url: Some(url.into()),
            last_error: None,
        }
    }

    pub fn failed(content_id: Option<i64>, error: impl Into<String>) -> Self {
        Self {
            generated_content_id: content_id,
            published_url: None,
            last_error: Some(error.into()),
        }
    }
}

// ============================================================================
// Content
// ============================================================================

/// One body section of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub content: String,
}

/// Artifact lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Draft,
    Published,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Draft => "draft",
            ArtifactStatus::Published => "published",
        }
    }
}

impl FromStr for ArtifactStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ArtifactStatus::Draft),
            "published" => Ok(ArtifactStatus::Published),
            other => Err(UnknownVariant {
                kind: "artifact status",
                value: other.to_string(),
            }),
        }
    }
}

/// Generated post body, ready for publishing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentArtifact {
    pub id: Option<i64>,
    pub site: String,
    pub title: String,
    pub meta_description: String,
    pub introduction: String,
    pub sections: Vec<Section>,
    pub conclusion: String,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub status: ArtifactStatus,
    pub file_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentArtifact {
    /// Empty draft for a site
    pub fn draft(site: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            site: site.into(),
            title: title.into(),
            meta_description: String::new(),
            introduction: String::new(),
            sections: Vec::new(),
            conclusion: String::new(),
            tags: Vec::new(),
            keywords: Vec::new(),
            status: ArtifactStatus::Draft,
            file_reference: None,
            created_at: Utc::now(),
        }
    }

    /// All body text joined, lower-cased, for keyword presence checks
    pub fn searchable_text(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.title);
        text.push('\n');
        text.push_str(&self.introduction);
        for section in &self.sections {
            text.push('\n');
            text.push_str(&section.heading);
            text.push('\n');
            text.push_str(&section.content);
        }
        text.push('\n');
        text.push_str(&self.conclusion);
        text.to_lowercase()
    }
}

// ============================================================================
// Publish attempts
// ============================================================================

/// What started a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptType {
    Auto,
    Manual,
}

impl AttemptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptType::Auto => "auto",
            AttemptType::Manual => "manual",
        }
    }
}

impl FromStr for AttemptType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(AttemptType::Auto),
            "manual" => Ok(AttemptType::Manual),
            other => Err(UnknownVariant {
                kind: "attempt type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AttemptStatus::Success),
            "failed" => Ok(AttemptStatus::Failed),
            other => Err(UnknownVariant {
                kind: "attempt status",
                value: other.to_string(),
            }),
        }
    }
}

/// Append-only publish log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishAttempt {
    pub id: Option<i64>,
    pub site: String,
    pub content_id: Option<i64>,
    pub attempt_type: AttemptType,
    pub status: AttemptStatus,
    pub error_message: Option<String>,
    pub published_at: DateTime<Utc>,
    pub url: Option<String>,
}

impl PublishAttempt {
    pub fn success(
        site: impl Into<String>,
        content_id: i64,
        attempt_type: AttemptType,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            site: site.into(),
            content_id: Some(content_id),
            attempt_type,
            status: AttemptStatus::Success,
            error_message: None,
            published_at: Utc::now(),
            url: Some(url.into()),
        }
    }

    pub fn failure(
        site: impl Into<String>,
        content_id: Option<i64>,
        attempt_type: AttemptType,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            site: site.into(),
            content_id,
            attempt_type,
            status: AttemptStatus::Failed,
            error_message: Some(error.into()),
            published_at: Utc::now(),
            url: None,
        }
    }
}

// ============================================================================
// Site profile
// ============================================================================

/// Voice and audience of a site, passed to the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Internal site identifier
    pub name: String,
    /// Human readable name, used for title suffixes
    pub display_name: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub style: String,
    /// Keywords the site wants present in every post, most important first
    #[serde(default)]
    pub keywords_focus: Vec<String>,
}

fn default_language() -> String {
    "en".to_string()
}

impl SiteProfile {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            language: default_language(),
            audience: String::new(),
            style: String::new(),
            keywords_focus: Vec::new(),
        }
    }
}
