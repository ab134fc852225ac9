//! Repository pattern for the schedule, artifact and publish-attempt stores
//!
//! Business logic talks to the traits below; SQLite backs production and an
//! in-memory implementation backs tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Orchestrator / WeekPlanner / Recovery            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Repository Traits                         │
//! │  ScheduleRepository, ArtifactRepository, AttemptRepository  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                 ┌────────────┴────────────┐
//!                 ▼                         ▼
//!        ┌─────────────────┐       ┌─────────────────┐
//!        │     SQLite      │       │     Memory      │
//!        │   SqliteStore   │       │   MemoryStore   │
//!        └─────────────────┘       └─────────────────┘
//! ```
//!
//! # Slot write rules
//!
//! - `upsert_slot` is idempotent on `(week_start, day_of_week, site, category)`.
//!   Rows carrying an older `updated_at` than the stored row are ignored, so
//!   overlapping writers resolve last-write-wins. Upserts refresh the plan
//!   (topic, keywords, length) and never touch lifecycle fields.
//! - `mark_status` goes through [`SlotStatus::transition`]; rejected edges
//!   write nothing.
//! - Rows are only deleted by `recreate_week`, inside one transaction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::models::{
    week_start_of, ArtifactStatus, ContentArtifact, PublishAttempt, ScheduleSlot, Section,
    SlotKey, SlotStatus, SlotUpdate, StatusTransitionError, Topic,
};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("slot not found: {0}")]
    SlotNotFound(SlotKey),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(i64),

    #[error(transparent)]
    InvalidTransition(#[from] StatusTransitionError),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// True when the backing store itself failed, as opposed to a rejected
    /// request against healthy storage.
    pub fn is_persistence_failure(&self) -> bool {
        !matches!(
            self,
            Self::SlotNotFound(_) | Self::ArtifactNotFound(_) | Self::InvalidTransition(_)
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Repository Traits
// ============================================================================

/// Durable table of schedule slots
pub trait ScheduleRepository: Send + Sync {
    /// Insert or refresh the plan of a slot
    fn upsert_slot(&self, slot: &ScheduleSlot) -> StoreResult<()>;

    fn get_slot(&self, key: &SlotKey) -> StoreResult<Option<ScheduleSlot>>;

    /// All slots scheduled on a calendar date, ordered by site then category
    fn get_slots_for_day(&self, date: NaiveDate) -> StoreResult<Vec<ScheduleSlot>>;

    /// All slots of a week, ordered by day, site, category
    fn get_week(&self, week_start: NaiveDate) -> StoreResult<Vec<ScheduleSlot>>;

    /// Apply a validated status transition plus optional extra fields
    fn mark_status(
        &self,
        key: &SlotKey,
        status: SlotStatus,
        update: SlotUpdate,
    ) -> StoreResult<ScheduleSlot>;

    /// Manual `failed -> planned` reset
    fn reset_slot(&self, key: &SlotKey) -> StoreResult<ScheduleSlot> {
        self.mark_status(key, SlotStatus::Planned, SlotUpdate::default())
    }

    /// Topics of every published slot for a site, oldest first
    fn published_topics(&self, site: &str) -> StoreResult<Vec<Topic>>;

    /// Delete every slot of a week and insert `slots` in one transaction
    fn recreate_week(&self, week_start: NaiveDate, slots: &[ScheduleSlot]) -> StoreResult<usize>;
}

/// Generated content storage
pub trait ArtifactRepository: Send + Sync {
    /// Store a new artifact, returning its id
    fn insert_artifact(&self, artifact: &ContentArtifact) -> StoreResult<i64>;

    fn get_artifact(&self, id: i64) -> StoreResult<Option<ContentArtifact>>;

    fn set_artifact_file(&self, id: i64, file_reference: &str) -> StoreResult<()>;

    fn mark_artifact_published(&self, id: i64) -> StoreResult<()>;
}

/// Append-only publish log
pub trait AttemptRepository: Send + Sync {
    fn append_attempt(&self, attempt: &PublishAttempt) -> StoreResult<i64>;

    fn attempts_for_content(&self, content_id: i64) -> StoreResult<Vec<PublishAttempt>>;

    /// Most recent attempts first, optionally for one site
    fn recent_attempts(&self, site: Option<&str>, limit: usize)
        -> StoreResult<Vec<PublishAttempt>>;
}

/// Everything the pipeline persists
pub trait Store: ScheduleRepository + ArtifactRepository + AttemptRepository {}

impl<T> Store for T where T: ScheduleRepository + ArtifactRepository + AttemptRepository + ?Sized {}

pub type SharedStore = Arc<dyn Store>;

// ============================================================================
// Helpers
// ============================================================================

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{raw}': {e}")))
}

fn parse_date(raw: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| StoreError::Corrupt(format!("date '{raw}': {e}")))
}

fn corrupt<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Corrupt(e.to_string())
}

/// Merge a status change into an existing slot
fn apply_status(
    mut slot: ScheduleSlot,
    status: SlotStatus,
    update: SlotUpdate,
) -> StoreResult<ScheduleSlot> {
    slot.status = slot.status.transition(status)?;
    if update.generated_content_id.is_some() {
        slot.generated_content_id = update.generated_content_id;
    }
    if update.published_url.is_some() {
        slot.published_url = update.published_url;
    }
    slot.last_error = match status {
        SlotStatus::Published => None,
        _ => update.last_error.or(slot.last_error),
    };
    slot.updated_at = Utc::now();
    Ok(slot)
}

// ============================================================================
// SQLite Implementation
// ============================================================================

const SLOT_COLUMNS: &str = "week_start, day_of_week, site, topic_category, specific_topic, \
     keywords, target_length, status, generated_content_id, published_url, last_error, \
     created_at, updated_at";

const ARTIFACT_COLUMNS: &str = "id, site, title, meta_description, introduction, sections, \
     conclusion, tags, keywords, status, file_reference, created_at";

const ATTEMPT_COLUMNS: &str =
    "id, site, content_id, attempt_type, status, error_message, published_at, url";

/// Column values of a slot row before validation
struct SlotRow {
    week_start: String,
    day_of_week: i64,
    site: String,
    category: String,
    topic: String,
    keywords: String,
    target_length: String,
    status: String,
    generated_content_id: Option<i64>,
    published_url: Option<String>,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SlotRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            week_start: row.get(0)?,
            day_of_week: row.get(1)?,
            site: row.get(2)?,
            category: row.get(3)?,
            topic: row.get(4)?,
            keywords: row.get(5)?,
            target_length: row.get(6)?,
            status: row.get(7)?,
            generated_content_id: row.get(8)?,
            published_url: row.get(9)?,
            last_error: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_slot(self) -> StoreResult<ScheduleSlot> {
        let day_of_week = u8::try_from(self.day_of_week).map_err(corrupt)?;
        Ok(ScheduleSlot {
            key: SlotKey::new(
                parse_date(&self.week_start)?,
                day_of_week,
                self.site,
                self.category,
            ),
            topic: self.topic,
            keywords: serde_json::from_str(&self.keywords)?,
            target_length: self.target_length.parse().map_err(corrupt)?,
            status: self.status.parse().map_err(corrupt)?,
            generated_content_id: self.generated_content_id,
            published_url: self.published_url,
            last_error: self.last_error,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

struct ArtifactRow {
    id: i64,
    site: String,
    title: String,
    meta_description: String,
    introduction: String,
    sections: String,
    conclusion: String,
    tags: String,
    keywords: String,
    status: String,
    file_reference: Option<String>,
    created_at: String,
}

impl ArtifactRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            site: row.get(1)?,
            title: row.get(2)?,
            meta_description: row.get(3)?,
            introduction: row.get(4)?,
            sections: row.get(5)?,
            conclusion: row.get(6)?,
            tags: row.get(7)?,
            keywords: row.get(8)?,
            status: row.get(9)?,
            file_reference: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn into_artifact(self) -> StoreResult<ContentArtifact> {
        let sections: Vec<Section> = serde_json::from_str(&self.sections)?;
        Ok(ContentArtifact {
            id: Some(self.id),
            site: self.site,
            title: self.title,
            meta_description: self.meta_description,
            introduction: self.introduction,
            sections,
            conclusion: self.conclusion,
            tags: serde_json::from_str(&self.tags)?,
            keywords: serde_json::from_str(&self.keywords)?,
            status: self.status.parse().map_err(corrupt)?,
            file_reference: self.file_reference,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

struct AttemptRow {
    id: i64,
    site: String,
    content_id: Option<i64>,
    attempt_type: String,
    status: String,
    error_message: Option<String>,
    published_at: String,
    url: Option<String>,
}

impl AttemptRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            site: row.get(1)?,
            content_id: row.get(2)?,
            attempt_type: row.get(3)?,
            status: row.get(4)?,
            error_message: row.get(5)?,
            published_at: row.get(6)?,
            url: row.get(7)?,
        })
    }

    fn into_attempt(self) -> StoreResult<PublishAttempt> {
        Ok(PublishAttempt {
            id: Some(self.id),
            site: self.site,
            content_id: self.content_id,
            attempt_type: self.attempt_type.parse().map_err(corrupt)?,
            status: self.status.parse().map_err(corrupt)?,
            error_message: self.error_message,
            published_at: parse_ts(&self.published_at)?,
            url: self.url,
        })
    }
}

/// SQLite-backed store
///
/// Uses `Mutex` to serialize access to the single connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn create_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS schedule_slots (
                    week_start TEXT NOT NULL,
                    day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
                    site TEXT NOT NULL,
                    topic_category TEXT NOT NULL,
                    specific_topic TEXT NOT NULL,
                    keywords TEXT NOT NULL DEFAULT '[]',
                    target_length TEXT NOT NULL DEFAULT 'medium',
                    status TEXT NOT NULL DEFAULT 'planned',
                    generated_content_id INTEGER,
                    published_url TEXT,
                    last_error TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_schedule_slots_key
                    ON schedule_slots(week_start, day_of_week, site, topic_category);

                CREATE INDEX IF NOT EXISTS idx_schedule_slots_status
                    ON schedule_slots(site, status);

                CREATE TABLE IF NOT EXISTS content_artifacts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    site TEXT NOT NULL,
                    title TEXT NOT NULL,
                    meta_description TEXT NOT NULL DEFAULT '',
                    introduction TEXT NOT NULL DEFAULT '',
                    sections TEXT NOT NULL DEFAULT '[]',
                    conclusion TEXT NOT NULL DEFAULT '',
                    tags TEXT NOT NULL DEFAULT '[]',
                    keywords TEXT NOT NULL DEFAULT '[]',
                    status TEXT NOT NULL DEFAULT 'draft',
                    file_reference TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS publish_attempts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    site TEXT NOT NULL,
                    content_id INTEGER,
                    attempt_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    error_message TEXT,
                    published_at TEXT NOT NULL,
                    url TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_publish_attempts_content
                    ON publish_attempts(content_id);
                "#,
        )?;

        Ok(())
    }

    fn insert_slot(conn: &Connection, slot: &ScheduleSlot) -> StoreResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO schedule_slots ({SLOT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                slot.key.week_start.to_string(),
                slot.key.day_of_week,
                slot.key.site,
                slot.key.category,
                slot.topic,
                serde_json::to_string(&slot.keywords)?,
                slot.target_length.as_str(),
                slot.status.as_str(),
                slot.generated_content_id,
                slot.published_url,
                slot.last_error,
                ts(&slot.created_at),
                ts(&slot.updated_at),
            ],
        )?;
        Ok(())
    }

    fn query_slots(
        conn: &Connection,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StoreResult<Vec<ScheduleSlot>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SLOT_COLUMNS} FROM schedule_slots {filter}"
        ))?;
        let rows = stmt
            .query_map(args, SlotRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(SlotRow::into_slot).collect()
    }

    fn fetch_slot(conn: &Connection, key: &SlotKey) -> StoreResult<Option<ScheduleSlot>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SLOT_COLUMNS} FROM schedule_slots
                     WHERE week_start = ?1 AND day_of_week = ?2 AND site = ?3 AND topic_category = ?4"
                ),
                params![
                    key.week_start.to_string(),
                    key.day_of_week,
                    key.site,
                    key.category
                ],
                SlotRow::from_row,
            )
            .optional()?;
        row.map(SlotRow::into_slot).transpose()
    }
}

impl ScheduleRepository for SqliteStore {
    fn upsert_slot(&self, slot: &ScheduleSlot) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO schedule_slots ({SLOT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(week_start, day_of_week, site, topic_category) DO UPDATE SET
                     specific_topic = excluded.specific_topic,
                     keywords = excluded.keywords,
                     target_length = excluded.target_length,
                     updated_at = excluded.updated_at
                 WHERE excluded.updated_at >= schedule_slots.updated_at"
            ),
            params![
                slot.key.week_start.to_string(),
                slot.key.day_of_week,
                slot.key.site,
                slot.key.category,
                slot.topic,
                serde_json::to_string(&slot.keywords)?,
                slot.target_length.as_str(),
                slot.status.as_str(),
                slot.generated_content_id,
                slot.published_url,
                slot.last_error,
                ts(&slot.created_at),
                ts(&slot.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_slot(&self, key: &SlotKey) -> StoreResult<Option<ScheduleSlot>> {
        let conn = self.lock()?;
        Self::fetch_slot(&conn, key)
    }

    fn get_slots_for_day(&self, date: NaiveDate) -> StoreResult<Vec<ScheduleSlot>> {
        let conn = self.lock()?;
        let week_start = week_start_of(date).to_string();
        let day = date.weekday().num_days_from_monday();
        Self::query_slots(
            &conn,
            "WHERE week_start = ?1 AND day_of_week = ?2 ORDER BY site, topic_category",
            params![week_start, day],
        )
    }

    fn get_week(&self, week_start: NaiveDate) -> StoreResult<Vec<ScheduleSlot>> {
        let conn = self.lock()?;
        let week_start = week_start.to_string();
        Self::query_slots(
            &conn,
            "WHERE week_start = ?1 ORDER BY day_of_week, site, topic_category",
            params![week_start],
        )
    }

    fn mark_status(
        &self,
        key: &SlotKey,
        status: SlotStatus,
        update: SlotUpdate,
    ) -> StoreResult<ScheduleSlot> {
        let conn = self.lock()?;
        let current =
            Self::fetch_slot(&conn, key)?.ok_or_else(|| StoreError::SlotNotFound(key.clone()))?;
        let next = apply_status(current, status, update)?;

        conn.execute(
            "UPDATE schedule_slots
             SET status = ?1, generated_content_id = ?2, published_url = ?3,
                 last_error = ?4, updated_at = ?5
             WHERE week_start = ?6 AND day_of_week = ?7 AND site = ?8 AND topic_category = ?9",
            params![
                next.status.as_str(),
                next.generated_content_id,
                next.published_url,
                next.last_error,
                ts(&next.updated_at),
                key.week_start.to_string(),
                key.day_of_week,
                key.site,
                key.category,
            ],
        )?;

        Ok(next)
    }

    fn published_topics(&self, site: &str) -> StoreResult<Vec<Topic>> {
        let conn = self.lock()?;
        let slots = Self::query_slots(
            &conn,
            "WHERE site = ?1 AND status = 'published' ORDER BY week_start, day_of_week",
            params![site],
        )?;
        Ok(slots.iter().map(ScheduleSlot::as_topic).collect())
    }

    fn recreate_week(&self, week_start: NaiveDate, slots: &[ScheduleSlot]) -> StoreResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM schedule_slots WHERE week_start = ?1",
            params![week_start.to_string()],
        )?;
        for slot in slots {
            Self::insert_slot(&tx, slot)?;
        }
        tx.commit()?;

        tracing::info!(%week_start, removed, inserted = slots.len(), "Week recreated");
        Ok(slots.len())
    }
}

impl ArtifactRepository for SqliteStore {
    fn insert_artifact(&self, artifact: &ContentArtifact) -> StoreResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO content_artifacts
                 (site, title, meta_description, introduction, sections, conclusion,
                  tags, keywords, status, file_reference, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                artifact.site,
                artifact.title,
                artifact.meta_description,
                artifact.introduction,
                serde_json::to_string(&artifact.sections)?,
                artifact.conclusion,
                serde_json::to_string(&artifact.tags)?,
                serde_json::to_string(&artifact.keywords)?,
                artifact.status.as_str(),
                artifact.file_reference,
                ts(&artifact.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_artifact(&self, id: i64) -> StoreResult<Option<ContentArtifact>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {ARTIFACT_COLUMNS} FROM content_artifacts WHERE id = ?1"),
                params![id],
                ArtifactRow::from_row,
            )
            .optional()?;
        row.map(ArtifactRow::into_artifact).transpose()
    }

    fn set_artifact_file(&self, id: i64, file_reference: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE content_artifacts SET file_reference = ?1 WHERE id = ?2",
            params![file_reference, id],
        )?;
        if changed == 0 {
            return Err(StoreError::ArtifactNotFound(id));
        }
        Ok(())
    }

    fn mark_artifact_published(&self, id: i64) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE content_artifacts SET status = ?1 WHERE id = ?2",
            params![ArtifactStatus::Published.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::ArtifactNotFound(id));
        }
        Ok(())
    }
}

impl AttemptRepository for SqliteStore {
    fn append_attempt(&self, attempt: &PublishAttempt) -> StoreResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO publish_attempts
                 (site, content_id, attempt_type, status, error_message, published_at, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                attempt.site,
                attempt.content_id,
                attempt.attempt_type.as_str(),
                attempt.status.as_str(),
                attempt.error_message,
                ts(&attempt.published_at),
                attempt.url,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn attempts_for_content(&self, content_id: i64) -> StoreResult<Vec<PublishAttempt>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM publish_attempts WHERE content_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![content_id], AttemptRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(AttemptRow::into_attempt).collect()
    }

    fn recent_attempts(
        &self,
        site: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<PublishAttempt>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match site {
            Some(site) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ATTEMPT_COLUMNS} FROM publish_attempts
                     WHERE site = ?1 ORDER BY id DESC LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![site, limit], AttemptRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ATTEMPT_COLUMNS} FROM publish_attempts ORDER BY id DESC LIMIT ?1"
                ))?;
                let rows = stmt
                    .query_map(params![limit], AttemptRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        rows.into_iter().map(AttemptRow::into_attempt).collect()
    }
}

// ============================================================================
// Memory Implementation
// ============================================================================

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<SlotKey, ScheduleSlot>>,
    artifacts: RwLock<Vec<ContentArtifact>>,
    attempts: RwLock<Vec<PublishAttempt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut slots: Vec<ScheduleSlot>) -> Vec<ScheduleSlot> {
        slots.sort_by(|a, b| a.key.cmp(&b.key));
        slots
    }
}

impl ScheduleRepository for MemoryStore {
    fn upsert_slot(&self, slot: &ScheduleSlot) -> StoreResult<()> {
        let mut slots = self.slots.write().map_err(|_| StoreError::LockPoisoned)?;
        match slots.get_mut(&slot.key) {
            Some(existing) => {
                if slot.updated_at >= existing.updated_at {
                    existing.topic = slot.topic.clone();
                    existing.keywords = slot.keywords.clone();
                    existing.target_length = slot.target_length;
                    existing.updated_at = slot.updated_at;
                }
            }
            None => {
                slots.insert(slot.key.clone(), slot.clone());
            }
        }
        Ok(())
    }

    fn get_slot(&self, key: &SlotKey) -> StoreResult<Option<ScheduleSlot>> {
        let slots = self.slots.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(slots.get(key).cloned())
    }

    fn get_slots_for_day(&self, date: NaiveDate) -> StoreResult<Vec<ScheduleSlot>> {
        let slots = self.slots.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Self::sorted(
            slots
                .values()
                .filter(|s| s.key.date() == date)
                .cloned()
                .collect(),
        ))
    }

    fn get_week(&self, week_start: NaiveDate) -> StoreResult<Vec<ScheduleSlot>> {
        let slots = self.slots.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Self::sorted(
            slots
                .values()
                .filter(|s| s.key.week_start == week_start)
                .cloned()
                .collect(),
        ))
    }

    fn mark_status(
        &self,
        key: &SlotKey,
        status: SlotStatus,
        update: SlotUpdate,
    ) -> StoreResult<ScheduleSlot> {
        let mut slots = self.slots.write().map_err(|_| StoreError::LockPoisoned)?;
        let current = slots
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::SlotNotFound(key.clone()))?;
        let next = apply_status(current, status, update)?;
        slots.insert(key.clone(), next.clone());
        Ok(next)
    }

    fn published_topics(&self, site: &str) -> StoreResult<Vec<Topic>> {
        let slots = self.slots.read().map_err(|_| StoreError::LockPoisoned)?;
        let published = Self::sorted(
            slots
                .values()
                .filter(|s| s.key.site == site && s.status == SlotStatus::Published)
                .cloned()
                .collect(),
        );
        Ok(published.iter().map(ScheduleSlot::as_topic).collect())
    }

    fn recreate_week(&self, week_start: NaiveDate, new_slots: &[ScheduleSlot]) -> StoreResult<usize> {
        let mut slots = self.slots.write().map_err(|_| StoreError::LockPoisoned)?;
        slots.retain(|key, _| key.week_start != week_start);
        for slot in new_slots {
            slots.insert(slot.key.clone(), slot.clone());
        }
        Ok(new_slots.len())
    }
}

impl ArtifactRepository for MemoryStore {
    fn insert_artifact(&self, artifact: &ContentArtifact) -> StoreResult<i64> {
        let mut artifacts = self.artifacts.write().map_err(|_| StoreError::LockPoisoned)?;
        let id = artifacts.len() as i64 + 1;
        let mut stored = artifact.clone();
        stored.id = Some(id);
        artifacts.push(stored);
        Ok(id)
    }

    fn get_artifact(&self, id: i64) -> StoreResult<Option<ContentArtifact>> {
        let artifacts = self.artifacts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(artifacts.iter().find(|a| a.id == Some(id)).cloned())
    }

    fn set_artifact_file(&self, id: i64, file_reference: &str) -> StoreResult<()> {
        let mut artifacts = self.artifacts.write().map_err(|_| StoreError::LockPoisoned)?;
        let artifact = artifacts
            .iter_mut()
            .find(|a| a.id == Some(id))
            .ok_or(StoreError::ArtifactNotFound(id))?;
        artifact.file_reference = Some(file_reference.to_string());
        Ok(())
    }

    fn mark_artifact_published(&self, id: i64) -> StoreResult<()> {
        let mut artifacts = self.artifacts.write().map_err(|_| StoreError::LockPoisoned)?;
        let artifact = artifacts
            .iter_mut()
            .find(|a| a.id == Some(id))
            .ok_or(StoreError::ArtifactNotFound(id))?;
        artifact.status = ArtifactStatus::Published;
        Ok(())
    }
}

impl AttemptRepository for MemoryStore {
    fn append_attempt(&self, attempt: &PublishAttempt) -> StoreResult<i64> {
        let mut attempts = self.attempts.write().map_err(|_| StoreError::LockPoisoned)?;
        let id = attempts.len() as i64 + 1;
        let mut stored = attempt.clone();
        stored.id = Some(id);
        attempts.push(stored);
        Ok(id)
    }

    fn attempts_for_content(&self, content_id: i64) -> StoreResult<Vec<PublishAttempt>> {
        let attempts = self.attempts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(attempts
            .iter()
            .filter(|a| a.content_id == Some(content_id))
            .cloned()
            .collect())
    }

    fn recent_attempts(
        &self,
        site: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<PublishAttempt>> {
        let attempts = self.attempts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(attempts
            .iter()
            .rev()
            .filter(|a| site.map_or(true, |s| a.site == s))
            .take(limit)
            .cloned()
            .collect())
    }
}
