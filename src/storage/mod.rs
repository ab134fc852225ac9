//! Persistence: schedule/artifact/attempt stores and Markdown export

pub mod markdown;
pub mod repository;

pub use markdown::ArtifactWriter;
pub use repository::{
    ArtifactRepository, AttemptRepository, MemoryStore, ScheduleRepository, SharedStore,
    SqliteStore, Store, StoreError, StoreResult,
};
