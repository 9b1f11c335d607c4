//! Apiary and hive records: persistence schema, legacy migration, lifecycle rules and
//! the due-inspection, stats and export/import engines.
//!
//! Storage is abstracted behind [`KeyValueStore`]; every component reads and writes
//! through a [`Repository`] over it.

pub mod apiary;
pub mod due;
mod error;
pub mod hive;
pub mod notes;
pub mod repository;
pub mod schema;
pub mod settings;
pub mod stats;
mod store;
pub mod transfer;

pub use due::{due_inspections, DueInspection, Urgency};
pub use error::{ApiaryError, Result};
pub use hive::{HiveEditForm, HiveEditOutcome};
pub use repository::{Repository, Snapshot};
pub use schema::{
    ApiaryNote, HiveBox, HiveRecord, HiveStatus, Inspection, LayoutDocument, LayoutObject,
    QueenStatus, BOX_TYPES,
};
pub use stats::{hive_stats, HiveStats, StatusCounts};
pub use store::{KeyValueStore, MemoryStore};
pub use transfer::{ExportDocument, ImportSummary, SingleLayoutDocument};
