//! # procflow-store
//!
//! SQLite persistence for resolved process graphs.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  ProcessCommitter (one tx per block)     │
//! │  ProcessReader    (counts, flows)        │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL, spawn_blocking) │
//! │  Migrations (versioned, transactional)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use procflow_store::{Database, ProcessCommitter};
//!
//! let db = Database::open_and_migrate("data/procflow.db").await?;
//! let committer = ProcessCommitter::new(db);
//! let result = committer.commit(procflow_parse::parse_block(text)).await?;
//! ```

pub mod committer;
pub mod db;
pub mod error;
pub mod migration;
pub mod reader;

// ── re-exports ───────────────────────────────────────────────────────

pub use committer::{CommitResult, DEFAULT_COMMIT_TIMEOUT, ProcessCommitter};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use reader::{ProcessReader, StoredBlock, StoredFlow, TableCounts};
