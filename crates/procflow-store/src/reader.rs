//! Read-side queries over committed blocks.
//!
//! Used for reporting: row counts per table, the most recent block, and a
//! block's flows joined back to their endpoint names.

use serde::Serialize;
use tracing::instrument;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Row counts of every process table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub blocks: i64,
    pub events: i64,
    pub tasks: i64,
    pub gateways: i64,
    pub sequence_flows: i64,
}

/// A committed block.
#[derive(Debug, Clone, Serialize)]
pub struct StoredBlock {
    pub id: String,
    /// The raw text the block was parsed from.
    pub input_text: String,
    pub skipped_lines: i64,
    pub unresolved_flows: i64,
    /// Unix timestamp.
    pub created_at: i64,
}

/// A stored sequence flow with its endpoints' names.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFlow {
    pub id: i64,
    pub from_id: i64,
    pub from_kind: String,
    pub from_name: String,
    pub to_id: i64,
    pub to_kind: String,
    pub to_name: String,
    pub condition: Option<String>,
}

const BLOCK_COLUMNS: &str =
    "SELECT id, input_text, skipped_lines, unresolved_flows, created_at FROM blocks";

fn block_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredBlock> {
    Ok(StoredBlock {
        id: row.get(0)?,
        input_text: row.get(1)?,
        skipped_lines: row.get(2)?,
        unresolved_flows: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Queries over the process schema.
#[derive(Clone)]
pub struct ProcessReader {
    db: Database,
}

impl ProcessReader {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn counts(&self) -> StoreResult<TableCounts> {
        self.db
            .execute(|conn| {
                let count = |table: &str| -> StoreResult<i64> {
                    Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?)
                };
                Ok(TableCounts {
                    blocks: count("blocks")?,
                    events: count("events")?,
                    tasks: count("tasks")?,
                    gateways: count("gateways")?,
                    sequence_flows: count("sequence_flows")?,
                })
            })
            .await
    }

    /// The most recently committed block, if any.
    #[instrument(skip(self))]
    pub async fn latest_block(&self) -> StoreResult<Option<StoredBlock>> {
        self.db
            .execute(|conn| {
                let result = conn.query_row(
                    &format!("{BLOCK_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT 1"),
                    [],
                    block_from_row,
                );
                match result {
                    Ok(block) => Ok(Some(block)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// One block by id, including the text it was parsed from.
    #[instrument(skip(self))]
    pub async fn block(&self, block_id: &str) -> StoreResult<StoredBlock> {
        let block_id = block_id.to_string();
        self.db
            .execute(move |conn| {
                match conn.query_row(
                    &format!("{BLOCK_COLUMNS} WHERE id = ?1"),
                    [&block_id],
                    block_from_row,
                ) {
                    Ok(block) => Ok(block),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound {
                        entity: "block",
                        id: block_id,
                    }),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Flows of `block_id` in insertion order, with endpoint names.
    ///
    /// Returns [`StoreError::NotFound`] when the block does not exist.
    #[instrument(skip(self))]
    pub async fn flows(&self, block_id: &str) -> StoreResult<Vec<StoredFlow>> {
        let block_id = block_id.to_string();
        self.db
            .execute(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM blocks WHERE id = ?1)",
                    [&block_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(StoreError::NotFound {
                        entity: "block",
                        id: block_id,
                    });
                }

                let mut stmt = conn.prepare(
                    "SELECT f.id, f.from_id, f.from_kind, \
                            CASE f.from_kind \
                                WHEN 'event' THEN (SELECT name FROM events WHERE id = f.from_id) \
                                ELSE (SELECT name FROM tasks WHERE id = f.from_id) END, \
                            f.to_id, f.to_kind, \
                            CASE f.to_kind \
                                WHEN 'event' THEN (SELECT name FROM events WHERE id = f.to_id) \
                                ELSE (SELECT name FROM tasks WHERE id = f.to_id) END, \
                            f.condition \
                     FROM sequence_flows f WHERE f.block_id = ?1 ORDER BY f.id",
                )?;
                let flows = stmt
                    .query_map([&block_id], |row| {
                        Ok(StoredFlow {
                            id: row.get(0)?,
                            from_id: row.get(1)?,
                            from_kind: row.get(2)?,
                            from_name: row.get(3)?,
                            to_id: row.get(4)?,
                            to_kind: row.get(5)?,
                            to_name: row.get(6)?,
                            condition: row.get(7)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(flows)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────
