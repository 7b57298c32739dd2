//! Atomic persistence of resolved process graphs.
//!
//! One block is one transaction. Rows are inserted parents first (the
//! `blocks` row, events, tasks, gateways) and sequence flows last, with each
//! flow endpoint remapped from its block-local id to the rowid SQLite
//! assigned. The polymorphic `from_id` / `to_id` columns cannot carry a
//! foreign key, so the remap table is the integrity check: an endpoint with
//! no stored row of its kind aborts the whole transaction.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use procflow_parse::{ElementKind, Endpoint, LocalId, ResolvedGraph, SkippedLine, UnresolvedFlow};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Default time budget for one block commit.
pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(30);

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// What a successful commit stored, plus what it could not.
#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    /// Id of the `blocks` row every stored row points at (UUID v7).
    pub block_id: String,
    pub events: usize,
    pub tasks: usize,
    pub gateways: usize,
    pub flows: usize,
    /// Flow declarations that were not stored because a name did not resolve.
    pub unresolved: Vec<UnresolvedFlow>,
    /// Lines that were not stored because they could not be extracted.
    pub skipped: Vec<SkippedLine>,
}

/// Local id → storage rowid, per element kind.
#[derive(Debug, Default)]
struct IdMap {
    rows: HashMap<(ElementKind, LocalId), i64>,
}

impl IdMap {
    fn insert(&mut self, kind: ElementKind, local: LocalId, rowid: i64) {
        self.rows.insert((kind, local), rowid);
    }

    fn storage_id(&self, endpoint: Endpoint, line: usize) -> StoreResult<i64> {
        self.rows
            .get(&(endpoint.kind, endpoint.id))
            .copied()
            .ok_or(StoreError::DanglingEndpoint {
                line,
                kind: endpoint.kind,
                local_id: endpoint.id,
            })
    }
}

/// Time budget of one commit. `at: None` means unbounded.
#[derive(Debug)]
struct Deadline {
    started: Instant,
    at: Option<Instant>,
    /// Checks allowed before expiring regardless of the clock.
    checks_left: Option<Cell<usize>>,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started.checked_add(timeout),
            checks_left: None,
        }
    }

    /// Expires on check number `checks + 1`.
    #[cfg(test)]
    fn after_checks(checks: usize) -> Self {
        Self {
            checks_left: Some(Cell::new(checks)),
            ..Self::after(Duration::MAX)
        }
    }

    fn check(&self) -> StoreResult<()> {
        let spent = match &self.checks_left {
            Some(left) if left.get() == 0 => true,
            Some(left) => {
                left.set(left.get() - 1);
                false
            }
            None => false,
        };
        let late = self.at.is_some_and(|at| Instant::now() >= at);

        if spent || late {
            return Err(StoreError::Timeout {
                elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  ProcessCommitter
// ═══════════════════════════════════════════════════════════════════════

/// Writes resolved graphs into the process schema.
#[derive(Clone)]
pub struct ProcessCommitter {
    db: Database,
    timeout: Duration,
}

impl ProcessCommitter {
    /// Create a committer with [`DEFAULT_COMMIT_TIMEOUT`].
    pub fn new(db: Database) -> Self {
        Self::with_timeout(db, DEFAULT_COMMIT_TIMEOUT)
    }

    /// Create a committer whose [`commit`](Self::commit) uses `timeout`.
    pub fn with_timeout(db: Database, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Commit one block with the configured timeout.
    pub async fn commit(&self, graph: ResolvedGraph) -> StoreResult<CommitResult> {
        self.commit_with_timeout(graph, self.timeout).await
    }

    /// Commit one block, rolling back if it takes longer than `timeout`.
    ///
    /// The clock starts now, so time spent waiting for the connection counts.
    #[instrument(skip(self, graph), fields(elements = graph.element_count(), flows = graph.flows().len()))]
    pub async fn commit_with_timeout(
        &self,
        graph: ResolvedGraph,
        timeout: Duration,
    ) -> StoreResult<CommitResult> {
        let deadline = Deadline::after(timeout);
        let block_id = Uuid::now_v7().to_string();

        let result = self
            .db
            .execute_mut(move |conn| commit_block(conn, graph, block_id, &deadline))
            .await;

        match &result {
            Ok(committed) => info!(
                block_id = %committed.block_id,
                events = committed.events,
                tasks = committed.tasks,
                gateways = committed.gateways,
                flows = committed.flows,
                unresolved = committed.unresolved.len(),
                skipped = committed.skipped.len(),
                "block committed"
            ),
            Err(err) => warn!(%err, retryable = err.is_retryable(), "block commit rolled back"),
        }

        result
    }
}

// ── internals ────────────────────────────────────────────────────────

/// Synchronous body of a commit. Any early return drops `tx`, which rolls
/// the transaction back.
fn commit_block(
    conn: &mut Connection,
    graph: ResolvedGraph,
    block_id: String,
    deadline: &Deadline,
) -> StoreResult<CommitResult> {
    deadline.check()?;
    let tx = conn.transaction()?;
    let mut ids = IdMap::default();

    tx.execute(
        "INSERT INTO blocks (id, input_text, skipped_lines, unresolved_flows, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            block_id,
            graph.source(),
            graph.skipped().len() as i64,
            graph.unresolved().len() as i64,
            Utc::now().timestamp()
        ],
    )?;

    for event in graph.events() {
        deadline.check()?;
        tx.execute(
            "INSERT INTO events (block_id, name, kind) VALUES (?1, ?2, ?3)",
            rusqlite::params![block_id, event.name, event.kind.as_str()],
        )?;
        ids.insert(ElementKind::Event, event.id, tx.last_insert_rowid());
    }

    for task in graph.tasks() {
        deadline.check()?;
        tx.execute(
            "INSERT INTO tasks (block_id, name, performer) VALUES (?1, ?2, ?3)",
            rusqlite::params![block_id, task.name, task.performer],
        )?;
        ids.insert(ElementKind::Task, task.id, tx.last_insert_rowid());
    }

    for gateway in graph.gateways() {
        deadline.check()?;
        tx.execute(
            "INSERT INTO gateways (block_id, condition) VALUES (?1, ?2)",
            rusqlite::params![block_id, gateway.condition],
        )?;
    }

    insert_flows(&tx, &graph, &block_id, &ids, deadline)?;

    deadline.check()?;
    tx.commit()?;

    Ok(CommitResult {
        events: graph.events().len(),
        tasks: graph.tasks().len(),
        gateways: graph.gateways().len(),
        flows: graph.flows().len(),
        unresolved: graph.unresolved().to_vec(),
        skipped: graph.skipped().to_vec(),
        block_id,
    })
}

fn insert_flows(
    tx: &Transaction<'_>,
    graph: &ResolvedGraph,
    block_id: &str,
    ids: &IdMap,
    deadline: &Deadline,
) -> StoreResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO sequence_flows (block_id, from_id, to_id, from_kind, to_kind, condition) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for flow in graph.flows() {
        deadline.check()?;
        let from_id = ids.storage_id(flow.from, flow.line)?;
        let to_id = ids.storage_id(flow.to, flow.line)?;
        stmt.execute(rusqlite::params![
            block_id,
            from_id,
            to_id,
            flow.from.kind.as_str(),
            flow.to.kind.as_str(),
            flow.condition
        ])?;
    }

    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────
