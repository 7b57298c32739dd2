//! Schema migration system.
//!
//! Migrations are static SQL strings keyed by version number. Applied
//! versions are recorded in a `_migrations` table, so running them again is
//! a no-op.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

struct Migration {
    /// Strictly increasing, starting at 1.
    version: u32,
    description: &'static str,
    /// May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "process schema: blocks, events, tasks, gateways, sequence_flows",
        sql: r#"
            CREATE TABLE blocks (
                id               TEXT PRIMARY KEY,
                skipped_lines    INTEGER NOT NULL DEFAULT 0,
                unresolved_flows INTEGER NOT NULL DEFAULT 0,
                created_at       INTEGER NOT NULL
            );

            CREATE TABLE events (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                block_id TEXT NOT NULL REFERENCES blocks(id),
                name     TEXT NOT NULL,
                kind     TEXT NOT NULL CHECK(kind IN ('start','end','intermediate'))
            );
            CREATE INDEX idx_events_block ON events(block_id);

            CREATE TABLE tasks (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                block_id  TEXT NOT NULL REFERENCES blocks(id),
                name      TEXT NOT NULL,
                performer TEXT
            );
            CREATE INDEX idx_tasks_block ON tasks(block_id);

            CREATE TABLE gateways (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                block_id  TEXT NOT NULL REFERENCES blocks(id),
                condition TEXT NOT NULL
            );
            CREATE INDEX idx_gateways_block ON gateways(block_id);

            CREATE TABLE sequence_flows (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                block_id  TEXT NOT NULL REFERENCES blocks(id),
                from_id   INTEGER NOT NULL,
                to_id     INTEGER NOT NULL,
                from_kind TEXT NOT NULL CHECK(from_kind IN ('event','task')),
                to_kind   TEXT NOT NULL CHECK(to_kind IN ('event','task')),
                condition TEXT
            );
            CREATE INDEX idx_sequence_flows_block ON sequence_flows(block_id);
        "#,
    },
    Migration {
        version: 2,
        description: "block ordering: index blocks by creation time",
        sql: r#"
            CREATE INDEX idx_blocks_created ON blocks(created_at);
        "#,
    },
    Migration {
        version: 3,
        description: "block source: keep the raw text each block was parsed from",
        sql: r#"
            ALTER TABLE blocks ADD COLUMN input_text TEXT NOT NULL DEFAULT '';
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Apply every migration newer than the recorded schema version. Blocking.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("cannot create _migrations: {e}"),
    })?;

    let current = current_version(conn)?;
    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(version = current, "schema up to date");
    } else {
        info!(from = current, applied, "schema migrated");
    }
    Ok(())
}

/// Highest applied version, 0 on a fresh database.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
        row.get(0)
    })
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("cannot read schema version: {e}"),
    })
}

// ── internals ────────────────────────────────────────────────────────

/// Apply one migration and record it, atomically.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    let fail = |step: &str, e: rusqlite::Error| StoreError::Migration {
        version: migration.version,
        message: format!("{step}: {e}"),
    };

    // Dropping `tx` on an early return rolls the migration back.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| fail("begin", e))?;
    tx.execute_batch(migration.sql).map_err(|e| fail("sql", e))?;
    tx.execute(
        "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().timestamp()
        ],
    )
    .map_err(|e| fail("record", e))?;
    tx.commit().map_err(|e| fail("commit", e))?;

    info!(
        version = migration.version,
        description = migration.description,
        "migration applied"
    );
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    /// Update when adding migrations.
    const LATEST_VERSION: u32 = 3;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[1].version > window[0].version,
                "migration versions must be strictly increasing: {} >= {}",
                window[0].version,
                window[1].version,
            );
        }
    }

    #[test]
    fn run_all_on_fresh_db() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn migrations_create_all_tables() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE '\\_%' ESCAPE '\\' \
                     AND name != 'sqlite_sequence' ORDER BY name",
                )
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .map(|r| r.unwrap())
                .collect()
        };

        assert_eq!(
            tables,
            vec!["blocks", "events", "gateways", "sequence_flows", "tasks"]
        );
    }

    #[test]
    fn kind_columns_are_checked() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        conn.execute(
            "INSERT INTO blocks (id, created_at) VALUES ('b1', 0)",
            [],
        )
        .unwrap();

        let bad_event = conn.execute(
            "INSERT INTO events (block_id, name, kind) VALUES ('b1', 'x', 'middle')",
            [],
        );
        assert!(bad_event.is_err());

        let bad_flow = conn.execute(
            "INSERT INTO sequence_flows (block_id, from_id, to_id, from_kind, to_kind) \
             VALUES ('b1', 1, 2, 'gateway', 'task')",
            [],
        );
        assert!(bad_flow.is_err());

        conn.execute(
            "INSERT INTO events (block_id, name, kind) VALUES ('b1', 'x', 'intermediate')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn failed_migration_leaves_no_trace() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let broken = Migration {
            version: LATEST_VERSION + 1,
            description: "broken",
            sql: "CREATE TABLE half_done (id INTEGER); SELECT * FROM no_such_table;",
        };
        let err = apply(&conn, &broken).unwrap_err();
        assert!(matches!(err, StoreError::Migration { version, .. } if version == LATEST_VERSION + 1));
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);

        let leftover: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE name = 'half_done'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn elements_require_a_block() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let orphan = conn.execute(
            "INSERT INTO tasks (block_id, name) VALUES ('missing', 'x')",
            [],
        );
        assert!(orphan.is_err());
    }
}
