//! Integration tests for the procflow-store crate.
//!
//! These tests run the parse → resolve → commit pipeline against a real
//! SQLite database on disk (via tempfile).

use std::time::Duration;

use procflow_parse::{ExtractionError, parse_block};
use procflow_store::{
    Database, ProcessCommitter, ProcessReader, StoreError, TableCounts,
};

const WELL_FORMED: &str = "\
[EVENT]
Start: Application received
End: Application decided
[TASK]
Task: Fill form | Performer: Applicant
Task: Review form | Performer: Officer
[GATEWAY]
Condition: Form complete?
[SEQUENCE_FLOW]
From: Application received | To: Fill form
From: Fill form | To: Review form | Condition: submitted
From: Review form | To: Application decided
";

async fn setup(dir: &tempfile::TempDir) -> (Database, ProcessCommitter, ProcessReader) {
    let db = Database::open_and_migrate(dir.path().join("procflow.db"))
        .await
        .unwrap();
    (
        db.clone(),
        ProcessCommitter::new(db.clone()),
        ProcessReader::new(db),
    )
}

// ═══════════════════════════════════════════════════════════════════════
//  Database lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn database_open_and_migrate_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("procflow.db");

    let db1 = Database::open_and_migrate(db_path.clone()).await.unwrap();
    drop(db1);

    let db2 = Database::open_and_migrate(db_path.clone()).await.unwrap();
    let counts = ProcessReader::new(db2).counts().await.unwrap();
    assert_eq!(counts, TableCounts::default());
    assert!(db_path.exists());
}

// ═══════════════════════════════════════════════════════════════════════
//  Commit
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn well_formed_block_stores_one_row_per_declaration() {
    let dir = tempfile::tempdir().unwrap();
    let (_, committer, reader) = setup(&dir).await;

    let result = committer.commit(parse_block(WELL_FORMED)).await.unwrap();
    assert_eq!(result.events, 2);
    assert_eq!(result.tasks, 2);
    assert_eq!(result.gateways, 1);
    assert_eq!(result.flows, 3);
    assert!(result.unresolved.is_empty());
    assert!(result.skipped.is_empty());

    let counts = reader.counts().await.unwrap();
    assert_eq!(
        counts,
        TableCounts {
            blocks: 1,
            events: 2,
            tasks: 2,
            gateways: 1,
            sequence_flows: 3,
        }
    );

    let flows = reader.flows(&result.block_id).await.unwrap();
    let kinds: Vec<(&str, &str)> = flows
        .iter()
        .map(|f| (f.from_kind.as_str(), f.to_kind.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![("event", "task"), ("task", "task"), ("task", "event")]
    );
}

#[tokio::test]
async fn committing_the_same_block_twice_doubles_rows() {
    let dir = tempfile::tempdir().unwrap();
    let (_, committer, reader) = setup(&dir).await;

    let first = committer.commit(parse_block(WELL_FORMED)).await.unwrap();
    let second = committer.commit(parse_block(WELL_FORMED)).await.unwrap();
    assert_ne!(first.block_id, second.block_id);

    let counts = reader.counts().await.unwrap();
    assert_eq!(counts.blocks, 2);
    assert_eq!(counts.events, 4);
    assert_eq!(counts.tasks, 4);
    assert_eq!(counts.gateways, 2);
    assert_eq!(counts.sequence_flows, 6);

    // Each block's flows point at its own rows.
    let first_flows = reader.flows(&first.block_id).await.unwrap();
    let second_flows = reader.flows(&second.block_id).await.unwrap();
    assert_ne!(first_flows[0].to_id, second_flows[0].to_id);
}

#[tokio::test]
async fn duplicate_task_name_binds_to_later_task() {
    let dir = tempfile::tempdir().unwrap();
    let (db, committer, reader) = setup(&dir).await;

    let result = committer
        .commit(parse_block(
            "Task: A | Performer: X\nTask: B | Performer: Z\nTask: A | Performer: Y\nFrom: A | To: B",
        ))
        .await
        .unwrap();

    let flows = reader.flows(&result.block_id).await.unwrap();
    assert_eq!(flows.len(), 1);
    let from_id = flows[0].from_id;

    let performer: Option<String> = db
        .execute(move |conn| {
            Ok(conn.query_row(
                "SELECT performer FROM tasks WHERE id = ?1",
                [from_id],
                |row| row.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(performer.as_deref(), Some("Y"));
}

#[tokio::test]
async fn unresolved_reference_is_reported_and_rest_commits() {
    let dir = tempfile::tempdir().unwrap();
    let (_, committer, reader) = setup(&dir).await;

    let result = committer
        .commit(parse_block(
            "Start: S\nTask: B\nFrom: Ghost | To: B\nFrom: S | To: B",
        ))
        .await
        .unwrap();

    assert_eq!(result.unresolved.len(), 1);
    assert_eq!(result.unresolved[0].missing, vec!["Ghost".to_string()]);
    assert_eq!(result.flows, 1);

    let flows = reader.flows(&result.block_id).await.unwrap();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].from_name, "S");

    let block = reader.latest_block().await.unwrap().unwrap();
    assert_eq!(block.unresolved_flows, 1);
}

#[tokio::test]
async fn malformed_line_is_skipped_and_rest_commits() {
    let dir = tempfile::tempdir().unwrap();
    let (_, committer, reader) = setup(&dir).await;

    let result = committer
        .commit(parse_block(
            "Start: S\nTask BrokenNoColon\nTask: Good | Performer: Me\nEnd: E\n\
             From: S | To: Good\nFrom: Good | To: E",
        ))
        .await
        .unwrap();

    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].reason, ExtractionError::MalformedTask);

    let counts = reader.counts().await.unwrap();
    assert_eq!(counts.events, 2);
    assert_eq!(counts.tasks, 1);
    assert_eq!(counts.sequence_flows, 2);

    let block = reader.latest_block().await.unwrap().unwrap();
    assert_eq!(block.skipped_lines, 1);
}

#[tokio::test]
async fn committed_block_keeps_the_text_it_came_from() {
    let dir = tempfile::tempdir().unwrap();
    let (_, committer, reader) = setup(&dir).await;

    let text = "Here is the process:\nStart: S\nTask BrokenNoColon\nFrom: S | To: Ghost\n";
    let result = committer.commit(parse_block(text)).await.unwrap();

    let block = reader.block(&result.block_id).await.unwrap();
    assert_eq!(block.input_text, text);
    assert_eq!(block.skipped_lines, 1);
    assert_eq!(block.unresolved_flows, 1);

    // Diagnostics point at lines of the stored text.
    let stored_lines: Vec<&str> = block.input_text.lines().collect();
    assert_eq!(stored_lines[result.skipped[0].line - 1], "Task BrokenNoColon");
    assert_eq!(
        stored_lines[result.unresolved[0].line - 1],
        "From: S | To: Ghost"
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Atomicity
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn failure_on_last_insert_rolls_back_whole_block() {
    let dir = tempfile::tempdir().unwrap();
    let (db, committer, reader) = setup(&dir).await;

    // Reject the last flow of the block: the one carrying this condition.
    db.execute(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER reject_last_flow BEFORE INSERT ON sequence_flows \
             WHEN NEW.condition = 'final' \
             BEGIN SELECT RAISE(ABORT, 'storage failure'); END;",
        )?;
        Ok(())
    })
    .await
    .unwrap();

    let err = committer
        .commit(parse_block(
            "Start: S\nTask: T\nEnd: E\nCondition: ok?\n\
             From: S | To: T\nFrom: T | To: E | Condition: final",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Sqlite(_)));
    assert!(!err.is_retryable());
    assert_eq!(reader.counts().await.unwrap(), TableCounts::default());

    // The connection is still usable afterwards.
    committer.commit(parse_block(WELL_FORMED)).await.unwrap();
    assert_eq!(reader.counts().await.unwrap().blocks, 1);
}

#[tokio::test]
async fn expired_timeout_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let (_, committer, reader) = setup(&dir).await;

    let err = committer
        .commit_with_timeout(parse_block(WELL_FORMED), Duration::ZERO)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Timeout { .. }));
    assert!(err.is_retryable());
    assert_eq!(reader.counts().await.unwrap(), TableCounts::default());
}

#[tokio::test]
async fn concurrent_commits_use_independent_transactions() {
    let dir = tempfile::tempdir().unwrap();
    let (_, committer, reader) = setup(&dir).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let committer = committer.clone();
        handles.push(tokio::spawn(async move {
            committer.commit(parse_block(WELL_FORMED)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let counts = reader.counts().await.unwrap();
    assert_eq!(counts.blocks, 8);
    assert_eq!(counts.sequence_flows, 24);
}

#[tokio::test]
async fn commit_result_serializes_for_reporting() {
    let dir = tempfile::tempdir().unwrap();
    let (_, committer, _) = setup(&dir).await;

    let result = committer
        .commit(parse_block("Task: A\nFrom: A | To: Ghost"))
        .await
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["tasks"], 1);
    assert_eq!(json["flows"], 0);
    assert_eq!(json["unresolved"][0]["missing"][0], "Ghost");
}
