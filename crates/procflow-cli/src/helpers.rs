//! Shared helpers for the CLI: tracing setup, input reading, and report
//! rendering.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use procflow_parse::{BlockReport, SkippedLine, UnresolvedFlow};
use procflow_store::{CommitResult, StoredBlock, StoredFlow, TableCounts};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the global tracing subscriber. `RUST_LOG` wins over
/// `default_level`. Logs go to stderr so reports on stdout stay clean.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Read a block from `file`, or from stdin when `None`.
pub fn read_block(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read block from stdin")?;
            Ok(text)
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_report(report: &BlockReport) -> String {
    let mut out = format!(
        "  Events:   {}\n  Tasks:    {}\n  Gateways: {}\n  Flows:    {}\n",
        report.events, report.tasks, report.gateways, report.flows
    );
    render_diagnostics(&mut out, &report.skipped, &report.unresolved);
    out
}

pub fn render_commit(result: &CommitResult) -> String {
    let mut out = format!(
        "  Block {}\n  Committed {} events, {} tasks, {} gateways, {} flows\n",
        result.block_id, result.events, result.tasks, result.gateways, result.flows
    );
    render_diagnostics(&mut out, &result.skipped, &result.unresolved);
    out
}

pub fn render_counts(counts: &TableCounts) -> String {
    format!(
        "  Blocks:   {}\n  Events:   {}\n  Tasks:    {}\n  Gateways: {}\n  Flows:    {}\n",
        counts.blocks, counts.events, counts.tasks, counts.gateways, counts.sequence_flows
    )
}

/// Block header followed by its source text, numbered like diagnostics.
pub fn render_block(block: &StoredBlock) -> String {
    let mut out = format!(
        "  Block {} ({} skipped, {} unresolved)\n  Source:\n",
        block.id, block.skipped_lines, block.unresolved_flows
    );
    for (idx, line) in block.input_text.lines().enumerate() {
        out.push_str(&format!("    {:>3} | {line}\n", idx + 1));
    }
    out
}

pub fn render_flows(flows: &[StoredFlow]) -> String {
    let mut out = String::new();
    for flow in flows {
        out.push_str(&format!(
            "  {} ({}) -> {} ({})",
            flow.from_name, flow.from_kind, flow.to_name, flow.to_kind
        ));
        if let Some(condition) = &flow.condition {
            out.push_str(&format!(" [{condition}]"));
        }
        out.push('\n');
    }
    out
}

fn render_diagnostics(out: &mut String, skipped: &[SkippedLine], unresolved: &[UnresolvedFlow]) {
    if !skipped.is_empty() {
        out.push_str(&format!("  Skipped lines ({}):\n", skipped.len()));
        for line in skipped {
            out.push_str(&format!("    line {}: {} -- {}\n", line.line, line.reason, line.text));
        }
    }
    if !unresolved.is_empty() {
        out.push_str(&format!("  Unresolved flows ({}):\n", unresolved.len()));
        for flow in unresolved {
            out.push_str(&format!(
                "    line {}: {} -> {} (unknown: {})\n",
                flow.line,
                flow.from,
                flow.to,
                flow.missing.join(", ")
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
