//! Block pipeline: classify → extract → build → resolve.
//!
//! Everything here is pure. Persisting the result is the store crate's job.

use serde::Serialize;
use tracing::info;

use crate::classify::classify;
use crate::extract::extract;
use crate::graph::{self, ParsedLine, ProcessGraph, SkippedLine};
use crate::resolve::{self, ResolvedGraph, UnresolvedFlow};

/// Classify and extract every line of `text`, numbering lines from 1.
///
/// A leading byte-order mark is dropped.
pub fn parse_lines(text: &str) -> impl Iterator<Item = ParsedLine> + '_ {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.lines().enumerate().map(|(idx, raw)| {
        let kind = classify(raw);
        ParsedLine {
            number: idx + 1,
            text: raw.trim().to_owned(),
            kind,
            fields: extract(kind, raw),
        }
    })
}

/// Build the unresolved graph of one block.
pub fn build_block(text: &str) -> ProcessGraph {
    graph::build(parse_lines(text))
}

/// Run the whole pure pipeline over one block. The result keeps `text` as
/// its source.
pub fn parse_block(text: &str) -> ResolvedGraph {
    let graph = build_block(text);
    let resolved = resolve::resolve(&graph).with_source(text);

    info!(
        events = resolved.events().len(),
        tasks = resolved.tasks().len(),
        gateways = resolved.gateways().len(),
        flows = resolved.flows().len(),
        unresolved = resolved.unresolved().len(),
        skipped = resolved.skipped().len(),
        "block parsed"
    );

    resolved
}

/// Serializable summary of a parsed block, for dry runs.
#[derive(Debug, Clone, Serialize)]
pub struct BlockReport {
    pub events: usize,
    pub tasks: usize,
    pub gateways: usize,
    pub flows: usize,
    pub unresolved: Vec<UnresolvedFlow>,
    pub skipped: Vec<SkippedLine>,
}

impl BlockReport {
    /// `true` when every declaration line was usable.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.skipped.is_empty()
    }
}

impl From<&ResolvedGraph> for BlockReport {
    fn from(graph: &ResolvedGraph) -> Self {
        Self {
            events: graph.events().len(),
            tasks: graph.tasks().len(),
            gateways: graph.gateways().len(),
            flows: graph.flows().len(),
            unresolved: graph.unresolved().to_vec(),
            skipped: graph.skipped().to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
