//! In-memory process graph and the builder that accumulates it.
//!
//! Elements live in per-kind arenas and are addressed by [`LocalId`]. All
//! element kinds draw from a single counter, so a higher id always means a
//! later declaration in the block. Sequence flows are buffered with
//! symbolic endpoint names and resolved only once the block is complete.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::classify::LineKind;
use crate::error::ExtractionError;
use crate::extract::Fields;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Block-local element identifier, assigned in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LocalId(pub u32);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a process event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    End,
    Intermediate,
}

impl EventKind {
    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Intermediate => "intermediate",
        }
    }
}

/// Kind of element a sequence flow endpoint points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Event,
    Task,
}

impl ElementKind {
    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: LocalId,
    pub name: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: LocalId,
    pub name: String,
    pub performer: Option<String>,
}

/// A branching point. Gateways carry only their condition text and are
/// never addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gateway {
    pub id: LocalId,
    pub condition: String,
}

/// A `From:` declaration whose endpoints have not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolicFlow {
    /// 1-based line number in the block.
    pub line: usize,
    pub from: String,
    pub to: String,
    pub condition: Option<String>,
}

/// A declaration line that could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    /// 1-based line number in the block.
    pub line: usize,
    pub text: String,
    pub reason: ExtractionError,
}

/// One classified line together with its extraction outcome.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub number: usize,
    pub text: String,
    pub kind: LineKind,
    pub fields: Result<Fields, ExtractionError>,
}

/// Everything declared by one block of text.
///
/// Built once by [`GraphBuilder`] and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessGraph {
    events: Vec<Event>,
    tasks: Vec<Task>,
    gateways: Vec<Gateway>,
    flows: Vec<SymbolicFlow>,
    skipped: Vec<SkippedLine>,
}

impl ProcessGraph {
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn gateways(&self) -> &[Gateway] {
        &self.gateways
    }

    /// Buffered flow declarations, in block order.
    pub fn flows(&self) -> &[SymbolicFlow] {
        &self.flows
    }

    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    /// Number of declared elements (events, tasks and gateways).
    pub fn element_count(&self) -> usize {
        self.events.len() + self.tasks.len() + self.gateways.len()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Single-pass, append-only accumulator for a [`ProcessGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: ProcessGraph,
    next_id: u32,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one parsed line into the graph.
    ///
    /// Ignored lines are dropped; extraction failures become skipped lines.
    pub fn push(&mut self, line: ParsedLine) {
        if line.kind == LineKind::Ignored {
            return;
        }

        let fields = match line.fields {
            Ok(fields) => fields,
            Err(reason) => {
                debug!(line = line.number, %reason, "skipping malformed line");
                self.graph.skipped.push(SkippedLine {
                    line: line.number,
                    text: line.text,
                    reason,
                });
                return;
            }
        };

        match (line.kind, fields) {
            (LineKind::StartEvent, Fields::Event { name }) => self.add_event(name, EventKind::Start),
            (LineKind::EndEvent, Fields::Event { name }) => self.add_event(name, EventKind::End),
            (LineKind::Task, Fields::Task { name, performer }) => {
                let id = self.next_local_id();
                self.graph.tasks.push(Task {
                    id,
                    name,
                    performer,
                });
            }
            (LineKind::GatewayCondition, Fields::Gateway { condition }) => {
                let id = self.next_local_id();
                self.graph.gateways.push(Gateway { id, condition });
            }
            (LineKind::SequenceFlow, Fields::Flow { from, to, condition }) => {
                self.graph.flows.push(SymbolicFlow {
                    line: line.number,
                    from,
                    to,
                    condition,
                });
            }
            (kind, _) => {
                // Kind and fields disagree; only reachable with hand-built lines.
                self.graph.skipped.push(SkippedLine {
                    line: line.number,
                    text: line.text,
                    reason: mismatch_reason(kind),
                });
            }
        }
    }

    /// Finish the block.
    pub fn finish(self) -> ProcessGraph {
        debug!(
            events = self.graph.events.len(),
            tasks = self.graph.tasks.len(),
            gateways = self.graph.gateways.len(),
            flows = self.graph.flows.len(),
            skipped = self.graph.skipped.len(),
            "process graph built"
        );
        self.graph
    }

    fn add_event(&mut self, name: String, kind: EventKind) {
        let id = self.next_local_id();
        self.graph.events.push(Event { id, name, kind });
    }

    fn next_local_id(&mut self) -> LocalId {
        self.next_id += 1;
        LocalId(self.next_id)
    }
}

fn mismatch_reason(kind: LineKind) -> ExtractionError {
    match kind {
        LineKind::StartEvent | LineKind::EndEvent => ExtractionError::MissingName,
        LineKind::Task => ExtractionError::MalformedTask,
        LineKind::GatewayCondition => ExtractionError::MissingCondition,
        LineKind::SequenceFlow => ExtractionError::MalformedFlow,
        LineKind::Ignored => ExtractionError::NotADeclaration,
    }
}

/// Build a graph from a sequence of parsed lines.
pub fn build<I>(lines: I) -> ProcessGraph
where
    I: IntoIterator<Item = ParsedLine>,
{
    let mut builder = GraphBuilder::new();
    for line in lines {
        builder.push(line);
    }
    builder.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
