//! Reference resolver: binds symbolic flow endpoints to elements.
//!
//! A [`NameIndex`] maps trimmed names to the most recently declared event or
//! task of that name. Gateways have no name and are never indexed, so a flow
//! naming a gateway's condition text stays unresolved.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::graph::{ElementKind, Event, Gateway, LocalId, ProcessGraph, SkippedLine, Task};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A resolved flow endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub id: LocalId,
    pub kind: ElementKind,
}

/// A sequence flow whose endpoints point at concrete elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceFlow {
    /// 1-based line number of the `From:` declaration.
    pub line: usize,
    pub from: Endpoint,
    pub to: Endpoint,
    pub condition: Option<String>,
}

/// A flow declaration with at least one endpoint name that matched nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedFlow {
    pub line: usize,
    pub from: String,
    pub to: String,
    pub condition: Option<String>,
    /// The endpoint names that failed to resolve, `from` before `to`.
    pub missing: Vec<String>,
}

/// Outcome of resolving one block.
///
/// Holds the elements, the flows that resolved, the flows that did not, and
/// the lines skipped during extraction. Unresolved flows are never part of
/// [`ResolvedGraph::flows`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedGraph {
    events: Vec<Event>,
    tasks: Vec<Task>,
    gateways: Vec<Gateway>,
    flows: Vec<SequenceFlow>,
    unresolved: Vec<UnresolvedFlow>,
    skipped: Vec<SkippedLine>,
    #[serde(skip)]
    source: String,
}

impl ResolvedGraph {
    /// Attach the raw text this graph was parsed from.
    pub fn with_source(mut self, text: impl Into<String>) -> Self {
        self.source = text.into();
        self
    }

    /// The raw block text, empty unless set through [`with_source`](Self::with_source).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn gateways(&self) -> &[Gateway] {
        &self.gateways
    }

    pub fn flows(&self) -> &[SequenceFlow] {
        &self.flows
    }

    pub fn unresolved(&self) -> &[UnresolvedFlow] {
        &self.unresolved
    }

    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    /// Number of committable elements (events, tasks and gateways).
    pub fn element_count(&self) -> usize {
        self.events.len() + self.tasks.len() + self.gateways.len()
    }
}

// ---------------------------------------------------------------------------
// Name index
// ---------------------------------------------------------------------------

/// Lookup from trimmed element name to its latest declaration.
#[derive(Debug, Default)]
pub struct NameIndex {
    entries: HashMap<String, Endpoint>,
}

impl NameIndex {
    /// Index every event and task of `graph` in declaration order.
    pub fn from_graph(graph: &ProcessGraph) -> Self {
        let mut declared: Vec<(&str, Endpoint)> = graph
            .events()
            .iter()
            .map(|e| (e.name.as_str(), endpoint(e.id, ElementKind::Event)))
            .chain(
                graph
                    .tasks()
                    .iter()
                    .map(|t| (t.name.as_str(), endpoint(t.id, ElementKind::Task))),
            )
            .collect();
        declared.sort_by_key(|(_, ep)| ep.id);

        let mut index = Self::default();
        for (name, ep) in declared {
            index.insert(name, ep);
        }
        index
    }

    /// Record `name`; a later insert for the same name replaces the earlier one.
    pub fn insert(&mut self, name: &str, ep: Endpoint) {
        if let Some(previous) = self.entries.insert(name.trim().to_owned(), ep) {
            debug!(name = name.trim(), shadowed = %previous.id, by = %ep.id, "duplicate element name");
        }
    }

    pub fn get(&self, name: &str) -> Option<Endpoint> {
        self.entries.get(name.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn endpoint(id: LocalId, kind: ElementKind) -> Endpoint {
    Endpoint { id, kind }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve every buffered flow of `graph` against its events and tasks.
pub fn resolve(graph: &ProcessGraph) -> ResolvedGraph {
    let index = NameIndex::from_graph(graph);

    let mut flows = Vec::with_capacity(graph.flows().len());
    let mut unresolved = Vec::new();

    for flow in graph.flows() {
        match (index.get(&flow.from), index.get(&flow.to)) {
            (Some(from), Some(to)) => flows.push(SequenceFlow {
                line: flow.line,
                from,
                to,
                condition: flow.condition.clone(),
            }),
            (from, to) => {
                let missing: Vec<String> = [(from, &flow.from), (to, &flow.to)]
                    .into_iter()
                    .filter(|(found, _)| found.is_none())
                    .map(|(_, name)| name.trim().to_owned())
                    .collect();
                warn!(line = flow.line, missing = ?missing, "unresolved sequence flow");
                unresolved.push(UnresolvedFlow {
                    line: flow.line,
                    from: flow.from.clone(),
                    to: flow.to.clone(),
                    condition: flow.condition.clone(),
                    missing,
                });
            }
        }
    }

    debug!(
        resolved = flows.len(),
        unresolved = unresolved.len(),
        names = index.len(),
        "references resolved"
    );

    ResolvedGraph {
        events: graph.events().to_vec(),
        tasks: graph.tasks().to_vec(),
        gateways: graph.gateways().to_vec(),
        flows,
        unresolved,
        skipped: graph.skipped().to_vec(),
        source: String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LineKind;
    use crate::extract::Fields;
    use crate::graph::{ParsedLine, build};

    fn graph(lines: Vec<(LineKind, Fields)>) -> ProcessGraph {
        build(
            lines
                .into_iter()
                .enumerate()
                .map(|(i, (kind, fields))| ParsedLine {
                    number: i + 1,
                    text: String::new(),
                    kind,
                    fields: Ok(fields),
                }),
        )
    }

    fn task(name: &str, performer: &str) -> (LineKind, Fields) {
        (
            LineKind::Task,
            Fields::Task {
                name: name.into(),
                performer: Some(performer.into()),
            },
        )
    }

    fn start(name: &str) -> (LineKind, Fields) {
        (LineKind::StartEvent, Fields::Event { name: name.into() })
    }

    fn flow(from: &str, to: &str) -> (LineKind, Fields) {
        (
            LineKind::SequenceFlow,
            Fields::Flow {
                from: from.into(),
                to: to.into(),
                condition: None,
            },
        )
    }

    #[test]
    fn resolves_event_to_task() {
        let g = graph(vec![start("Begin"), task("Work", "Me"), flow("Begin", "Work")]);
        let resolved = resolve(&g);

        assert_eq!(resolved.flows().len(), 1);
        let f = &resolved.flows()[0];
        assert_eq!(f.from.kind, ElementKind::Event);
        assert_eq!(f.to.kind, ElementKind::Task);
        assert_eq!(f.from.id, g.events()[0].id);
        assert_eq!(f.to.id, g.tasks()[0].id);
        assert!(resolved.unresolved().is_empty());
    }

    #[test]
    fn forward_references_resolve() {
        let g = graph(vec![flow("Begin", "Work"), start("Begin"), task("Work", "Me")]);
        assert_eq!(resolve(&g).flows().len(), 1);
    }

    #[test]
    fn last_declaration_wins_for_duplicate_names() {
        let g = graph(vec![
            task("A", "X"),
            task("B", "Z"),
            task("A", "Y"),
            flow("A", "B"),
        ]);
        let resolved = resolve(&g);

        let from = resolved.flows()[0].from.id;
        let bound = g.tasks().iter().find(|t| t.id == from).unwrap();
        assert_eq!(bound.performer.as_deref(), Some("Y"));
    }

    #[test]
    fn last_declaration_wins_across_kinds() {
        let g = graph(vec![task("Done", "X"), start("Done"), task("B", "Z"), flow("Done", "B")]);
        let resolved = resolve(&g);
        assert_eq!(resolved.flows()[0].from.kind, ElementKind::Event);
    }

    #[test]
    fn unknown_names_are_reported() {
        let g = graph(vec![task("B", "Z"), flow("Ghost", "B"), flow("Ghost", "Phantom")]);
        let resolved = resolve(&g);

        assert!(resolved.flows().is_empty());
        assert_eq!(resolved.unresolved().len(), 2);
        assert_eq!(resolved.unresolved()[0].missing, vec!["Ghost".to_string()]);
        assert_eq!(
            resolved.unresolved()[1].missing,
            vec!["Ghost".to_string(), "Phantom".to_string()]
        );
    }

    #[test]
    fn gateways_are_not_flow_endpoints() {
        let g = graph(vec![
            task("A", "X"),
            (
                LineKind::GatewayCondition,
                Fields::Gateway {
                    condition: "approved".into(),
                },
            ),
            flow("A", "approved"),
        ]);
        let resolved = resolve(&g);
        assert!(resolved.flows().is_empty());
        assert_eq!(resolved.unresolved()[0].missing, vec!["approved".to_string()]);
    }

    #[test]
    fn names_are_case_sensitive() {
        let g = graph(vec![task("Review", "X"), task("B", "Y"), flow("review", "B")]);
        assert_eq!(resolve(&g).unresolved().len(), 1);
    }

    #[test]
    fn index_trims_names() {
        let mut index = NameIndex::default();
        assert!(index.is_empty());
        index.insert("  Fill form ", endpoint(LocalId(3), ElementKind::Task));
        assert_eq!(index.get("Fill form").map(|e| e.id), Some(LocalId(3)));
        assert_eq!(index.get(" Fill form").map(|e| e.id), Some(LocalId(3)));
    }

    #[test]
    fn resolve_leaves_input_untouched() {
        let g = graph(vec![task("A", "X"), flow("A", "Ghost")]);
        let before = g.flows().to_vec();
        let _ = resolve(&g);
        assert_eq!(g.flows(), before.as_slice());
    }
}
