//! Process-text parsing for procflow.
//!
//! This crate provides the pure half of the ingest pipeline:
//!
//! - **Classification**: which declaration a line holds, via [`classify()`].
//! - **Extraction**: splitting a line into labeled [`Fields`], via [`extract()`].
//! - **Graph building**: arena-style [`ProcessGraph`] with block-local ids.
//! - **Resolution**: binding flow endpoint names to elements, via
//!   [`resolve()`], with last-writer-wins lookup for duplicate names.
//!
//! [`parse_block`] chains all four over a text block. Nothing here performs
//! I/O; the store crate commits the resulting [`ResolvedGraph`].

pub mod classify;
pub mod error;
pub mod extract;
pub mod graph;
pub mod pipeline;
pub mod resolve;

pub use classify::{LineKind, classify};
pub use error::ExtractionError;
pub use extract::{Fields, extract};
pub use graph::{
    ElementKind, Event, EventKind, Gateway, GraphBuilder, LocalId, ParsedLine, ProcessGraph,
    SkippedLine, SymbolicFlow, Task, build,
};
pub use pipeline::{BlockReport, build_block, parse_block, parse_lines};
pub use resolve::{Endpoint, NameIndex, ResolvedGraph, SequenceFlow, UnresolvedFlow, resolve};
