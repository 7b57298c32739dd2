//! Parser error types.
//!
//! Nothing in this crate aborts a block: every failure is scoped to one line
//! and surfaces as an [`ExtractionError`] recorded on a skipped line.

use serde::Serialize;

/// Why a classified line could not be turned into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionError {
    /// A `Start:` / `End:` line with nothing after the prefix.
    #[error("event declaration has no name")]
    MissingName,

    /// A `Task:` line whose name segment has no colon or no name.
    #[error("task declaration is malformed")]
    MalformedTask,

    /// A `Condition:` line with nothing after the prefix.
    #[error("gateway declaration has no condition")]
    MissingCondition,

    /// A `From:` line without two colon-delimited endpoint segments.
    #[error("sequence flow declaration is malformed")]
    MalformedFlow,

    /// The line does not declare anything.
    #[error("line is not a declaration")]
    NotADeclaration,
}

/// Convenience alias used by the extractor.
pub type Result<T> = std::result::Result<T, ExtractionError>;
