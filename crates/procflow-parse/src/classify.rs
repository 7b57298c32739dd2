//! Line classifier: decides what a single line of a block declares.
//!
//! Classification is a prefix match on the trimmed line and is
//! case-sensitive:
//!
//! | prefix       | kind                          |
//! |--------------|-------------------------------|
//! | `Start:`     | [`LineKind::StartEvent`]       |
//! | `End:`       | [`LineKind::EndEvent`]         |
//! | `Task:`      | [`LineKind::Task`]             |
//! | `Condition:` | [`LineKind::GatewayCondition`] |
//! | `From:`      | [`LineKind::SequenceFlow`]     |
//!
//! A keyword without its colon is still given that keyword's kind, so the
//! extractor can report it as malformed, when the rest of the line looks like
//! a declaration: at most one word (`Task BrokenNoColon`) or `|`-separated
//! segments (`From A | To: B`). Everything else, including blank lines,
//! section headers such as `[EVENT]` and prose that merely opens with a
//! keyword (`End of response.`), is [`LineKind::Ignored`].

use serde::Serialize;

/// What a line declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    StartEvent,
    EndEvent,
    Task,
    GatewayCondition,
    SequenceFlow,
    Ignored,
}

impl LineKind {
    /// The keyword that introduces this kind, without its colon.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Self::StartEvent => Some("Start"),
            Self::EndEvent => Some("End"),
            Self::Task => Some("Task"),
            Self::GatewayCondition => Some("Condition"),
            Self::SequenceFlow => Some("From"),
            Self::Ignored => None,
        }
    }

    /// The full prefix (keyword plus colon) that introduces this kind.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Self::StartEvent => Some("Start:"),
            Self::EndEvent => Some("End:"),
            Self::Task => Some("Task:"),
            Self::GatewayCondition => Some("Condition:"),
            Self::SequenceFlow => Some("From:"),
            Self::Ignored => None,
        }
    }
}

const DECLARATIONS: [LineKind; 5] = [
    LineKind::StartEvent,
    LineKind::EndEvent,
    LineKind::Task,
    LineKind::GatewayCondition,
    LineKind::SequenceFlow,
];

/// Classify one line of a block.
pub fn classify(line: &str) -> LineKind {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Ignored;
    }

    for kind in DECLARATIONS {
        if let Some(prefix) = kind.prefix() {
            if line.starts_with(prefix) {
                return kind;
            }
        }
    }

    // Keyword present but colon missing.
    let (first_word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));
    if !looks_like_declaration(rest) {
        return LineKind::Ignored;
    }
    DECLARATIONS
        .into_iter()
        .find(|kind| kind.keyword() == Some(first_word))
        .unwrap_or(LineKind::Ignored)
}

fn looks_like_declaration(rest: &str) -> bool {
    rest.contains('|') || rest.split_whitespace().nth(1).is_none()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
