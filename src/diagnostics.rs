//! Diagnostics: not an error type, a *data* type embedded in the document tree (§3, §10.2).
//!
//! Every `Block::InvalidBlock` / `Span::InvalidSpan` node carries one of these, rendered to the
//! exact messages named in §4.4/§4.5/§7. Grounded on the teacher's `ParserError` in
//! `parser/infrastructure/error.rs`: a flat enum with hand-written `Display`, one variant per
//! failure mode, rather than a `thiserror` derive the teacher never reaches for.

use std::fmt;

/// One kind of structural or post-parse error, paired with the data needed to render its
/// message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum DiagnosticKind {
    UnknownDirective { name: String },
    MissingRequiredArgument,
    MissingRequiredOptions { names: Vec<String> },
    UnknownOptions { names: Vec<String> },
    MalformedTable,
    UnresolvedReference { id: String },
    UnresolvedFootnote { label: String },
    UnresolvedCitation { id: String },
    UnresolvedSubstitution { name: String },
    SubstitutionCycle { name: String },
    ConverterRejected { message: String },
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::UnknownDirective { name } => write!(f, "unknown directive: {}", name),
            DiagnosticKind::MissingRequiredArgument => write!(f, "missing required argument"),
            DiagnosticKind::MissingRequiredOptions { names } => {
                write!(f, "missing required options: {}", names.join(", "))
            }
            DiagnosticKind::UnknownOptions { names } => {
                write!(f, "unknown options: {}", names.join(", "))
            }
            DiagnosticKind::MalformedTable => write!(f, "malformed table"),
            DiagnosticKind::UnresolvedReference { id } => {
                write!(f, "unresolved reference: {}", id)
            }
            DiagnosticKind::UnresolvedFootnote { label } => {
                write!(f, "unresolved footnote: {}", label)
            }
            DiagnosticKind::UnresolvedCitation { id } => {
                write!(f, "unresolved citation: {}", id)
            }
            DiagnosticKind::UnresolvedSubstitution { name } => {
                write!(f, "unresolved substitution: {}", name)
            }
            DiagnosticKind::SubstitutionCycle { name } => {
                write!(f, "substitution cycle: {}", name)
            }
            DiagnosticKind::ConverterRejected { message } => write!(f, "{}", message),
        }
    }
}

/// A diagnostic anchored to the source fragment that produced it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub offset: usize,
    pub len: usize,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, offset: usize, len: usize) -> Self {
        Diagnostic { kind, offset, len }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// The thin `std::error::Error` surface for the test-only `consume_all`-wrapped unsafe entry
/// point mentioned in §7. Never reachable from `parse`/`parse_unresolved`/`parse_span_only`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserBug {
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for ParserBug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parser bug at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ParserBug {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_options_lists_all_names() {
        let kind = DiagnosticKind::MissingRequiredOptions {
            names: vec!["height".to_string(), "width".to_string()],
        };
        assert_eq!(kind.to_string(), "missing required options: height, width");
    }

    #[test]
    fn diagnostic_message_delegates_to_kind_display() {
        let diag = Diagnostic::new(DiagnosticKind::MalformedTable, 10, 5);
        assert_eq!(diag.message(), "malformed table");
    }

    #[test]
    fn parser_bug_formats_with_offset() {
        let bug = ParserBug {
            message: "unexpected state".to_string(),
            offset: 42,
        };
        assert_eq!(bug.to_string(), "parser bug at offset 42: unexpected state");
    }
}
