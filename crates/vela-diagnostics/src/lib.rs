//! Vela Diagnostics
//!
//! Reports produced by `vela-types`, and a terminal renderer for them.
//! A [`Diagnostic`] is an error with a stable code, labelled source spans
//! and attached notes or help lines.
//!
//! ```rust
//! use vela_diagnostics::{Diagnostic, Severity};
//! use vela_diagnostics::span::SourceSpan;
//!
//! let diagnostic = Diagnostic::error("E0001", "type mismatch")
//!     .with_primary_span(SourceSpan::new("main.vela", 20, 22), "expected `String`, found `Int`")
//!     .with_child(Diagnostic::help("convert the value with `to_string`"));
//!
//! assert_eq!(diagnostic.severity, Severity::Error);
//! assert_eq!(diagnostic.code, Some("E0001"));
//! assert_eq!(diagnostic.children[0].severity, Severity::Help);
//! ```

pub mod render;
pub mod span;

use span::{MultiSpan, SourceSpan};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Rejects the program.
    Error,
    /// Context for a parent diagnostic.
    Note,
    /// A fix or a likely intended name.
    Help,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Note => "note",
            Severity::Help => "help",
        }
    }
}

/// One report. Children are rendered as `= note:` / `= help:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// `E0xxx` types, `E1xxx` names, `E5xxx` effects. Children carry none.
    pub code: Option<&'static str>,
    pub message: String,
    pub spans: MultiSpan,
    pub children: Vec<Diagnostic>,
}

impl Diagnostic {
    fn bare(severity: Severity, code: Option<&'static str>, message: String) -> Self {
        Self {
            severity,
            code,
            message,
            spans: MultiSpan::new(),
            children: Vec::new(),
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::bare(Severity::Error, Some(code), message.into())
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::bare(Severity::Note, None, message.into())
    }

    pub fn help(message: impl Into<String>) -> Self {
        Self::bare(Severity::Help, None, message.into())
    }

    /// The location the header points at. The first primary span wins.
    pub fn with_primary_span(mut self, span: SourceSpan, message: impl Into<String>) -> Self {
        self.spans.push_primary(span, message);
        self
    }

    pub fn with_secondary_span(mut self, span: SourceSpan, message: impl Into<String>) -> Self {
        self.spans.push_secondary(span, message);
        self
    }

    pub fn with_child(mut self, child: Diagnostic) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `<base>/<code>`, for diagnostics that have a code.
    pub fn docs_url(&self, base_url: &str) -> Option<String> {
        self.code.map(|code| format!("{}/{}", base_url.trim_end_matches('/'), code))
    }
}

pub type DiagnosticResult<T> = Result<T, DiagnosticError>;

/// Failures while writing a report.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("failed to write diagnostic: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_keeps_label_order() {
        let diag = Diagnostic::error("E0001", "type mismatch")
            .with_secondary_span(SourceSpan::new("a.vela", 30, 34), "expected due to this")
            .with_primary_span(SourceSpan::new("a.vela", 10, 20), "expected `Int`")
            .with_child(Diagnostic::note("types must match"));

        assert!(diag.is_error());
        assert_eq!(diag.spans.primary_span(), Some(&SourceSpan::new("a.vela", 10, 20)));
        assert_eq!(diag.spans.labels().len(), 2);
        assert_eq!(diag.children[0].severity.as_str(), "note");
        assert_eq!(diag.children[0].code, None);
        assert!(!diag.children[0].is_error());
    }

    #[test]
    fn test_docs_url() {
        let diag = Diagnostic::error("E1001", "undefined variable");
        assert_eq!(
            diag.docs_url("https://vela-lang.org/errors/"),
            Some("https://vela-lang.org/errors/E1001".to_string())
        );
        assert_eq!(Diagnostic::help("x").docs_url("u"), None);
    }
}
