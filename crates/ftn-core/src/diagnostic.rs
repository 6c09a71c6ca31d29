//! Diagnostic types for error reporting.
//!
//! Diagnostics are pushed into a [`Diagnostics`] sink as compilation
//! proceeds; nothing in the front-end unwinds on a user error. The
//! [`verify`] submodule implements the `-verify` test harness that
//! matches emitted diagnostics against `! expected-error {{...}}`
//! annotations in the source.

use crate::source::{SourceMap, Span};
use std::fmt;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    /// Follow-on notes, e.g. "previous declaration" with its location.
    pub notes: Vec<(String, Option<Span>)>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>, span: Option<Span>) -> Self {
        self.notes.push((note.into(), span));
        self
    }

    /// Render as `path:line:col: severity: message` with note follow-ons.
    pub fn render(&self, source_map: &SourceMap) -> String {
        let mut output = String::new();
        render_line(
            &mut output,
            self.severity.as_str(),
            &self.message,
            self.span,
            source_map,
        );
        for (note, span) in &self.notes {
            output.push('\n');
            render_line(&mut output, "note", note, *span, source_map);
        }
        output
    }
}

fn render_line(
    out: &mut String,
    severity: &str,
    message: &str,
    span: Option<Span>,
    source_map: &SourceMap,
) {
    if let Some(span) = span {
        if let Some(source) = source_map.get(span.source) {
            let (line, col) = source.line_col(span.start);
            out.push_str(&format!(
                "{}:{}:{}: {}: {}",
                source.name(),
                line,
                col,
                severity,
                message
            ));
            return;
        }
    }
    out.push_str(&format!("{}: {}", severity, message));
}

/// A collection of diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::error(message).with_span(span));
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::warning(message).with_span(span));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Render all diagnostics.
    pub fn render(&self, source_map: &SourceMap) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.render(source_map))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diag in &self.diagnostics {
            writeln!(f, "{}: {}", diag.severity.as_str(), diag.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

pub mod verify {
    //! The verify-diagnostic consumer.
    //!
    //! A test input annotates its expectations in comments:
    //!
    //! ```text
    //! X = C  ! expected-error {{incompatible types in assignment}}
    //! ```
    //!
    //! Each annotation asserts that a diagnostic of that severity, whose
    //! message contains the braced substring, is emitted for the line the
    //! comment appears on. Verification fails on missing expectations and
    //! on unexpected diagnostics alike.

    use super::{Diagnostics, Severity};
    use crate::source::{SourceId, SourceMap};

    /// One `expected-*` annotation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Expectation {
        pub severity: Severity,
        /// 1-based line the annotation is anchored to.
        pub line: usize,
        /// Substring the diagnostic message must contain.
        pub message: String,
    }

    const DIRECTIVES: [(&str, Severity); 3] = [
        ("expected-error", Severity::Error),
        ("expected-warning", Severity::Warning),
        ("expected-note", Severity::Note),
    ];

    /// Scan a source buffer for `expected-*` annotations.
    pub fn parse_expectations(content: &str) -> Vec<Expectation> {
        let mut expectations = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let mut rest = line;
            while let Some(pos) = rest.find("expected-") {
                let tail = &rest[pos..];
                let Some((directive, severity)) = DIRECTIVES
                    .iter()
                    .find(|(d, _)| tail.starts_with(d))
                    .copied()
                else {
                    rest = &rest[pos + 1..];
                    continue;
                };
                let after = &tail[directive.len()..];
                let Some(open) = after.find("{{") else {
                    rest = &rest[pos + 1..];
                    continue;
                };
                let Some(close) = after[open..].find("}}") else {
                    rest = &rest[pos + 1..];
                    continue;
                };
                expectations.push(Expectation {
                    severity,
                    line: idx + 1,
                    message: after[open + 2..open + close].to_string(),
                });
                rest = &tail[directive.len()..];
            }
        }
        expectations
    }

    /// Match emitted diagnostics against the annotations in `source`.
    ///
    /// Returns the list of verification failures; empty means the file
    /// verified cleanly.
    pub fn check(
        source: SourceId,
        diagnostics: &Diagnostics,
        source_map: &SourceMap,
    ) -> Vec<String> {
        let Some(src) = source_map.get(source) else {
            return vec!["verify: unknown source buffer".to_string()];
        };
        let mut expectations = parse_expectations(&src.content);
        let mut failures = Vec::new();

        let mut check_one = |severity: Severity, line: usize, message: &str| {
            if let Some(pos) = expectations.iter().position(|e| {
                e.severity == severity && e.line == line && message.contains(&e.message)
            }) {
                expectations.remove(pos);
            } else {
                failures.push(format!(
                    "unexpected {} at line {}: {}",
                    severity.as_str(),
                    line,
                    message
                ));
            }
        };

        for diag in diagnostics.iter() {
            let line = diag
                .span
                .filter(|s| s.source == source)
                .map(|s| src.line_col(s.start).0)
                .unwrap_or(0);
            check_one(diag.severity, line, &diag.message);
            for (note, note_span) in &diag.notes {
                let line = note_span
                    .filter(|s| s.source == source)
                    .map(|s| src.line_col(s.start).0)
                    .unwrap_or(0);
                check_one(Severity::Note, line, note);
            }
        }

        for exp in &expectations {
            failures.push(format!(
                "missing expected {} at line {}: {{{{{}}}}}",
                exp.severity.as_str(),
                exp.line,
                exp.message
            ));
        }

        failures
    }
}

#[cfg(test)]
mod tests {
    use super::verify::{check, parse_expectations};
    use super::*;
    use crate::source::{SourceForm, SourceMap};

    #[test]
    fn test_has_errors() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());
        diags.push(Diagnostic::warning("just a warning"));
        assert!(!diags.has_errors());
        diags.push(Diagnostic::error("a real problem"));
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_parse_expectations() {
        let src = "X = C ! expected-error {{incompatible types}}\n\
                   Y = 1\n\
                   ! expected-warning {{unused}} expected-note {{declared here}}\n";
        let exps = parse_expectations(src);
        assert_eq!(exps.len(), 3);
        assert_eq!(exps[0].severity, Severity::Error);
        assert_eq!(exps[0].line, 1);
        assert_eq!(exps[0].message, "incompatible types");
        assert_eq!(exps[1].severity, Severity::Warning);
        assert_eq!(exps[2].severity, Severity::Note);
        assert_eq!(exps[2].line, 3);
    }

    #[test]
    fn test_verify_matches() {
        let mut map = SourceMap::new();
        let id = map.add_inline(
            "X = C ! expected-error {{incompatible types}}\n",
            SourceForm::Free,
        );

        let mut diags = Diagnostics::new();
        diags.error(
            crate::source::Span::new(id, 0, 1),
            "incompatible types in assignment ('REAL' and 'CHARACTER')",
        );

        assert!(check(id, &diags, &map).is_empty());
    }

    #[test]
    fn test_verify_flags_missing_and_unexpected() {
        let mut map = SourceMap::new();
        let id = map.add_inline(
            "X = C ! expected-error {{no such message}}\n",
            SourceForm::Free,
        );

        let mut diags = Diagnostics::new();
        diags.error(crate::source::Span::new(id, 0, 1), "something else entirely");

        let failures = check(id, &diags, &map);
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("unexpected error"));
        assert!(failures[1].contains("missing expected error"));
    }
}
