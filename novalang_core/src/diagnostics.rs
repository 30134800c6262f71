//! The diagnostic reporter (§2 "Diagnostic reporter", §6.5).
//!
//! Grounded on the teacher's `compile/diagnostics.rs`: a side-channel
//! collector threaded through compilation rather than surfaced as a
//! `Result` error, so a single unit can accumulate many diagnostics
//! (§4.3 "Diagnostics accumulate; the analyzer never throws for a user
//! error").

use novalang_parser::span::{Span, SourceMap};
use serde::{Deserialize, Serialize};

/// Severity vocabulary (§4.3, §6.5). Fixed, four-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        }
    }
}

/// One diagnostic: a message, severity, and the span it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub file_name: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        span: Span,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            span,
            file_name: file_name.into(),
        }
    }

    pub fn error(message: impl Into<String>, span: Span, file_name: impl Into<String>) -> Self {
        Self::new(Severity::Error, message, span, file_name)
    }

    pub fn warning(message: impl Into<String>, span: Span, file_name: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message, span, file_name)
    }

    /// Render per the exact §6.5 format:
    ///
    /// ```text
    /// [<severity>] (<file>:<line>:<col>) <message>
    ///   --> <file>:<line>:<col>
    ///    |
    ///  <n> | <source line>
    ///      | <spaces>^^^^
    /// ```
    ///
    /// Columns are 1-based. The underline length equals the offending
    /// token's length, minimum 1. `source` must be the text that produced
    /// `map`.
    pub fn render(&self, source: &str, map: &SourceMap) -> String {
        let line = self.span.start_line;
        let col = self.span.start_column;
        let gutter = line.to_string().len();
        let source_line = map.line_text(source, line).unwrap_or("");
        let underline_len = self.span.len().max(1);
        let mut out = String::new();
        out.push_str(&format!(
            "[{}] ({}:{}:{}) {}\n",
            self.severity.as_str(),
            self.file_name,
            line,
            col,
            self.message
        ));
        out.push_str(&format!(
            "  --> {}:{}:{}\n",
            self.file_name, line, col
        ));
        out.push_str(&format!("{:width$} |\n", "", width = gutter));
        out.push_str(&format!("{line} | {source_line}\n", line = line, source_line = source_line));
        out.push_str(&format!(
            "{:width$} | {:indent$}{}\n",
            "",
            "",
            "^".repeat(underline_len),
            width = gutter,
            indent = col.saturating_sub(1)
        ));
        out
    }
}

/// Warnings promoted to errors in strict mode (§4.3, §9 Open Question 1).
/// These three are the complete, enumerated set; anything else reported
/// as a `Warning` stays a warning even in strict mode.
pub const STRICT_PROMOTED: &[&str] = &[
    "shadowed-declaration",
    "unreachable-code",
    "unused-private-declaration",
];

/// A tagged warning kind, used only to decide strict-mode promotion; the
/// rendered message itself is freeform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    ShadowedDeclaration,
    UnreachableCode,
    UnusedPrivateDeclaration,
    Other,
}

impl WarningKind {
    fn tag(&self) -> Option<&'static str> {
        match self {
            WarningKind::ShadowedDeclaration => Some("shadowed-declaration"),
            WarningKind::UnreachableCode => Some("unreachable-code"),
            WarningKind::UnusedPrivateDeclaration => Some("unused-private-declaration"),
            WarningKind::Other => None,
        }
    }

    fn is_strict_promoted(&self) -> bool {
        self.tag()
            .map(|t| STRICT_PROMOTED.contains(&t))
            .unwrap_or(false)
    }
}

/// Collects diagnostics across a compilation unit (§6.5) and exposes
/// strict-mode promotion (§4.3: "In strict mode, warnings are promoted
/// to errors").
#[derive(Debug, Default, Clone)]
pub struct DiagnosticReporter {
    diagnostics: Vec<Diagnostic>,
    strict: bool,
}

impl DiagnosticReporter {
    pub fn new(strict: bool) -> Self {
        Self {
            diagnostics: Vec::new(),
            strict,
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Report a warning of a known `kind`; promoted to `Severity::Error`
    /// when in strict mode and `kind` is in [`STRICT_PROMOTED`].
    pub fn report_warning(
        &mut self,
        kind: WarningKind,
        message: impl Into<String>,
        span: Span,
        file_name: impl Into<String>,
    ) {
        let severity = if self.strict && kind.is_strict_promoted() {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.report(Diagnostic::new(severity, message, span, file_name));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Merge diagnostics from several units into one list, in a
    /// deterministic order: by file name, then by source order within a
    /// file (§5 "Ordering guarantees").
    pub fn merge_in_order(units: Vec<Vec<Diagnostic>>) -> Vec<Diagnostic> {
        let mut all: Vec<Diagnostic> = units.into_iter().flatten().collect();
        all.sort_by(|a, b| {
            a.file_name
                .cmp(&b.file_name)
                .then(a.span.start.cmp(&b.span.start))
        });
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(line: usize, col: usize, len: usize) -> Span {
        Span::new(0, 0, len, line, line, col, col + len)
    }

    #[test]
    fn renders_exact_format() {
        let source = "val x = 1 +\n";
        let map = SourceMap::new(0, source);
        let diag = Diagnostic::error("unexpected end of input", span(1, 12, 1), "test.nova");
        let rendered = diag.render(source, &map);
        assert!(rendered.starts_with("[error] (test.nova:1:12) unexpected end of input\n"));
        assert!(rendered.contains("  --> test.nova:1:12\n"));
        assert!(rendered.contains("1 | val x = 1 +\n"));
        assert!(rendered.contains("^"));
    }

    #[test]
    fn underline_length_matches_span_minimum_one() {
        let source = "abc\n";
        let map = SourceMap::new(0, source);
        let diag = Diagnostic::error("bad", span(1, 1, 0), "f.nova");
        let rendered = diag.render(source, &map);
        let underline_line = rendered.lines().last().unwrap();
        assert!(underline_line.trim_end().ends_with('^'));
    }

    #[test]
    fn strict_mode_promotes_enumerated_warnings_only() {
        let mut reporter = DiagnosticReporter::new(true);
        reporter.report_warning(WarningKind::ShadowedDeclaration, "shadow", span(1, 1, 1), "f");
        reporter.report_warning(WarningKind::Other, "other", span(1, 1, 1), "f");
        let diags = reporter.diagnostics();
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[1].severity, Severity::Warning);
    }

    #[test]
    fn non_strict_mode_never_promotes() {
        let mut reporter = DiagnosticReporter::new(false);
        reporter.report_warning(WarningKind::UnreachableCode, "dead", span(1, 1, 1), "f");
        assert_eq!(reporter.diagnostics()[0].severity, Severity::Warning);
        assert!(!reporter.has_errors());
    }

    #[test]
    fn merge_in_order_sorts_by_file_then_position() {
        let b = vec![Diagnostic::error("b", span(1, 1, 1), "b.nova")];
        let a = vec![
            Diagnostic::error("a2", span(2, 1, 1), "a.nova"),
            Diagnostic::error("a1", span(1, 1, 1), "a.nova"),
        ];
        let merged = DiagnosticReporter::merge_in_order(vec![b, a]);
        assert_eq!(merged[0].message, "a1");
        assert_eq!(merged[1].message, "a2");
        assert_eq!(merged[2].message, "b");
    }
}
