//! Ariadne-based diagnostic rendering for type errors.
//!
//! Renders a [`TypeError`] plus the original source text into a labeled,
//! human-facing report. The message text itself still comes from
//! `TypeError`'s `Display` impl (error.rs's contractual strings) -- this
//! module only adds an error code, a source-span label, and layout.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::error::TypeError;

/// Rendering knobs. Colorless by default so rendered output is stable
/// across terminals and safe to snapshot in tests.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticOptions {
    pub color: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions { color: false }
    }
}

/// A stable error code per [`TypeError`] variant, for tooling that wants
/// to match on error identity without parsing the message string.
fn error_code(err: &TypeError) -> &'static str {
    match err {
        TypeError::UnboundVariable { .. } => "E0001",
        TypeError::RecursiveType { .. } => "E0002",
        TypeError::Mismatch { .. } => "E0003",
        TypeError::MissingAttribute { .. } => "E0004",
        TypeError::ExtraneousAttribute { .. } => "E0005",
        TypeError::NoSuchAttribute { .. } => "E0006",
        TypeError::UndeclaredStruct { .. } => "E0007",
        TypeError::NoStructMatch { .. } => "E0008",
        TypeError::ReturnOutsideFunction { .. } => "E0009",
        TypeError::UnknownImplType { .. } => "E0010",
        TypeError::ExternSignatureMismatch { .. } => "E0011",
        TypeError::RecheckLimitExceeded { .. } => "E0012",
    }
}

/// Clamp a byte range to valid, non-empty bounds within `source`, since
/// ariadne requires at least a one-byte span to render a label.
fn clamp(range: Range<usize>, source_len: usize) -> Range<usize> {
    let start = range.start.min(source_len);
    let end = range.end.min(source_len).max(start);
    if start == end {
        start..end.saturating_add(1).min(source_len).max(start)
    } else {
        start..end
    }
}

/// Render `error` into a formatted diagnostic string. `_filename` is
/// accepted for interface parity with multi-file callers but unused --
/// ariadne's single-source `Report` API doesn't take a file id.
pub fn render_diagnostic(
    error: &TypeError,
    source: &str,
    _filename: &str,
    options: &DiagnosticOptions,
) -> String {
    let span = error.span();
    let range = clamp(span.start as usize..span.end as usize, source.len());

    let config = Config::default().with_color(options.color);
    let report = Report::build(ReportKind::Error, range.clone())
        .with_code(error_code(error))
        .with_message(error.to_string())
        .with_config(config)
        .with_label(
            Label::new(range)
                .with_message(error.to_string())
                .with_color(Color::Red),
        )
        .finish();

    let mut buf = Vec::new();
    report.write(Source::from(source), &mut buf).expect("ariadne writes to an in-memory buffer, which cannot fail");
    String::from_utf8(buf).expect("ariadne output is always valid UTF-8")
}

/// Render every error in `errors` against the same source, in order.
pub fn render_all(errors: &[TypeError], source: &str, filename: &str, options: &DiagnosticOptions) -> Vec<String> {
    errors.iter().map(|e| render_diagnostic(e, source, filename, options)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelang_common::Span;

    #[test]
    fn renders_mismatch_with_message_and_code() {
        let err = TypeError::Mismatch {
            expected: crate::ty::MonoTy::u32_ty(),
            found: crate::ty::MonoTy::bool_ty(),
            span: Span::new(3, 7),
        };
        let rendered = render_diagnostic(&err, "let x = true", "test.core", &DiagnosticOptions::default());
        assert!(rendered.contains("E0003"));
        assert!(rendered.contains("type mismatch: expected u32, got bool"));
    }

    #[test]
    fn clamps_out_of_bounds_span() {
        let err = TypeError::ReturnOutsideFunction { span: Span::new(100, 105) };
        let rendered = render_diagnostic(&err, "x", "test.core", &DiagnosticOptions::default());
        assert!(rendered.contains("E0009"));
    }
}
