//! Canonical text rendering for parse and validation diagnostics.
//!
//! The core crates never print (§7): they hand back structured
//! [`ParseError`]/[`ValidationError`] values and leave rendering to a
//! collaborator. This module is that one sanctioned renderer, producing the
//! `<filename>:<line>:<col>: <message>` form with source context.

use ledgercheck_core::{format_directive, Directive, FormatConfig};
use ledgercheck_parser::{ParseError, Spanned};
use ledgercheck_validate::ValidationError;
use std::fmt::Write as _;

/// Render a single parse (or lex) error with two lines of leading context,
/// the offending line, a caret under the column, and one line of trailing
/// context.
#[must_use]
pub fn render_parse_error(filename: &str, source: &str, err: &ParseError) -> String {
    let (start, _end) = err.span();
    let (line, col) = ledgercheck_parser::resolve_line_col(source, start);
    render_positioned(filename, source, line, col, &err.to_string())
}

/// Render a single validation error.
///
/// Validation errors carry a date but no source span, so position is
/// recovered on a best-effort basis: the first not-yet-claimed directive in
/// `directives` whose date matches the error is used as the anchor. `claimed`
/// tracks which directives have already supplied a position for an earlier
/// error in the same render pass, so repeated same-day errors don't all
/// point at the same directive.
#[must_use]
pub fn render_validation_error(
    filename: &str,
    source: &str,
    directives: &[Spanned<Directive>],
    claimed: &mut [bool],
    err: &ValidationError,
) -> String {
    let anchor = directives
        .iter()
        .enumerate()
        .find(|(i, sd)| !claimed[*i] && sd.value.date() == err.date);

    let message = format!("[{}] {}", err.code, err.message);
    let mut out = if let Some((i, sd)) = anchor {
        claimed[i] = true;
        let (line, col) = sd.span.start_line_col(source);
        let mut rendered = render_positioned(filename, source, line, col, &message);
        let formatted = format_directive(&sd.value, &FormatConfig::default());
        rendered.push_str("\n   ");
        rendered.push_str(&formatted.replace('\n', "\n   "));
        rendered.truncate(rendered.trim_end().len());
        rendered.push('\n');
        rendered
    } else {
        format!("{filename}:{}: {message}\n", err.date)
    };

    if let Some(ctx) = &err.context {
        let _ = writeln!(out, "   context: {ctx}");
    }
    out
}

/// Final summary line for a `check` run: `N validation error(s) found`.
#[must_use]
pub fn render_summary(error_count: usize) -> String {
    format!("{error_count} validation error(s) found")
}

fn render_positioned(filename: &str, source: &str, line: usize, col: usize, message: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = String::new();
    let _ = writeln!(out, "{filename}:{line}:{col}: {message}");
    out.push('\n');

    let idx = line.saturating_sub(1);
    let ctx_start = idx.saturating_sub(2);
    for l in &lines[ctx_start..idx.min(lines.len())] {
        let _ = writeln!(out, "   {l}");
    }
    if let Some(l) = lines.get(idx) {
        let _ = writeln!(out, "   {l}");
    }
    let _ = writeln!(out, "{}^", " ".repeat(3 + col.saturating_sub(1)));
    if let Some(l) = lines.get(idx + 1) {
        let _ = writeln!(out, "   {l}");
    }
    out
}
