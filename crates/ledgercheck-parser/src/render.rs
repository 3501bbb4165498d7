//! Trivia-aware rendering.
//!
//! `ledgercheck_core::format_directive` canonicalizes one directive at a
//! time; it knows nothing of comments or blank lines. This module merges a
//! `ParseResult`'s directives back together with its `trivia` by original
//! source line, so the formatter satisfies §4.4's "re-emits trivia" and the
//! idempotence rules (no leading/trailing blank lines, no two consecutive
//! blank lines, exactly one trailing newline) in one pass.

use ledgercheck_core::{format_directive, Directive, FormatConfig};

use crate::parser::Trivia;
use crate::span::resolve_line_col;
use crate::ParseResult;

enum Item<'a> {
    Directive(usize, &'a Directive),
    Comment(usize, &'a str),
    Blank(usize),
}

fn item_line(item: &Item<'_>) -> usize {
    match item {
        Item::Directive(line, _) | Item::Comment(line, _) | Item::Blank(line) => *line,
    }
}

/// Render a parsed file back to canonical source text, preserving comments
/// and blank lines at their original positions.
///
/// `source` is the original text the `ParseResult` was produced from; it is
/// used only to resolve each directive's line number (directives carry a
/// byte span, not a cached line/column — see `Span::start_line_col`).
#[must_use]
pub fn format_with_trivia(source: &str, result: &ParseResult, config: &FormatConfig) -> String {
    let mut items: Vec<Item<'_>> =
        Vec::with_capacity(result.directives.len() + result.trivia.len());

    for spanned in &result.directives {
        let (line, _) = resolve_line_col(source, spanned.span.start);
        items.push(Item::Directive(line, &spanned.value));
    }
    for trivia in &result.trivia {
        match trivia {
            Trivia::Comment { line, text } => items.push(Item::Comment(*line, text)),
            Trivia::BlankLine { line } => items.push(Item::Blank(*line)),
        }
    }

    // Stable sort: directives at the same line as a trivia item (there is
    // none in practice, since trivia is only recorded for content-free
    // lines) keep their relative insertion order, matching §4.2's stable
    // sort discipline.
    items.sort_by_key(item_line);

    let mut out = String::new();
    let mut pending_blank = false;
    let mut wrote_anything = false;

    for item in &items {
        match item {
            Item::Directive(_, directive) => {
                if pending_blank && wrote_anything {
                    out.push('\n');
                }
                pending_blank = false;
                out.push_str(&format_directive(directive, config));
                wrote_anything = true;
            }
            Item::Comment(_, text) => {
                if pending_blank && wrote_anything {
                    out.push('\n');
                }
                pending_blank = false;
                out.push(';');
                out.push_str(text);
                out.push('\n');
                wrote_anything = true;
            }
            Item::Blank(_) => {
                pending_blank = true;
            }
        }
    }

    let trimmed = out.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        let mut result = String::with_capacity(trimmed.len() + 1);
        result.push_str(trimmed);
        result.push('\n');
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn preserves_leading_comment_and_blank_line() {
        let source = "; leading comment\n\n2020-01-01 open Assets:Cash\n";
        let result = parse(source);
        let config = FormatConfig::default();
        let once = format_with_trivia(source, &result, &config);
        assert_eq!(once, "; leading comment\n\n2020-01-01 open Assets:Cash\n");
    }

    #[test]
    fn collapses_repeated_blank_lines_and_trims_trailing_ones() {
        let source = "2020-01-01 open Assets:Cash\n\n\n\n2020-01-02 open Assets:Bank\n\n\n";
        let result = parse(source);
        let config = FormatConfig::default();
        let once = format_with_trivia(source, &result, &config);
        assert_eq!(
            once,
            "2020-01-01 open Assets:Cash\n\n2020-01-02 open Assets:Bank\n"
        );
    }

    #[test]
    fn drops_leading_blank_lines() {
        let source = "\n\n2020-01-01 open Assets:Cash\n";
        let result = parse(source);
        let config = FormatConfig::default();
        let once = format_with_trivia(source, &result, &config);
        assert_eq!(once, "2020-01-01 open Assets:Cash\n");
    }

    #[test]
    fn is_idempotent_over_comments_and_blank_lines() {
        let source = "; section header\n\n2020-01-01 open Assets:Cash\n; inline-ish note\n2020-01-01 open Expenses:Food\n\n2020-01-02 * \"Lunch\"\n  Assets:Cash   -10.00 USD\n  Expenses:Food  10.00 USD\n";
        let config = FormatConfig::default();

        let first_parse = parse(source);
        let once = format_with_trivia(source, &first_parse, &config);

        let second_parse = parse(&once);
        let twice = format_with_trivia(&once, &second_parse, &config);

        assert_eq!(once, twice);
    }

    #[test]
    fn empty_source_renders_empty() {
        let source = "";
        let result = parse(source);
        let config = FormatConfig::default();
        assert_eq!(format_with_trivia(source, &result, &config), "");
    }
}
