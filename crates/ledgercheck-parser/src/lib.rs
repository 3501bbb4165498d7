//! Hand-written lexer and recursive-descent parser for ledger source text.
//!
//! This crate turns ledger source text into a stream of [`Directive`]s, the
//! trivia (comments, blank lines) needed to round-trip formatting, and any
//! parse errors. There is no parser-combinator or lexer-generator library
//! involved: [`lexer`] scans the source by hand into a flat token stream and
//! [`parser`] walks that stream with ordinary recursive-descent functions.
//!
//! # Features
//!
//! - Full ledger syntax support (all 12 directive types)
//! - Error recovery (continues parsing after errors)
//! - Precise source locations for error reporting
//! - Support for includes, options, plugins
//!
//! # Example
//!
//! ```ignore
//! use ledgercheck_parser::parse;
//!
//! let source = r#"
//! 2024-01-15 * "Coffee Shop" "Morning coffee"
//!   Expenses:Food:Coffee  5.00 USD
//!   Assets:Cash
//! "#;
//!
//! let (directives, errors) = parse_directives(source);
//! assert!(errors.is_empty());
//! assert_eq!(directives.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod lexer;
mod parser;
mod render;
mod span;

pub use error::{ParseError, ParseErrorKind};
pub use lexer::{Keyword, LexedToken, Token};
pub use parser::Trivia;
pub use render::format_with_trivia;
pub use span::{resolve_line_col, Span, Spanned};

use ledgercheck_core::Directive;

/// Result of parsing a ledger file.
#[derive(Debug)]
pub struct ParseResult {
    /// Successfully parsed directives.
    pub directives: Vec<Spanned<Directive>>,
    /// Options found in the file.
    pub options: Vec<(String, String, Span)>,
    /// Include directives found.
    pub includes: Vec<(String, Span)>,
    /// Plugin directives found.
    pub plugins: Vec<(String, Option<String>, Span)>,
    /// Parse errors encountered.
    pub errors: Vec<ParseError>,
    /// Comments and blank lines, in source order, for round-trip formatting.
    pub trivia: Vec<Trivia>,
}

/// Parse beancount source code.
///
/// Returns a tuple of (directives, errors). The parser uses error recovery
/// to continue parsing after encountering errors, so both may be non-empty.
///
/// # Arguments
///
/// * `source` - The beancount source code to parse
///
/// # Returns
///
/// A `ParseResult` containing directives, options, includes, plugins, and errors.
pub fn parse(source: &str) -> ParseResult {
    parser::parse(source)
}

/// Parse beancount source code, returning only directives and errors.
///
/// This is a simpler interface when you don't need options/includes/plugins.
pub fn parse_directives(source: &str) -> (Vec<Spanned<Directive>>, Vec<ParseError>) {
    let result = parse(source);
    (result.directives, result.errors)
}
