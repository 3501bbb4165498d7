//! Hand-written recursive-descent parser over the lexer's token stream.
//!
//! Organization:
//! - Line grouping (turns the flat token stream into logical source lines)
//! - Top-level dispatch loop
//! - Per-directive parse functions (`parse_open`, `parse_transaction`, …)
//! - Posting / metadata / expression helpers
//!
//! There is no parser-combinator library here: each directive production is
//! its own function, dispatched by the top-level loop on the first
//! significant token of a line, exactly the way a textbook recursive-descent
//! parser over an already-tokenized stream is built. One token of lookahead
//! is all any production needs.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use ledgercheck_core::{
    Balance, Close, Commodity, Custom, Directive, Document, Event, IncompleteAmount, MetaValue,
    Metadata, Note, Open, Pad, Posting, Price, PriceAnnotation, Transaction,
};

use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{tokenize, Keyword, LexedToken, Token};
use crate::span::{Span, Spanned};
use crate::ParseResult;

/// A piece of source trivia (comments, blank lines) that is not itself a
/// directive but must be re-emitted by the formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trivia {
    /// A `;`- or bare-`#`-introduced comment line.
    Comment {
        /// 1-based source line.
        line: usize,
        /// Comment text, excluding the leading marker.
        text: String,
    },
    /// An entirely empty line.
    BlankLine {
        /// 1-based source line.
        line: usize,
    },
}

struct Line {
    line_no: usize,
    indent: Option<usize>,
    tokens: Vec<(Token, Span)>,
    comment: Option<String>,
}

/// Group the flat token stream into logical source lines, each carrying its
/// indent column (if any), its content tokens, and a trailing comment.
fn group_lines(tokens: Vec<LexedToken>) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut indent = None;
    let mut toks: Vec<(Token, Span)> = Vec::new();
    let mut comment: Option<String> = None;
    let mut line_no = 1usize;

    for t in tokens {
        match t.token {
            Token::Indent(c) => indent = Some(c),
            Token::Newline => {
                lines.push(Line {
                    line_no,
                    indent,
                    tokens: std::mem::take(&mut toks),
                    comment: comment.take(),
                });
                line_no = t.line + 1;
                indent = None;
            }
            Token::Comment(text) => {
                if toks.is_empty() {
                    line_no = t.line;
                }
                comment = Some(text);
            }
            other => {
                if toks.is_empty() {
                    line_no = t.line;
                }
                toks.push((other, t.span));
            }
        }
    }
    lines
}

/// Parse ledger source text into directives, trivia, and errors.
pub fn parse(source: &str) -> ParseResult {
    let mut result = ParseResult {
        directives: Vec::new(),
        options: Vec::new(),
        includes: Vec::new(),
        plugins: Vec::new(),
        errors: Vec::new(),
        trivia: Vec::new(),
    };

    let tokens = match tokenize(source) {
        Ok(t) => t,
        Err(e) => {
            result.errors.push(e);
            return result;
        }
    };

    let lines = group_lines(tokens);
    let mut p = Parser {
        lines: &lines,
        pos: 0,
        tag_stack: Vec::new(),
        meta_stack: Vec::new(),
    };

    while p.pos < p.lines.len() {
        let line = &p.lines[p.pos];
        if line.tokens.is_empty() {
            match &line.comment {
                Some(text) => result.trivia.push(Trivia::Comment {
                    line: line.line_no,
                    text: text.clone(),
                }),
                None => result.trivia.push(Trivia::BlankLine { line: line.line_no }),
            }
            p.pos += 1;
            continue;
        }

        if line.indent.is_some() {
            let span = line.tokens[0].1;
            result.errors.push(
                ParseError::new(ParseErrorKind::IndentationError, span)
                    .with_context("indented line with no preceding directive"),
            );
            p.pos += 1;
            continue;
        }

        match p.parse_top_level() {
            Ok(TopLevel::Directive(d, span)) => result.directives.push(Spanned::new(d, span)),
            Ok(TopLevel::Option(k, v, span)) => result.options.push((k, v, span)),
            Ok(TopLevel::Include(path, span)) => result.includes.push((path, span)),
            Ok(TopLevel::Plugin(name, cfg, span)) => result.plugins.push((name, cfg, span)),
            Ok(TopLevel::Skip) => {}
            Err(e) => {
                result.errors.push(e);
                // Recover at the next line that isn't a continuation of the
                // one that just failed.
                p.pos += 1;
                while p.pos < p.lines.len() && p.lines[p.pos].indent.is_some() {
                    p.pos += 1;
                }
            }
        }
    }

    result.directives.sort_by(|a, b| {
        a.value
            .date()
            .cmp(&b.value.date())
            .then_with(|| a.value.priority().cmp(&b.value.priority()))
    });

    result
}

enum TopLevel {
    Directive(Directive, Span),
    Option(String, String, Span),
    Include(String, Span),
    Plugin(String, Option<String>, Span),
    Skip,
}

struct Parser<'a> {
    lines: &'a [Line],
    pos: usize,
    /// `pushtag`/`poptag` stack: tags auto-applied to following transactions.
    tag_stack: Vec<String>,
    /// `pushmeta`/`popmeta` stack: metadata auto-applied to following directives.
    meta_stack: Vec<(String, MetaValue)>,
}

impl<'a> Parser<'a> {
    fn cur(&self) -> &Line {
        &self.lines[self.pos]
    }

    fn parse_top_level(&mut self) -> Result<TopLevel, ParseError> {
        let line = self.cur();
        let (first, first_span) = line.tokens[0].clone();

        match first {
            Token::Date(date) => self.parse_dated(date),
            Token::Keyword(Keyword::Option) => self.parse_option(),
            Token::Keyword(Keyword::Include) => self.parse_include(),
            Token::Keyword(Keyword::Plugin) => self.parse_plugin(),
            Token::Keyword(Keyword::Pushtag) => self.parse_pushtag(),
            Token::Keyword(Keyword::Poptag) => self.parse_poptag(),
            Token::Keyword(Keyword::Pushmeta) => self.parse_pushmeta(),
            Token::Keyword(Keyword::Popmeta) => self.parse_popmeta(),
            _ => {
                self.pos += 1;
                Err(ParseError::new(ParseErrorKind::MissingDirective, first_span))
            }
        }
    }

    fn parse_dated(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let line = self.cur();
        if line.tokens.len() < 2 {
            let span = line.tokens[0].1;
            self.pos += 1;
            return Err(ParseError::new(ParseErrorKind::MissingDirective, span));
        }
        let (second, second_span) = line.tokens[1].clone();
        match second {
            Token::Keyword(Keyword::Open) => self.parse_open(date),
            Token::Keyword(Keyword::Close) => self.parse_close(date),
            Token::Keyword(Keyword::Commodity) => self.parse_commodity(date),
            Token::Keyword(Keyword::Balance) => self.parse_balance(date),
            Token::Keyword(Keyword::Pad) => self.parse_pad(date),
            Token::Keyword(Keyword::Note) => self.parse_note(date),
            Token::Keyword(Keyword::Document) => self.parse_document(date),
            Token::Keyword(Keyword::Event) => self.parse_event(date),
            Token::Keyword(Keyword::Price) => self.parse_price(date),
            Token::Keyword(Keyword::Custom) => self.parse_custom(date),
            Token::Keyword(Keyword::Txn) | Token::Flag(_) | Token::String { .. } => {
                self.parse_transaction(date)
            }
            _ => {
                self.pos += 1;
                Err(ParseError::new(ParseErrorKind::MissingDirective, second_span))
            }
        }
    }

    /// Advance past the current (header) line and collect the run of
    /// following indented lines that belong to this directive (postings and
    /// metadata for transactions; metadata-only for other directive kinds).
    fn consume_continuation(&mut self) -> Vec<&'a Line> {
        self.pos += 1;
        let mut block = Vec::new();
        while self.pos < self.lines.len() {
            let l = &self.lines[self.pos];
            if l.tokens.is_empty() || l.indent.is_some() {
                block.push(l);
                self.pos += 1;
            } else {
                break;
            }
        }
        block
    }

    fn expect_account(&self, tokens: &[(Token, Span)], idx: usize) -> Result<String, ParseError> {
        match tokens.get(idx) {
            Some((Token::Account(a), _)) => Ok(a.clone()),
            Some((_, span)) => Err(ParseError::new(ParseErrorKind::MissingAccount, *span)),
            None => Err(ParseError::new(
                ParseErrorKind::MissingAccount,
                tokens.last().map_or(Span::new(0, 0), |(_, s)| *s),
            )),
        }
    }

    fn parse_open(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let account = self.expect_account(&header, 2)?;

        let mut currencies = Vec::new();
        let mut booking = None;
        let mut idx = 3;
        while let Some((tok, _)) = header.get(idx) {
            match tok {
                Token::Currency(c) => currencies.push(c.clone()),
                Token::Comma => {}
                Token::String { value, .. } => booking = Some(value.clone()),
                _ => break,
            }
            idx += 1;
        }

        let mut open = Open::new(date, account);
        if !currencies.is_empty() {
            open = open.with_currencies(currencies);
        }
        if let Some(b) = booking {
            open = open.with_booking(b);
        }

        let block = self.consume_continuation();
        open.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Open(open), header_span))
    }

    fn parse_close(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let account = self.expect_account(&header, 2)?;
        let mut close = Close::new(date, account);
        let block = self.consume_continuation();
        close.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Close(close), header_span))
    }

    fn parse_commodity(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let currency = match header.get(2) {
            Some((Token::Currency(c), _)) => c.clone(),
            Some((_, span)) => return Err(ParseError::new(ParseErrorKind::MissingCurrency, *span)),
            None => return Err(ParseError::new(ParseErrorKind::MissingCurrency, header_span)),
        };
        let mut commodity = Commodity::new(date, currency);
        let block = self.consume_continuation();
        commodity.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Commodity(commodity), header_span))
    }

    fn parse_balance(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let account = self.expect_account(&header, 2)?;
        let (number, idx) = self.expect_number_expr(&header, 3)?;
        let currency = match header.get(idx) {
            Some((Token::Currency(c), _)) => c.clone(),
            Some((_, span)) => return Err(ParseError::new(ParseErrorKind::MissingCurrency, *span)),
            None => return Err(ParseError::new(ParseErrorKind::MissingCurrency, header_span)),
        };

        let mut balance = Balance::new(
            date,
            account,
            ledgercheck_core::Amount::new(number, currency),
        );

        if matches!(header.get(idx + 1), Some((Token::Tilde, _))) {
            let (tol, _) = self.expect_number_expr(&header, idx + 2)?;
            balance = balance.with_tolerance(tol);
        }

        let block = self.consume_continuation();
        balance.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Balance(balance), header_span))
    }

    fn parse_pad(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let account = self.expect_account(&header, 2)?;
        let source = self.expect_account(&header, 3)?;
        let mut pad = Pad::new(date, account, source);
        let block = self.consume_continuation();
        pad.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Pad(pad), header_span))
    }

    fn parse_note(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let account = self.expect_account(&header, 2)?;
        let comment = match header.get(3) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            Some((_, span)) => {
                return Err(ParseError::new(ParseErrorKind::Expected("string".to_string()), *span))
            }
            None => String::new(),
        };
        let mut note = Note::new(date, account, comment);
        let block = self.consume_continuation();
        note.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Note(note), header_span))
    }

    fn parse_document(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let account = self.expect_account(&header, 2)?;
        let path = match header.get(3) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            Some((_, span)) => {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("document path".to_string()),
                    *span,
                ))
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingField("path".to_string()),
                    header_span,
                ))
            }
        };
        let mut doc = Document::new(date, account, path);
        let mut idx = 4;
        while let Some((tok, _)) = header.get(idx) {
            match tok {
                Token::Tag(t) => doc.tags.push(t.clone()),
                Token::Link(l) => doc.links.push(l.clone()),
                _ => break,
            }
            idx += 1;
        }
        let block = self.consume_continuation();
        doc.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Document(doc), header_span))
    }

    fn parse_event(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let event_type = match header.get(2) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            Some((_, span)) => {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("event type string".to_string()),
                    *span,
                ))
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingField("type".to_string()),
                    header_span,
                ))
            }
        };
        let value = match header.get(3) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            Some((_, span)) => {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("event value string".to_string()),
                    *span,
                ))
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingField("value".to_string()),
                    header_span,
                ))
            }
        };
        let mut event = Event::new(date, event_type, value);
        let block = self.consume_continuation();
        event.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Event(event), header_span))
    }

    fn parse_price(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let currency = match header.get(2) {
            Some((Token::Currency(c), _)) => c.clone(),
            Some((_, span)) => return Err(ParseError::new(ParseErrorKind::MissingCurrency, *span)),
            None => return Err(ParseError::new(ParseErrorKind::MissingCurrency, header_span)),
        };
        let (number, idx) = self.expect_number_expr(&header, 3)?;
        let price_currency = match header.get(idx) {
            Some((Token::Currency(c), _)) => c.clone(),
            Some((_, span)) => return Err(ParseError::new(ParseErrorKind::MissingCurrency, *span)),
            None => return Err(ParseError::new(ParseErrorKind::MissingCurrency, header_span)),
        };
        let mut price = Price::new(date, currency, ledgercheck_core::Amount::new(number, price_currency));
        let block = self.consume_continuation();
        price.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Price(price), header_span))
    }

    fn parse_custom(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();
        let custom_type = match header.get(2) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            Some((_, span)) => {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("custom directive type".to_string()),
                    *span,
                ))
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingField("type".to_string()),
                    header_span,
                ))
            }
        };
        let mut custom = Custom::new(date, custom_type);
        for (tok, _) in &header[3..] {
            let value = match tok {
                Token::String { value, .. } => MetaValue::String(value.clone()),
                Token::Account(a) => MetaValue::Account(a.clone()),
                Token::Currency(c) => MetaValue::Currency(c.clone()),
                Token::Number { value, .. } => MetaValue::Number(*value),
                Token::Date(d) => MetaValue::Date(*d),
                Token::Keyword(Keyword::True) => MetaValue::Bool(true),
                Token::Keyword(Keyword::False) => MetaValue::Bool(false),
                _ => continue,
            };
            custom = custom.with_value(value);
        }
        let block = self.consume_continuation();
        custom.meta = self.collect_metadata(&block);
        Ok(TopLevel::Directive(Directive::Custom(custom), header_span))
    }

    fn parse_transaction(&mut self, date: NaiveDate) -> Result<TopLevel, ParseError> {
        let header_span = self.cur().tokens[0].1;
        let header = self.cur().tokens.clone();

        let (flag, mut idx) = match &header[1].0 {
            Token::Keyword(Keyword::Txn) => ('*', 2),
            Token::Flag(c) => (*c, 2),
            Token::String { .. } => ('*', 1),
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("transaction flag".to_string()),
                    header[1].1,
                ))
            }
        };

        let mut payee = None;
        let mut narration = String::new();
        let strings: Vec<String> = header[idx..]
            .iter()
            .take_while(|(t, _)| matches!(t, Token::String { .. }))
            .map(|(t, _)| match t {
                Token::String { value, .. } => value.clone(),
                _ => unreachable!(),
            })
            .collect();
        match strings.len() {
            0 => {}
            1 => narration = strings[0].clone(),
            _ => {
                payee = Some(strings[0].clone());
                narration = strings[1].clone();
            }
        }
        idx += strings.len();

        let mut tags = Vec::new();
        let mut links = Vec::new();
        while let Some((tok, _)) = header.get(idx) {
            match tok {
                Token::Tag(t) => tags.push(t.clone()),
                Token::Link(l) => links.push(l.clone()),
                _ => break,
            }
            idx += 1;
        }

        let mut txn = Transaction::new(date, narration).with_flag(flag);
        if let Some(p) = payee {
            txn = txn.with_payee(p);
        }
        for t in tags {
            txn = txn.with_tag(t);
        }
        for l in links {
            txn = txn.with_link(l);
        }
        for t in &self.tag_stack {
            if !txn.tags.contains(t) {
                txn.tags.push(t.clone());
            }
        }
        for (k, v) in &self.meta_stack {
            txn.meta.entry(k.clone()).or_insert_with(|| v.clone());
        }

        let block = self.consume_continuation();
        let mut i = 0;
        while i < block.len() {
            let l = block[i];
            if l.tokens.is_empty() {
                i += 1;
                continue;
            }
            if let Some((Token::MetaKey(key), _)) = l.tokens.first() {
                let value = self.parse_meta_value(&l.tokens[1..])?;
                txn.meta.insert(key.clone(), value);
                i += 1;
                continue;
            }
            let posting = self.parse_posting(l)?;
            txn.postings.push(posting);
            i += 1;
            // Deeper-indented metadata lines immediately following attach to
            // the posting just pushed.
            while i < block.len() {
                let next = block[i];
                if next.tokens.is_empty() {
                    i += 1;
                    continue;
                }
                let deeper = matches!((next.indent, l.indent), (Some(a), Some(b)) if a > b);
                if !deeper {
                    break;
                }
                if let Some((Token::MetaKey(key), _)) = next.tokens.first() {
                    let value = self.parse_meta_value(&next.tokens[1..])?;
                    if let Some(last) = txn.postings.last_mut() {
                        last.meta.insert(key.clone(), value);
                    }
                    i += 1;
                } else {
                    break;
                }
            }
        }

        Ok(TopLevel::Directive(Directive::Transaction(txn), header_span))
    }

    fn parse_posting(&self, line: &Line) -> Result<Posting, ParseError> {
        let tokens = &line.tokens;

        let has_flag_prefix = matches!(tokens.first(), Some((Token::Flag(_), _)))
            && matches!(tokens.get(1), Some((Token::Account(_), _)));
        let (flag, account, mut idx) = if has_flag_prefix {
            let Token::Flag(c) = tokens[0].0 else { unreachable!() };
            (Some(c), self.expect_account(tokens, 1)?, 2)
        } else {
            (None, self.expect_account(tokens, 0)?, 1)
        };

        let units = self.parse_incomplete_amount(tokens, &mut idx);

        let cost = if matches!(tokens.get(idx), Some((Token::LBrace | Token::LDoubleBrace, _))) {
            Some(self.parse_cost_spec(tokens, &mut idx)?)
        } else {
            None
        };

        let price = if matches!(tokens.get(idx), Some((Token::At | Token::AtAt, _))) {
            Some(self.parse_price_annotation(tokens, &mut idx)?)
        } else {
            None
        };

        Ok(Posting {
            account,
            units,
            cost,
            price,
            flag,
            meta: Metadata::new(),
        })
    }

    fn parse_incomplete_amount(
        &self,
        tokens: &[(Token, Span)],
        idx: &mut usize,
    ) -> Option<IncompleteAmount> {
        let start = *idx;
        if let Some((Token::Currency(c), _)) = tokens.get(*idx) {
            if !matches!(
                tokens.get(*idx + 1),
                Some((Token::LBrace | Token::LDoubleBrace | Token::At | Token::AtAt, _))
            ) && tokens.get(*idx + 1).is_some()
            {
                // A bare currency followed by more posting syntax is not a
                // valid shape; fall through to the number-expression path.
            } else {
                *idx += 1;
                return Some(IncompleteAmount::currency_only(c.clone()));
            }
        }

        if let Ok(number) = self.try_number_expr(tokens, idx) {
            if let Some((Token::Currency(c), _)) = tokens.get(*idx) {
                *idx += 1;
                return Some(IncompleteAmount::complete(number, c.clone()));
            }
            return Some(IncompleteAmount::number_only(number));
        }
        *idx = start;
        None
    }

    fn expect_number_expr(
        &self,
        tokens: &[(Token, Span)],
        idx: usize,
    ) -> Result<(Decimal, usize), ParseError> {
        let mut i = idx;
        let n = self.try_number_expr(tokens, &mut i).map_err(|()| {
            ParseError::new(
                ParseErrorKind::MissingAmount,
                tokens.get(idx).map_or(Span::new(0, 0), |(_, s)| *s),
            )
        })?;
        Ok((n, i))
    }

    /// Parse a (possibly parenthesized, `+ - * /`) numeric expression
    /// starting at `*idx`, advancing `idx` past it. Standard precedence,
    /// left-associative.
    fn try_number_expr(&self, tokens: &[(Token, Span)], idx: &mut usize) -> Result<Decimal, ()> {
        self.parse_sum(tokens, idx)
    }

    fn parse_sum(&self, tokens: &[(Token, Span)], idx: &mut usize) -> Result<Decimal, ()> {
        let mut value = self.parse_product(tokens, idx)?;
        loop {
            match tokens.get(*idx) {
                Some((Token::Plus, _)) => {
                    *idx += 1;
                    value += self.parse_product(tokens, idx)?;
                }
                Some((Token::Minus, _)) => {
                    *idx += 1;
                    value -= self.parse_product(tokens, idx)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_product(&self, tokens: &[(Token, Span)], idx: &mut usize) -> Result<Decimal, ()> {
        let mut value = self.parse_atom(tokens, idx)?;
        loop {
            match tokens.get(*idx) {
                Some((Token::Star, _)) | Some((Token::Flag('*'), _)) => {
                    *idx += 1;
                    value *= self.parse_atom(tokens, idx)?;
                }
                Some((Token::Slash, _)) => {
                    *idx += 1;
                    let rhs = self.parse_atom(tokens, idx)?;
                    if rhs.is_zero() {
                        return Err(());
                    }
                    value /= rhs;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_atom(&self, tokens: &[(Token, Span)], idx: &mut usize) -> Result<Decimal, ()> {
        match tokens.get(*idx) {
            Some((Token::Number { value, .. }, _)) => {
                *idx += 1;
                Ok(*value)
            }
            Some((Token::Minus, _)) => {
                *idx += 1;
                Ok(-self.parse_atom(tokens, idx)?)
            }
            Some((Token::LParen, _)) => {
                *idx += 1;
                let value = self.parse_sum(tokens, idx)?;
                match tokens.get(*idx) {
                    Some((Token::RParen, _)) => {
                        *idx += 1;
                        Ok(value)
                    }
                    _ => Err(()),
                }
            }
            _ => Err(()),
        }
    }

    fn parse_cost_spec(
        &self,
        tokens: &[(Token, Span)],
        idx: &mut usize,
    ) -> Result<ledgercheck_core::CostSpec, ParseError> {
        let total = matches!(tokens.get(*idx), Some((Token::LDoubleBrace, _)));
        let close_tok = if total { Token::RDoubleBrace } else { Token::RBrace };
        *idx += 1;

        let mut spec = ledgercheck_core::CostSpec::empty();

        if matches!(tokens.get(*idx), Some((Token::Flag('*'), _))) {
            *idx += 1;
            spec = spec.with_merge();
        }

        loop {
            match tokens.get(*idx) {
                Some((t, _)) if *t == close_tok => {
                    *idx += 1;
                    break;
                }
                None => {
                    return Err(ParseError::new(
                        ParseErrorKind::SyntaxError("unclosed cost specification".to_string()),
                        tokens.last().map_or(Span::new(0, 0), |(_, s)| *s),
                    ))
                }
                Some((Token::Comma, _)) => {
                    *idx += 1;
                }
                Some((Token::Currency(c), _)) => {
                    spec = spec.with_currency(c.clone());
                    *idx += 1;
                }
                Some((Token::Date(d), _)) => {
                    spec = spec.with_date(*d);
                    *idx += 1;
                }
                Some((Token::String { value, .. }, _)) => {
                    spec = spec.with_label(value.clone());
                    *idx += 1;
                }
                Some((Token::Number { .. } | Token::Minus, span)) => {
                    let span = *span;
                    let n = self
                        .try_number_expr(tokens, idx)
                        .map_err(|()| ParseError::new(ParseErrorKind::InvalidNumber(String::new()), span))?;
                    if total {
                        spec = spec.with_number_total(n);
                    } else {
                        spec = spec.with_number_per(n);
                    }
                }
                Some((_, span)) => {
                    let span = *span;
                    return Err(ParseError::new(
                        ParseErrorKind::SyntaxError(
                            "unexpected token in cost specification".to_string(),
                        ),
                        span,
                    ));
                }
            }
        }
        Ok(spec)
    }

    fn parse_price_annotation(
        &self,
        tokens: &[(Token, Span)],
        idx: &mut usize,
    ) -> Result<PriceAnnotation, ParseError> {
        let is_total = matches!(tokens.get(*idx), Some((Token::AtAt, _)));
        *idx += 1;

        let at_end = matches!(tokens.get(*idx), None | Some((Token::MetaKey(_), _)));
        if at_end {
            return Ok(if is_total {
                PriceAnnotation::TotalEmpty
            } else {
                PriceAnnotation::UnitEmpty
            });
        }

        let incomplete = self
            .parse_incomplete_amount(tokens, idx)
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingAmount, tokens[*idx].1))?;

        Ok(match (is_total, incomplete) {
            (true, IncompleteAmount::Complete(a)) => PriceAnnotation::Total(a),
            (false, IncompleteAmount::Complete(a)) => PriceAnnotation::Unit(a),
            (true, other) => PriceAnnotation::TotalIncomplete(other),
            (false, other) => PriceAnnotation::UnitIncomplete(other),
        })
    }

    fn parse_meta_value(&self, tokens: &[(Token, Span)]) -> Result<MetaValue, ParseError> {
        match tokens.first() {
            None => Ok(MetaValue::None),
            Some((Token::String { value, .. }, _)) => Ok(MetaValue::String(value.clone())),
            Some((Token::Account(a), _)) => Ok(MetaValue::Account(a.clone())),
            Some((Token::Currency(c), _)) => Ok(MetaValue::Currency(c.clone())),
            Some((Token::Tag(t), _)) => Ok(MetaValue::Tag(t.clone())),
            Some((Token::Link(l), _)) => Ok(MetaValue::Link(l.clone())),
            Some((Token::Date(d), _)) => Ok(MetaValue::Date(*d)),
            Some((Token::Keyword(Keyword::True), _)) => Ok(MetaValue::Bool(true)),
            Some((Token::Keyword(Keyword::False), _)) => Ok(MetaValue::Bool(false)),
            Some((Token::Number { .. } | Token::Minus, _)) => {
                let mut i = 0;
                let n = self.try_number_expr(tokens, &mut i).map_err(|()| {
                    ParseError::new(ParseErrorKind::InvalidNumber(String::new()), tokens[0].1)
                })?;
                if let Some((Token::Currency(c), _)) = tokens.get(i) {
                    Ok(MetaValue::Amount(ledgercheck_core::Amount::new(n, c.clone())))
                } else {
                    Ok(MetaValue::Number(n))
                }
            }
            Some((_, span)) => Err(ParseError::new(
                ParseErrorKind::SyntaxError("unsupported metadata value".to_string()),
                *span,
            )),
        }
    }

    fn collect_metadata(&self, block: &[&Line]) -> Metadata {
        let mut meta = Metadata::new();
        for line in block {
            if let Some((Token::MetaKey(key), _)) = line.tokens.first() {
                if let Ok(value) = self.parse_meta_value(&line.tokens[1..]) {
                    meta.insert(key.clone(), value);
                }
            }
        }
        for (k, v) in &self.meta_stack {
            meta.entry(k.clone()).or_insert_with(|| v.clone());
        }
        meta
    }

    fn parse_option(&mut self) -> Result<TopLevel, ParseError> {
        let header = self.cur().tokens.clone();
        let span = header[0].1;
        let key = match header.get(1) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            _ => return Err(ParseError::new(ParseErrorKind::Expected("option name".to_string()), span)),
        };
        let value = match header.get(2) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            _ => return Err(ParseError::new(ParseErrorKind::Expected("option value".to_string()), span)),
        };
        self.pos += 1;
        Ok(TopLevel::Option(key, value, span))
    }

    fn parse_include(&mut self) -> Result<TopLevel, ParseError> {
        let header = self.cur().tokens.clone();
        let span = header[0].1;
        let path = match header.get(1) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            _ => return Err(ParseError::new(ParseErrorKind::Expected("include path".to_string()), span)),
        };
        self.pos += 1;
        Ok(TopLevel::Include(path, span))
    }

    fn parse_plugin(&mut self) -> Result<TopLevel, ParseError> {
        let header = self.cur().tokens.clone();
        let span = header[0].1;
        let name = match header.get(1) {
            Some((Token::String { value, .. }, _)) => value.clone(),
            _ => return Err(ParseError::new(ParseErrorKind::Expected("plugin name".to_string()), span)),
        };
        let config = match header.get(2) {
            Some((Token::String { value, .. }, _)) => Some(value.clone()),
            _ => None,
        };
        self.pos += 1;
        Ok(TopLevel::Plugin(name, config, span))
    }

    fn parse_pushtag(&mut self) -> Result<TopLevel, ParseError> {
        let header = self.cur().tokens.clone();
        let span = header[0].1;
        match header.get(1) {
            Some((Token::Tag(t), _)) => self.tag_stack.push(t.clone()),
            _ => return Err(ParseError::new(ParseErrorKind::Expected("tag".to_string()), span)),
        }
        self.pos += 1;
        Ok(TopLevel::Skip)
    }

    fn parse_poptag(&mut self) -> Result<TopLevel, ParseError> {
        let header = self.cur().tokens.clone();
        let span = header[0].1;
        let t = match header.get(1) {
            Some((Token::Tag(t), _)) => t.clone(),
            _ => return Err(ParseError::new(ParseErrorKind::Expected("tag".to_string()), span)),
        };
        if let Some(pos) = self.tag_stack.iter().rposition(|x| x == &t) {
            self.tag_stack.remove(pos);
        } else {
            self.pos += 1;
            return Err(ParseError::new(
                ParseErrorKind::SyntaxError(format!("poptag for unopened tag '{t}'")),
                span,
            ));
        }
        self.pos += 1;
        Ok(TopLevel::Skip)
    }

    fn parse_pushmeta(&mut self) -> Result<TopLevel, ParseError> {
        let header = self.cur().tokens.clone();
        let span = header[0].1;
        let key = match header.get(1) {
            Some((Token::MetaKey(k), _)) => k.clone(),
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("metadata key".to_string()),
                    span,
                ))
            }
        };
        let value = self.parse_meta_value(&header[2..])?;
        self.meta_stack.push((key, value));
        self.pos += 1;
        Ok(TopLevel::Skip)
    }

    fn parse_popmeta(&mut self) -> Result<TopLevel, ParseError> {
        let header = self.cur().tokens.clone();
        let span = header[0].1;
        let key = match header.get(1) {
            Some((Token::MetaKey(k), _)) => k.clone(),
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::Expected("metadata key".to_string()),
                    span,
                ))
            }
        };
        if let Some(pos) = self.meta_stack.iter().rposition(|(k, _)| k == &key) {
            self.meta_stack.remove(pos);
        } else {
            self.pos += 1;
            return Err(ParseError::new(
                ParseErrorKind::SyntaxError(format!("popmeta for unpushed key '{key}'")),
                span,
            ));
        }
        self.pos += 1;
        Ok(TopLevel::Skip)
    }
}
