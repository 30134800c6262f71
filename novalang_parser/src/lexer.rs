//! Lexer for NovaLang source code.
//!
//! Wraps the logos-generated token scanner with manual handling for
//! block comments (which nest) and string literals (which may contain
//! interpolated sub-expressions).

use std::collections::VecDeque;

use logos::Logos;

use crate::error::LexicalError;
use crate::span::{SourceMap, Span};
use crate::token::Token;

/// Maximum nesting depth for `${ ... }` interpolation containing further
/// interpolated strings (spec §4.1: "at least 8").
pub const MAX_INTERPOLATION_DEPTH: usize = 8;

/// A literal value extracted at lex time, so the parser and later stages
/// never need to re-parse lexeme text (spec §3.2: `Token { ..., literal_payload? }`).
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralPayload {
    Int(i64),
    Long(i64),
    Double(f64),
    Float(f32),
    Bool(bool),
    Char(char),
    Str(String),
    Null,
}

/// A token together with its span, source text, and any parsed literal
/// value.
#[derive(Debug, Clone)]
pub struct SpannedToken<'a> {
    pub token: Token,
    pub span: Span,
    pub text: &'a str,
    pub literal: Option<LiteralPayload>,
}

impl<'a> SpannedToken<'a> {
    pub fn new(token: Token, span: Span, text: &'a str) -> Self {
        let literal = literal_payload(&token, text);
        Self {
            token,
            span,
            text,
            literal,
        }
    }

    fn with_literal(token: Token, span: Span, text: &'a str, literal: LiteralPayload) -> Self {
        Self {
            token,
            span,
            text,
            literal: Some(literal),
        }
    }
}

fn literal_payload(token: &Token, text: &str) -> Option<LiteralPayload> {
    match token {
        Token::True => Some(LiteralPayload::Bool(true)),
        Token::False => Some(LiteralPayload::Bool(false)),
        Token::Null => Some(LiteralPayload::Null),
        Token::DecimalLiteral => Some(parse_int_literal(text, 10)),
        Token::HexLiteral => Some(parse_int_literal(&text[2..], 16)),
        Token::BinaryLiteral => Some(parse_int_literal(&text[2..], 2)),
        Token::FloatLiteral | Token::FloatExponent => Some(parse_float_literal(text)),
        Token::CharLiteral => Some(LiteralPayload::Char(parse_char_literal(text))),
        _ => None,
    }
}

fn parse_int_literal(digits_with_suffix: &str, radix: u32) -> LiteralPayload {
    let is_long = digits_with_suffix.ends_with('L') || digits_with_suffix.ends_with('l');
    let digits: String = digits_with_suffix
        .trim_end_matches(['L', 'l'])
        .chars()
        .filter(|c| *c != '_')
        .collect();
    let value = i64::from_str_radix(&digits, radix).unwrap_or(0);
    if is_long {
        LiteralPayload::Long(value)
    } else {
        LiteralPayload::Int(value)
    }
}

fn parse_float_literal(text: &str) -> LiteralPayload {
    let is_float = text.ends_with('f') || text.ends_with('F');
    let digits: String = text
        .trim_end_matches(['f', 'F'])
        .chars()
        .filter(|c| *c != '_')
        .collect();
    if is_float {
        LiteralPayload::Float(digits.parse().unwrap_or(0.0))
    } else {
        LiteralPayload::Double(digits.parse().unwrap_or(0.0))
    }
}

fn parse_char_literal(text: &str) -> char {
    let inner = &text[1..text.len() - 1];
    unescape(inner).chars().next().unwrap_or('\0')
}

/// Resolve backslash escapes in a string/char literal body: `\n \t \r \\ \" \' \0 \uXXXX`.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('$') => out.push('$'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                if let Ok(code) = u32::from_str_radix(&hex, 16) {
                    if let Some(ch) = char::from_u32(code) {
                        out.push(ch);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// NovaLang lexer.
///
/// Produces a flat token stream; string interpolation is expanded inline
/// (see [`Lexer::scan_string`]) so the parser never needs to special-case
/// nested lexing.
#[derive(Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, Token>,
    source_map: SourceMap,
    /// Tokens produced by manual scanning (string interpolation segments,
    /// collapsed block comments) that are queued ahead of the underlying
    /// logos lexer.
    pending: VecDeque<Result<SpannedToken<'a>, LexicalError>>,
    offset: usize,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_file_id(0, source)
    }

    pub fn with_file_id(file_id: crate::span::FileId, source: &'a str) -> Self {
        Self {
            source,
            inner: Token::lexer(source),
            source_map: SourceMap::new(file_id, source),
            pending: VecDeque::new(),
            offset: 0,
            position: 0,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn make_span(&self, start: usize, end: usize) -> Span {
        self.source_map.span(start, end)
    }

    pub fn next_token(&mut self) -> Option<Result<SpannedToken<'a>, LexicalError>> {
        if let Some(tok) = self.pending.pop_front() {
            return Some(tok);
        }
        self.next_token_internal()
    }

    pub fn peek(&mut self) -> Option<&Result<SpannedToken<'a>, LexicalError>> {
        if self.pending.is_empty() {
            if let Some(tok) = self.next_token_internal() {
                self.pending.push_back(tok);
            }
        }
        self.pending.front()
    }

    fn next_token_internal(&mut self) -> Option<Result<SpannedToken<'a>, LexicalError>> {
        let result = self.inner.next()?;
        let span = self.inner.span();
        let start = self.offset + span.start;
        let end = self.offset + span.end;
        self.position = end;

        match result {
            Ok(Token::BlockCommentStart) => match self.scan_block_comment(end) {
                Ok(comment_end) => {
                    self.restart_from(comment_end);
                    self.next_token_internal()
                }
                Err(e) => {
                    self.restart_from(self.source.len());
                    Some(Err(e))
                }
            },

            Ok(Token::DoubleQuote) => match self.scan_string(start, end, false, 0) {
                Ok((end_pos, tokens)) => {
                    self.restart_from(end_pos);
                    self.pending.extend(tokens.into_iter().map(Ok));
                    self.pending.pop_front()
                }
                Err(e) => {
                    self.restart_from(self.source.len());
                    Some(Err(e))
                }
            },

            Ok(Token::TripleDoubleQuote) => match self.scan_string(start, end, true, 0) {
                Ok((end_pos, tokens)) => {
                    self.restart_from(end_pos);
                    self.pending.extend(tokens.into_iter().map(Ok));
                    self.pending.pop_front()
                }
                Err(e) => {
                    self.restart_from(self.source.len());
                    Some(Err(e))
                }
            },

            Ok(token) => {
                let span = self.make_span(start, end);
                let text = &self.source[start..end];
                Some(Ok(SpannedToken::new(token, span, text)))
            }

            Err(()) => Some(Err(LexicalError::UnrecognizedToken {
                span: self.make_span(start, end),
            })),
        }
    }

    /// Scan a (possibly nested) block comment. `/*` and `*/` pairs nest,
    /// which is a testable property (spec §4.1, §8.1).
    fn scan_block_comment(&self, start: usize) -> Result<usize, LexicalError> {
        let mut depth = 1usize;
        let mut pos = start;
        let bytes = self.source.as_bytes();

        while pos < bytes.len() && depth > 0 {
            match memchr::memchr2(b'/', b'*', &bytes[pos..]) {
                None => {
                    pos = bytes.len();
                    break;
                }
                Some(offset) => {
                    pos += offset;
                    if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1] == b'*' {
                        depth += 1;
                        pos += 2;
                        continue;
                    }
                    if pos + 1 < bytes.len() && bytes[pos] == b'*' && bytes[pos + 1] == b'/' {
                        depth -= 1;
                        pos += 2;
                        continue;
                    }
                    pos += 1;
                }
            }
        }

        if depth > 0 {
            Err(LexicalError::UnterminatedBlockComment {
                span: self.make_span(start - 2, pos),
            })
        } else {
            Ok(pos)
        }
    }

    /// Scan a string literal body starting just after the opening quote,
    /// expanding `$ident` and `${ expr }` interpolation into a bracketed
    /// sub-stream of tokens. Returns the byte offset just past the closing
    /// quote and the full list of tokens to emit (`StringStart` is not
    /// itself emitted: the caller already consumed the opening quote as
    /// `DoubleQuote`/`TripleDoubleQuote`, which doubles as the start marker).
    fn scan_string(
        &self,
        open_start: usize,
        body_start: usize,
        triple: bool,
        depth: usize,
    ) -> Result<(usize, Vec<SpannedToken<'a>>), LexicalError> {
        if depth >= MAX_INTERPOLATION_DEPTH {
            return Err(LexicalError::InterpolationTooDeep {
                span: self.make_span(open_start, body_start),
            });
        }

        let bytes = self.source.as_bytes();
        let mut pos = body_start;
        let mut part_start = body_start;
        let mut tokens = Vec::new();

        loop {
            if pos >= bytes.len() {
                return Err(LexicalError::UnterminatedString {
                    span: self.make_span(open_start, pos),
                });
            }
            let b = bytes[pos];

            if b == b'\\' {
                pos = (pos + 2).min(bytes.len());
                continue;
            }

            if b == b'"' {
                let closes = if triple {
                    pos + 3 <= bytes.len() && &bytes[pos..pos + 3] == b"\"\"\""
                } else {
                    true
                };
                if closes {
                    if pos > part_start {
                        tokens.push(self.string_part_token(part_start, pos));
                    }
                    let end = if triple { pos + 3 } else { pos + 1 };
                    tokens.push(self.simple_token(Token::StringEnd, pos, end));
                    return Ok((end, tokens));
                }
                pos += 1;
                continue;
            }

            if b == b'$' && pos + 1 < bytes.len() {
                let next = bytes[pos + 1];
                if next == b'{' {
                    if pos > part_start {
                        tokens.push(self.string_part_token(part_start, pos));
                    }
                    tokens.push(self.simple_token(Token::InterpStart, pos, pos + 2));
                    let (expr_end, inner_tokens) =
                        self.scan_interpolated_expr(pos + 2, depth)?;
                    tokens.extend(inner_tokens);
                    tokens.push(self.simple_token(Token::InterpEnd, expr_end - 1, expr_end));
                    pos = expr_end;
                    part_start = pos;
                    continue;
                }
                if is_ident_start(next as char) {
                    if pos > part_start {
                        tokens.push(self.string_part_token(part_start, pos));
                    }
                    tokens.push(self.simple_token(Token::InterpStart, pos, pos + 1));
                    let ident_start = pos + 1;
                    let mut ident_end = ident_start;
                    while ident_end < bytes.len() && is_ident_continue(bytes[ident_end] as char) {
                        ident_end += 1;
                    }
                    let span = self.make_span(ident_start, ident_end);
                    tokens.push(SpannedToken::new(
                        Token::Identifier,
                        span,
                        &self.source[ident_start..ident_end],
                    ));
                    tokens.push(self.simple_token(Token::InterpEnd, ident_end, ident_end));
                    pos = ident_end;
                    part_start = pos;
                    continue;
                }
            }

            pos += 1;
        }
    }

    /// Scan the `{ ... }` body of a `${ expr }` interpolation by recursively
    /// lexing it as ordinary NovaLang source, tracking brace depth so a
    /// nested `{` (e.g. a lambda literal) doesn't prematurely close the
    /// interpolation, and allowing further nested string literals.
    fn scan_interpolated_expr(
        &self,
        start: usize,
        depth: usize,
    ) -> Result<(usize, Vec<SpannedToken<'a>>), LexicalError> {
        let mut sub = Lexer {
            source: self.source,
            inner: Token::lexer(&self.source[start..]),
            source_map: self.source_map.clone(),
            pending: VecDeque::new(),
            offset: start,
            position: start,
        };
        let mut tokens = Vec::new();
        let mut brace_depth = 0usize;

        loop {
            let mut peek = sub.inner.clone();
            let peeked = peek.next();
            let peeked_end = sub.offset + peek.span().end;
            match peeked {
                Some(Ok(Token::LBrace)) => brace_depth += 1,
                Some(Ok(Token::RBrace)) => {
                    if brace_depth == 0 {
                        return Ok((peeked_end, tokens));
                    }
                    brace_depth -= 1;
                }
                Some(Ok(Token::DoubleQuote)) | Some(Ok(Token::TripleDoubleQuote)) => {
                    // Re-enter the manual string scanner for nested strings,
                    // bumping the interpolation depth counter.
                    let tok = sub.inner.next();
                    let triple = matches!(tok, Some(Ok(Token::TripleDoubleQuote)));
                    let span = sub.inner.span();
                    let open_start = sub.offset + span.start;
                    let body_start = sub.offset + span.end;
                    let (end_pos, nested) = self.scan_string(open_start, body_start, triple, depth + 1)?;
                    tokens.extend(nested);
                    sub.restart_from(end_pos);
                    continue;
                }
                None => {
                    return Err(LexicalError::UnterminatedString {
                        span: self.make_span(start, self.source.len()),
                    });
                }
                _ => {}
            }
            match sub.next_token_internal() {
                Some(Ok(t)) => tokens.push(t),
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(LexicalError::UnterminatedString {
                        span: self.make_span(start, self.source.len()),
                    })
                }
            }
        }
    }

    fn string_part_token(&self, start: usize, end: usize) -> SpannedToken<'a> {
        let raw = &self.source[start..end];
        let span = self.make_span(start, end);
        SpannedToken::with_literal(
            Token::StringPart,
            span,
            raw,
            LiteralPayload::Str(unescape(raw)),
        )
    }

    fn simple_token(&self, token: Token, start: usize, end: usize) -> SpannedToken<'a> {
        let span = self.make_span(start, end);
        SpannedToken::new(token, span, &self.source[start.min(end)..end])
    }

    /// Reposition the underlying logos lexer at `pos`, reusing the current
    /// scan when possible to avoid rebuilding state from scratch.
    pub fn restart_from(&mut self, pos: usize) {
        self.pending.clear();
        self.position = pos;
        let logos_abs_pos = self.offset + self.inner.span().end;
        if pos > logos_abs_pos && pos <= self.source.len() {
            self.inner.bump(pos - logos_abs_pos);
        } else if pos < self.source.len() {
            self.inner = Token::lexer(&self.source[pos..]);
            self.offset = pos;
        } else {
            self.inner = Token::lexer("");
            self.offset = pos;
        }
    }

    pub fn is_eof(&mut self) -> bool {
        self.peek().is_none()
    }

    pub fn collect_all(mut self) -> Vec<Result<SpannedToken<'a>, LexicalError>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Tokenize source code, skipping line comments, for diagnostics or tests.
pub fn tokenize(source: &str) -> Vec<Result<SpannedToken<'_>, LexicalError>> {
    Lexer::new(source).collect_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .into_iter()
            .filter_map(|r| r.ok())
            .map(|t| t.token)
            .filter(|t| !matches!(t, Token::LineComment))
            .collect()
    }

    #[test]
    fn basic_tokens() {
        let tokens = kinds("fun foo(x) = x + 1");
        assert_eq!(
            tokens,
            vec![
                Token::KwFun,
                Token::Identifier,
                Token::LParen,
                Token::Identifier,
                Token::RParen,
                Token::Eq,
                Token::Identifier,
                Token::Plus,
                Token::DecimalLiteral,
            ]
        );
    }

    #[test]
    fn nested_block_comments() {
        let tokens = kinds("/* outer /* inner */ outer */ 42");
        assert_eq!(tokens, vec![Token::DecimalLiteral]);
    }

    #[test]
    fn unterminated_block_comment_errors() {
        let results = tokenize("/* unterminated");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn simple_string_literal_has_no_interpolation_tokens() {
        let tokens = kinds("\"hello\"");
        assert_eq!(tokens, vec![Token::DoubleQuote, Token::StringPart, Token::StringEnd]);
    }

    #[test]
    fn interpolated_ident_shorthand() {
        let tokens = kinds("\"hi $name!\"");
        assert_eq!(
            tokens,
            vec![
                Token::DoubleQuote,
                Token::StringPart,
                Token::InterpStart,
                Token::Identifier,
                Token::InterpEnd,
                Token::StringPart,
                Token::StringEnd,
            ]
        );
    }

    #[test]
    fn interpolated_brace_expr_with_nested_lambda_braces() {
        let tokens = kinds("\"sum=${xs.map { it * 2 }}\"");
        assert!(tokens.contains(&Token::InterpStart));
        assert!(tokens.contains(&Token::InterpEnd));
        // the lambda's own braces must not have closed the interpolation early
        assert!(tokens.iter().filter(|t| **t == Token::LBrace).count() >= 1);
    }

    #[test]
    fn deep_interpolation_nesting_is_bounded() {
        let mut source = String::from("\"");
        for _ in 0..MAX_INTERPOLATION_DEPTH + 2 {
            source.push_str("${\"");
        }
        for _ in 0..MAX_INTERPOLATION_DEPTH + 2 {
            source.push_str("\"}");
        }
        source.push('"');
        let results = tokenize(&source);
        assert!(results.iter().any(|r| r.is_err()));
    }
}
