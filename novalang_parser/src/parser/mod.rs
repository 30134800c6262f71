//! Recursive-descent / Pratt parser for NovaLang.
//!
//! Converts the token stream from the lexer into a typed AST. The parser
//! never aborts on a recoverable error outside `parse_repl_input`: it
//! records the error and resynchronizes at the next sync point (§4.2).

mod declarations;
mod expressions;
mod statements;
mod types;

use crate::ast::{Declaration, ImportDecl, Program};
use crate::error::{ParseError, ParseErrors, ParseResult};
use crate::lexer::{Lexer, SpannedToken};
use crate::span::{SourceMap, Span};
use crate::token::Token;

/// Tokens that terminate error recovery (§4.2): `;`, newline, `}`, or a
/// top-level declaration keyword.
const SYNC_POINTS: &[Token] = &[
    Token::Semicolon,
    Token::Newline,
    Token::RBrace,
    Token::KwFun,
    Token::KwClass,
    Token::KwVal,
    Token::KwVar,
    Token::KwImport,
];

#[derive(Clone)]
pub struct Parser<'a> {
    pub(crate) source: &'a str,
    pub(crate) lexer: Lexer<'a>,
    pub(crate) source_map: SourceMap,
    pub(crate) current: Option<SpannedToken<'a>>,
    pub(crate) errors: ParseErrors,
    /// `parse_repl_input` sets this so statement-level helpers skip
    /// resynchronization and propagate the first error instead.
    pub(crate) fatal_on_error: bool,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_file_id(0, source)
    }

    pub fn with_file_id(file_id: crate::span::FileId, source: &'a str) -> Self {
        let lexer = Lexer::with_file_id(file_id, source);
        let source_map = lexer.source_map().clone();
        Self {
            source,
            lexer,
            source_map,
            current: None,
            errors: ParseErrors::new(),
            fatal_on_error: false,
        }
    }

    /// `parse_program` (§4.2): whole file, collects top-level imports and
    /// declarations, recovering from errors at sync points.
    pub fn parse(mut self) -> (Program, ParseErrors) {
        let start = 0;
        self.advance();

        let mut imports = Vec::new();
        let mut declarations = Vec::new();

        self.skip_trivia();
        while self.check(&Token::KwImport) {
            match self.parse_import() {
                Ok(import) => imports.push(import),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
            self.skip_trivia();
        }

        while !self.is_at_end() {
            self.skip_trivia();
            if self.is_at_end() {
                break;
            }
            match self.parse_top_level_declaration() {
                Ok(decl) => declarations.push(decl),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        let end = self.source.len();
        let span = self.source_map.span(start, end);
        (
            Program {
                imports,
                declarations,
                span,
            },
            self.errors,
        )
    }

    /// `parse_repl_input` (§4.2): a single top-level construct or
    /// expression; never recovers from an error.
    pub fn parse_repl_input(mut self) -> ParseResult<Option<Declaration>> {
        self.fatal_on_error = true;
        self.advance();
        self.skip_trivia();
        if self.is_at_end() {
            return Ok(None);
        }
        self.parse_top_level_declaration().map(Some)
    }

    // ==================== Token management ====================

    pub(crate) fn advance(&mut self) -> Option<SpannedToken<'a>> {
        let prev = self.current.take();
        loop {
            match self.lexer.next_token() {
                Some(Ok(token)) => {
                    if matches!(token.token, Token::LineComment) {
                        continue;
                    }
                    self.current = Some(token);
                    break;
                }
                Some(Err(e)) => {
                    self.errors.push(ParseError::Lexical(e));
                    continue;
                }
                None => {
                    self.current = None;
                    break;
                }
            }
        }
        prev
    }

    pub(crate) fn check(&self, expected: &Token) -> bool {
        self.current
            .as_ref()
            .map(|t| &t.token == expected)
            .unwrap_or(false)
    }

    pub(crate) fn check_any(&self, expected: &[Token]) -> bool {
        self.current
            .as_ref()
            .map(|t| expected.contains(&t.token))
            .unwrap_or(false)
    }

    pub(crate) fn peek_next(&mut self) -> Option<Token> {
        loop {
            match self.lexer.peek() {
                Some(Ok(token)) => {
                    if matches!(token.token, Token::LineComment) {
                        let _ = self.lexer.next_token();
                        continue;
                    }
                    return Some(token.token.clone());
                }
                Some(Err(_)) => {
                    let _ = self.lexer.next_token();
                    continue;
                }
                None => return None,
            }
        }
    }

    pub(crate) fn expect(&mut self, expected: Token) -> ParseResult<SpannedToken<'a>> {
        if self.check(&expected) {
            Ok(self.advance().unwrap())
        } else {
            let found = self
                .current
                .as_ref()
                .map(|t| t.text.to_string())
                .unwrap_or_else(|| "end of input".to_string());
            let span = self.current_span();
            Err(ParseError::expected(found, format!("{expected:?}"), span))
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.current
            .as_ref()
            .map(|t| t.span)
            .unwrap_or_else(|| self.source_map.span(self.source.len(), self.source.len()))
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current.is_none()
    }

    /// Skip statement-separator trivia (newlines, semicolons) between
    /// top-level items.
    pub(crate) fn skip_trivia(&mut self) {
        while self.check(&Token::Newline) || self.check(&Token::Semicolon) {
            self.advance();
        }
    }

    pub(crate) fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.check(&Token::Newline) || self.check(&Token::Semicolon) {
                self.advance();
                return;
            }
            if self.check_any(SYNC_POINTS) {
                return;
            }
            self.advance();
        }
    }
}

/// Parse NovaLang source code into a `Program`, recovering from errors.
pub fn parse(source: &str) -> (Program, ParseErrors) {
    Parser::new(source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_program() {
        let (program, errors) = parse("");
        assert!(errors.is_empty());
        assert!(program.declarations.is_empty());
    }

    #[test]
    fn parses_import_then_function() {
        let (program, errors) = parse("import foo.bar\nfun main() { println(1) }");
        assert!(errors.is_empty(), "{:?}", errors.errors());
        assert_eq!(program.imports.len(), 1);
        assert_eq!(program.declarations.len(), 1);
    }
}
