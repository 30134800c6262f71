//! Statement parsing: control flow, assignment, declarations-as-statements,
//! and the shared block-body helper used by lambdas, `use`, `if`/`while`/
//! `for`/`try` bodies, and function block bodies.

use super::Parser;
use crate::ast::{
    AssignOp, AssignmentStmt, CatchClause, Declaration, DoWhileStmt, ForStmt, IfStmt, Statement,
    TryStmt, WhileStmt,
};
use crate::error::{ParseError, ParseResult};
use crate::token::Token;

/// Declaration keywords that may also start a statement.
const STATEMENT_DECL_STARTERS: &[Token] = &[Token::KwVal, Token::KwVar, Token::KwFun, Token::KwClass];

impl<'a> Parser<'a> {
    /// Parse statements up to (but not consuming) one of `terminators`,
    /// skipping separator trivia between them. Used for every brace-
    /// delimited body in the grammar.
    pub(crate) fn parse_block_statements(&mut self, terminators: &[Token]) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        self.skip_trivia();
        while !self.is_at_end() && !self.check_any(terminators) {
            statements.push(self.parse_statement()?);
            self.skip_trivia();
        }
        Ok(statements)
    }

    pub(crate) fn parse_statement(&mut self) -> ParseResult<Statement> {
        // `label@ while/for/do` (§4.2): a bare identifier directly
        // followed by `@` and a loop keyword attaches as that loop's label;
        // any other `identifier @` is left to expression parsing, where it
        // becomes an `Expression::Annotated` if `@` starts the primary
        // instead (labels only ever precede loops).
        if self.check(&Token::Identifier) && self.peek_next() == Some(Token::At) {
            return self.parse_labeled_loop();
        }

        match self.current.as_ref().map(|t| t.token.clone()) {
            Some(Token::KwVal) | Some(Token::KwVar) | Some(Token::KwFun) | Some(Token::KwClass)
            | Some(Token::KwInterface) | Some(Token::KwObject) | Some(Token::KwEnum) => {
                Ok(Statement::Declaration(self.parse_top_level_declaration()?))
            }
            Some(Token::KwIf) => self.parse_if_stmt(None),
            Some(Token::KwWhile) => self.parse_while_stmt(None),
            Some(Token::KwDo) => self.parse_do_while_stmt(None),
            Some(Token::KwFor) => self.parse_for_stmt(None),
            Some(Token::KwReturn) => self.parse_return_stmt(),
            Some(Token::KwBreak) => self.parse_break_stmt(),
            Some(Token::KwContinue) => self.parse_continue_stmt(),
            Some(Token::KwThrow) => self.parse_throw_stmt(),
            Some(Token::KwTry) => self.parse_try_stmt(),
            Some(Token::LBrace) if self.looks_like_brace_block() => self.parse_bare_block_stmt(),
            Some(Token::LBrace) => self.parse_expression_or_assignment_stmt(),
            _ => self.parse_expression_or_assignment_stmt(),
        }
    }

    /// A bare `{ ... }` at statement position is ambiguous between a
    /// lambda expression-statement and a nested block; NovaLang treats it
    /// as a block only when it contains no top-level `->` (mirrors the
    /// lambda-vs-params lookahead used in expression position, §4.2).
    fn looks_like_brace_block(&self) -> bool {
        let mut probe = self.clone();
        probe.advance();
        let mut depth: i32 = 0;
        loop {
            match probe.current.as_ref().map(|t| t.token.clone()) {
                None => return true,
                Some(Token::Arrow) if depth == 0 => return false,
                Some(Token::RBrace) => {
                    if depth == 0 {
                        return true;
                    }
                    depth -= 1;
                    probe.advance();
                }
                Some(Token::LBrace) => {
                    depth += 1;
                    probe.advance();
                }
                _ => {
                    probe.advance();
                }
            }
        }
    }

    fn parse_bare_block_stmt(&mut self) -> ParseResult<Statement> {
        let open = self.expect(Token::LBrace)?;
        let body = self.parse_block_statements(&[Token::RBrace])?;
        let close = self.expect(Token::RBrace)?;
        let span = open.span.merge(&close.span);
        Ok(Statement::Block { body, span })
    }

    fn parse_labeled_loop(&mut self) -> ParseResult<Statement> {
        let label_tok = self.advance().unwrap();
        self.advance(); // `@`
        let label = Some(label_tok.text.to_string());
        match self.current.as_ref().map(|t| t.token.clone()) {
            Some(Token::KwWhile) => self.parse_while_stmt(label),
            Some(Token::KwDo) => self.parse_do_while_stmt(label),
            Some(Token::KwFor) => self.parse_for_stmt(label),
            _ => Err(ParseError::invalid(
                "label must precede a while/do/for loop",
                label_tok.span,
            )),
        }
    }

    fn parse_if_stmt(&mut self, _label: Option<String>) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwIf)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let (else_branch, end_span) = if self.check(&Token::KwElse) {
            self.advance();
            let s = self.parse_statement()?;
            let sp = s.span();
            (Some(Box::new(s)), sp)
        } else {
            let sp = then_branch.span();
            (None, sp)
        };
        let span = kw.span.merge(&end_span);
        Ok(Statement::If(IfStmt {
            condition: Box::new(condition),
            then_branch,
            else_branch,
            span,
        }))
    }

    fn parse_while_stmt(&mut self, label: Option<String>) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwWhile)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let body = self.parse_statement()?;
        let span = kw.span.merge(&body.span());
        Ok(Statement::While(WhileStmt {
            label,
            condition: Box::new(condition),
            body: Box::new(body),
            span,
        }))
    }

    fn parse_do_while_stmt(&mut self, label: Option<String>) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwDo)?;
        let body = self.parse_statement()?;
        self.expect(Token::KwWhile)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        let close = self.expect(Token::RParen)?;
        let span = kw.span.merge(&close.span);
        Ok(Statement::DoWhile(DoWhileStmt {
            label,
            body: Box::new(body),
            condition: Box::new(condition),
            span,
        }))
    }

    fn parse_for_stmt(&mut self, label: Option<String>) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwFor)?;
        self.expect(Token::LParen)?;
        let variable = self.expect(Token::Identifier)?.text.to_string();
        self.expect(Token::KwIn)?;
        let iterable = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let body = self.parse_statement()?;
        let span = kw.span.merge(&body.span());
        Ok(Statement::For(ForStmt {
            label,
            variable,
            iterable: Box::new(iterable),
            body: Box::new(body),
            span,
        }))
    }

    fn parse_return_stmt(&mut self) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwReturn)?;
        let value = if self.check_any(&[Token::Semicolon, Token::Newline, Token::RBrace]) || self.is_at_end() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let span = value.as_ref().map(|v| kw.span.merge(&v.span())).unwrap_or(kw.span);
        Ok(Statement::Return { value, span })
    }

    fn parse_break_stmt(&mut self) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwBreak)?;
        let label = self.parse_optional_label_ref();
        Ok(Statement::Break { label, span: kw.span })
    }

    fn parse_continue_stmt(&mut self) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwContinue)?;
        let label = self.parse_optional_label_ref();
        Ok(Statement::Continue { label, span: kw.span })
    }

    fn parse_optional_label_ref(&mut self) -> Option<String> {
        if self.check(&Token::At) {
            self.advance();
            self.expect(Token::Identifier).ok().map(|t| t.text.to_string())
        } else {
            None
        }
    }

    fn parse_throw_stmt(&mut self) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwThrow)?;
        let value = self.parse_expression()?;
        let span = kw.span.merge(&value.span());
        Ok(Statement::Throw { value, span })
    }

    fn parse_try_stmt(&mut self) -> ParseResult<Statement> {
        let kw = self.expect(Token::KwTry)?;
        self.expect(Token::LBrace)?;
        let body = self.parse_block_statements(&[Token::RBrace])?;
        self.expect(Token::RBrace)?;

        let mut catches = Vec::new();
        while self.check(&Token::KwCatch) {
            let catch_kw = self.advance().unwrap();
            self.expect(Token::LParen)?;
            let name = self.expect(Token::Identifier)?.text.to_string();
            self.expect(Token::Colon)?;
            let exception_type = self.parse_type_ref()?;
            self.expect(Token::RParen)?;
            self.expect(Token::LBrace)?;
            let catch_body = self.parse_block_statements(&[Token::RBrace])?;
            let close = self.expect(Token::RBrace)?;
            catches.push(CatchClause {
                name,
                exception_type,
                body: catch_body,
                span: catch_kw.span.merge(&close.span),
            });
        }

        let mut finally = None;
        let mut end_span = catches.last().map(|c| c.span).unwrap_or(kw.span);
        if self.check(&Token::KwFinally) {
            self.advance();
            self.expect(Token::LBrace)?;
            let finally_body = self.parse_block_statements(&[Token::RBrace])?;
            let close = self.expect(Token::RBrace)?;
            end_span = close.span;
            finally = Some(finally_body);
        }

        let span = kw.span.merge(&end_span);
        Ok(Statement::Try(TryStmt {
            body,
            catches,
            finally,
            span,
        }))
    }

    /// An expression-statement and an assignment statement share the same
    /// leading expression; disambiguated by whether an assignment operator
    /// follows (§4.2 — `target op= value`, where `target` must itself be
    /// an lvalue-shaped expression: identifier, member, or index).
    fn parse_expression_or_assignment_stmt(&mut self) -> ParseResult<Statement> {
        let expr = self.parse_expression()?;
        let op = match self.current.as_ref().map(|t| t.token.clone()) {
            Some(Token::Eq) => Some(AssignOp::Assign),
            Some(Token::PlusEq) => Some(AssignOp::AddAssign),
            Some(Token::MinusEq) => Some(AssignOp::SubAssign),
            Some(Token::StarEq) => Some(AssignOp::MulAssign),
            Some(Token::SlashEq) => Some(AssignOp::DivAssign),
            Some(Token::PercentEq) => Some(AssignOp::RemAssign),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let value = self.parse_expression()?;
                let span = expr.span().merge(&value.span());
                Ok(Statement::Assignment(AssignmentStmt {
                    target: expr,
                    op,
                    value,
                    span,
                }))
            }
            None => Ok(Statement::Expression(expr)),
        }
    }
}

/// Whether a statement-position token could also start a declaration, used
/// by `declarations.rs` when deciding if a class/object body member list
/// continues.
pub(crate) fn starts_statement_declaration(token: &Token) -> bool {
    STATEMENT_DECL_STARTERS.contains(token)
}
