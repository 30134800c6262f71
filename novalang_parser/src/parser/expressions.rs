//! Pratt-style expression parsing, plus the expression-position
//! disambiguations from §4.2: lambda-vs-block, `#{}` set/map, and
//! `Foo<A>(x)` generic-call-vs-comparison.

use super::Parser;
use crate::ast::{
    ArgSlot, BinaryOp, CollectionElement, CollectionKind, Expression, LambdaExpr, LambdaParam,
    StringPart, TypeRef, UnaryOp, WhenArm,
};
use crate::error::{ParseError, ParseResult};
use crate::lexer::LiteralPayload;
use crate::token::{Associativity, Precedence, Token};

impl<'a> Parser<'a> {
    pub(crate) fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_expression_bp(Precedence::Lowest)
    }

    fn parse_expression_bp(&mut self, min_prec: Precedence) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            // `!is` / `!in`: the lexer never fuses these into one token, so
            // check explicitly before the generic binary-operator lookup.
            if self.check(&Token::Not) {
                match self.peek_next() {
                    Some(Token::KwIs) if Precedence::TypeCheck >= min_prec => {
                        self.advance();
                        self.advance();
                        let type_ref = self.parse_type_ref()?;
                        let span = left.span().merge(&type_ref.span());
                        left = Expression::Is {
                            value: Box::new(left),
                            type_ref,
                            negated: true,
                            span,
                        };
                        continue;
                    }
                    Some(Token::KwIn) if Precedence::Relational >= min_prec => {
                        self.advance();
                        self.advance();
                        let rhs = self.parse_expression_bp(Precedence::Relational.next())?;
                        let span = left.span().merge(&rhs.span());
                        left = Expression::In {
                            value: Box::new(left),
                            range: Box::new(rhs),
                            negated: true,
                            span,
                        };
                        continue;
                    }
                    _ => break,
                }
            }

            let Some(token) = self.current.as_ref().map(|t| t.token.clone()) else {
                break;
            };
            // Assignment is statement-level (`AssignmentStmt`), never
            // consumed while parsing a nested expression.
            if matches!(
                token,
                Token::Eq
                    | Token::PlusEq
                    | Token::MinusEq
                    | Token::StarEq
                    | Token::SlashEq
                    | Token::PercentEq
            ) {
                break;
            }
            let Some((prec, assoc)) = token.binary_precedence() else {
                break;
            };
            if prec < min_prec {
                break;
            }

            match token {
                Token::KwIs => {
                    self.advance();
                    let type_ref = self.parse_type_ref()?;
                    let span = left.span().merge(&type_ref.span());
                    left = Expression::Is {
                        value: Box::new(left),
                        type_ref,
                        negated: false,
                        span,
                    };
                }
                Token::KwAs => {
                    self.advance();
                    let nullable = if self.check(&Token::Question) {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    let type_ref = self.parse_type_ref()?;
                    let span = left.span().merge(&type_ref.span());
                    left = Expression::As {
                        value: Box::new(left),
                        type_ref,
                        nullable,
                        span,
                    };
                }
                Token::KwIn => {
                    self.advance();
                    let rhs = self.parse_expression_bp(prec.next())?;
                    let span = left.span().merge(&rhs.span());
                    left = Expression::In {
                        value: Box::new(left),
                        range: Box::new(rhs),
                        negated: false,
                        span,
                    };
                }
                Token::Elvis => {
                    self.advance();
                    let rhs = self.parse_expression_bp(prec)?;
                    let span = left.span().merge(&rhs.span());
                    left = Expression::Elvis {
                        left: Box::new(left),
                        right: Box::new(rhs),
                        span,
                    };
                }
                Token::DotDot | Token::DotDotLt => {
                    let inclusive = token == Token::DotDot;
                    self.advance();
                    let rhs = self.parse_expression_bp(prec.next())?;
                    let span = left.span().merge(&rhs.span());
                    left = Expression::Range {
                        start: Box::new(left),
                        end: Box::new(rhs),
                        inclusive,
                        span,
                    };
                }
                _ => {
                    self.advance();
                    let next_min = if assoc == Associativity::Left {
                        prec.next()
                    } else {
                        prec
                    };
                    let rhs = self.parse_expression_bp(next_min)?;
                    let op = to_binary_op(&token);
                    let span = left.span().merge(&rhs.span());
                    left = Expression::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(rhs),
                        span,
                    };
                }
            }
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if let Some(op_token) = self.current.as_ref().map(|t| t.token.clone()) {
            if let Some(_prec) = op_token.unary_precedence() {
                let tok = self.advance().unwrap();
                let operand = self.parse_unary()?;
                let op = match op_token {
                    Token::Plus => UnaryOp::Plus,
                    Token::Minus => UnaryOp::Neg,
                    Token::Not => UnaryOp::Not,
                    _ => unreachable!("unary_precedence only returns Some for +, -, !"),
                };
                let span = tok.span.merge(&operand.span());
                let unary = Expression::Unary {
                    op,
                    operand: Box::new(operand),
                    span,
                };
                return self.parse_postfix(unary);
            }
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, mut expr: Expression) -> ParseResult<Expression> {
        loop {
            let Some(token) = self.current.as_ref().map(|t| t.token.clone()) else {
                break;
            };
            match token {
                Token::Dot | Token::SafeDot | Token::DoubleColon => {
                    let safe = token == Token::SafeDot;
                    self.advance();
                    let name_tok = self.expect(Token::Identifier)?;
                    let span = expr.span().merge(&name_tok.span);
                    expr = Expression::Member {
                        receiver: Box::new(expr),
                        name: name_tok.text.to_string(),
                        safe,
                        span,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let close = self.expect(Token::RBracket)?;
                    let span = expr.span().merge(&close.span);
                    expr = Expression::Index {
                        receiver: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                Token::LParen => {
                    expr = self.parse_call_args(expr, Vec::new())?;
                }
                Token::NotNullAssert => {
                    let tok = self.advance().unwrap();
                    let span = expr.span().merge(&tok.span);
                    expr = Expression::NotNullAssert {
                        inner: Box::new(expr),
                        span,
                    };
                }
                Token::Question => {
                    let tok = self.advance().unwrap();
                    let span = expr.span().merge(&tok.span);
                    expr = Expression::ErrorPropagation {
                        inner: Box::new(expr),
                        span,
                    };
                }
                Token::LBrace if self.is_call_like(&expr) => {
                    let lambda = self.parse_lambda_literal()?;
                    expr = attach_trailing_lambda(expr, lambda);
                }
                Token::Lt if self.is_call_like(&expr) => match self.try_parse_generic_type_args() {
                    Some(type_args) if self.check(&Token::LParen) => {
                        expr = self.parse_call_args(expr, type_args)?;
                    }
                    Some(type_args) if self.check(&Token::LBrace) => {
                        let lambda = self.parse_lambda_literal()?;
                        expr = attach_trailing_lambda(expr, lambda);
                        if let Expression::Call { type_args: ta, .. } = &mut expr {
                            *ta = type_args;
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        Ok(expr)
    }

    fn is_call_like(&self, expr: &Expression) -> bool {
        matches!(
            expr,
            Expression::Identifier { .. } | Expression::Member { .. } | Expression::Call { .. }
        )
    }

    /// Bounded lookahead for `Foo<A, B>` followed by `(`, `{`, `::`, `.`,
    /// or `?.` (§4.2). Commits `self` to the scanned position only on
    /// success; on failure `self` is left untouched so the caller can
    /// treat `<` as less-than instead.
    fn try_parse_generic_type_args(&mut self) -> Option<Vec<TypeRef>> {
        if !self.check(&Token::Lt) {
            return None;
        }
        let mut speculative = self.clone();
        speculative.advance();
        let mut args = Vec::new();
        loop {
            match speculative.parse_type_ref() {
                Ok(t) => args.push(t),
                Err(_) => return None,
            }
            if speculative.check(&Token::Comma) {
                speculative.advance();
                continue;
            }
            break;
        }
        if !speculative.check(&Token::Gt) {
            return None;
        }
        speculative.advance();
        let follows = speculative.check_any(&[
            Token::LParen,
            Token::LBrace,
            Token::DoubleColon,
            Token::Dot,
            Token::SafeDot,
        ]);
        if !follows {
            return None;
        }
        *self = speculative;
        Some(args)
    }

    /// Parse a call's parenthesized argument list, including the named-
    /// argument-vs-assignment and spread-argument disambiguations (§4.2).
    fn parse_call_args(&mut self, callee: Expression, type_args: Vec<TypeRef>) -> ParseResult<Expression> {
        let open = self.expect(Token::LParen)?;
        let mut positional_args = Vec::new();
        let mut named_args = Vec::new();
        let mut spread_positions = Vec::new();
        let mut arg_order = Vec::new();

        if !self.check(&Token::RParen) {
            loop {
                if self.check(&Token::Star) {
                    self.advance();
                    let idx = positional_args.len();
                    let value = self.parse_expression()?;
                    spread_positions.push(idx);
                    arg_order.push(ArgSlot::Spread(idx));
                    positional_args.push(value);
                } else if self.check(&Token::Identifier) && self.peek_next() == Some(Token::Eq) {
                    let name_tok = self.advance().unwrap();
                    self.advance();
                    let value = self.parse_expression()?;
                    arg_order.push(ArgSlot::Named(named_args.len()));
                    named_args.push((name_tok.text.to_string(), value));
                } else {
                    arg_order.push(ArgSlot::Positional(positional_args.len()));
                    positional_args.push(self.parse_expression()?);
                }
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        let close = self.expect(Token::RParen)?;
        let span = callee.span().merge(&open.span).merge(&close.span);
        Ok(Expression::Call {
            callee: Box::new(callee),
            type_args,
            positional_args,
            named_args,
            spread_positions,
            arg_order,
            trailing_lambda: None,
            span,
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| ParseError::unexpected_eof("expression", self.current_span()))?;
        let span = current.span;
        let literal = current.literal.clone();
        let token = current.token.clone();

        match token {
            Token::DecimalLiteral | Token::HexLiteral | Token::BinaryLiteral => {
                self.advance();
                match literal {
                    Some(LiteralPayload::Long(v)) => Ok(Expression::LongLiteral { value: v, span }),
                    Some(LiteralPayload::Int(v)) => Ok(Expression::IntLiteral { value: v, span }),
                    _ => Ok(Expression::IntLiteral { value: 0, span }),
                }
            }
            Token::FloatLiteral | Token::FloatExponent => {
                self.advance();
                match literal {
                    Some(LiteralPayload::Float(v)) => Ok(Expression::FloatLiteral { value: v, span }),
                    Some(LiteralPayload::Double(v)) => Ok(Expression::DoubleLiteral { value: v, span }),
                    _ => Ok(Expression::DoubleLiteral { value: 0.0, span }),
                }
            }
            Token::True => {
                self.advance();
                Ok(Expression::BoolLiteral { value: true, span })
            }
            Token::False => {
                self.advance();
                Ok(Expression::BoolLiteral { value: false, span })
            }
            Token::Null => {
                self.advance();
                Ok(Expression::NullLiteral { span })
            }
            Token::CharLiteral => {
                self.advance();
                let value = match literal {
                    Some(LiteralPayload::Char(c)) => c,
                    _ => '\0',
                };
                Ok(Expression::CharLiteral { value, span })
            }
            Token::DoubleQuote | Token::TripleDoubleQuote => self.parse_string_literal(),
            Token::Identifier => {
                let tok = self.advance().unwrap();
                Ok(Expression::Identifier {
                    name: tok.text.to_string(),
                    span,
                })
            }
            Token::KwThis => {
                self.advance();
                Ok(Expression::This { span })
            }
            Token::KwSuper => {
                self.advance();
                Ok(Expression::Super { span })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.parse_list_literal(),
            Token::HashBrace => self.parse_hash_brace_literal(),
            Token::LBrace => self.parse_lambda_literal().map(Expression::Lambda),
            Token::KwIf => self.parse_if_expr(),
            Token::KwWhen => self.parse_when_expr(),
            Token::KwUse => self.parse_use_expr(),
            Token::At => self.parse_annotated_expr(),
            _ => Err(ParseError::expected(
                current.text.to_string(),
                "expression".to_string(),
                span,
            )),
        }
    }

    fn parse_string_literal(&mut self) -> ParseResult<Expression> {
        let open = self.advance().unwrap();
        let mut parts = Vec::new();
        loop {
            let Some(token) = self.current.as_ref().map(|t| t.token.clone()) else {
                return Err(ParseError::unexpected_eof("string literal", self.current_span()));
            };
            match token {
                Token::StringPart => {
                    let tok = self.advance().unwrap();
                    let text = match &tok.literal {
                        Some(LiteralPayload::Str(s)) => s.clone(),
                        _ => tok.text.to_string(),
                    };
                    if !text.is_empty() {
                        parts.push(StringPart::Text(text));
                    }
                }
                Token::InterpStart => {
                    self.advance();
                    let expr = self.parse_expression()?;
                    self.expect(Token::InterpEnd)?;
                    parts.push(StringPart::Interpolated(Box::new(expr)));
                }
                Token::StringEnd => {
                    let close = self.advance().unwrap();
                    let span = open.span.merge(&close.span);
                    return Ok(Expression::StringLiteral { parts, span });
                }
                _ => {
                    return Err(ParseError::expected(
                        self.current.as_ref().map(|t| t.text).unwrap_or(""),
                        "string content".to_string(),
                        self.current_span(),
                    ))
                }
            }
        }
    }

    fn parse_list_literal(&mut self) -> ParseResult<Expression> {
        let open = self.expect(Token::LBracket)?;
        let mut elements = Vec::new();
        if !self.check(&Token::RBracket) {
            loop {
                if self.check(&Token::Star) {
                    self.advance();
                    elements.push(CollectionElement::Spread(self.parse_expression()?));
                } else {
                    elements.push(CollectionElement::Item(self.parse_expression()?));
                }
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        let close = self.expect(Token::RBracket)?;
        let span = open.span.merge(&close.span);
        Ok(Expression::CollectionLiteral {
            kind: CollectionKind::List,
            elements,
            span,
        })
    }

    /// `#{}` is a MAP, empty; `#{1,2}` a SET; `#{a:1}` a MAP. Elements
    /// must agree on separator kind at depth 0 or it's a parse error
    /// (§4.2, testable property 7).
    fn parse_hash_brace_literal(&mut self) -> ParseResult<Expression> {
        let open = self.expect(Token::HashBrace)?;
        if self.check(&Token::RBrace) {
            let close = self.advance().unwrap();
            return Ok(Expression::CollectionLiteral {
                kind: CollectionKind::Map,
                elements: vec![],
                span: open.span.merge(&close.span),
            });
        }

        let mut elements = Vec::new();
        let mut kind: Option<CollectionKind> = None;
        loop {
            if self.check(&Token::Star) {
                self.advance();
                elements.push(CollectionElement::Spread(self.parse_expression()?));
            } else {
                let first = self.parse_expression()?;
                if self.check(&Token::Colon) {
                    if kind == Some(CollectionKind::Set) {
                        return Err(ParseError::MixedCollectionSyntax {
                            span: self.current_span(),
                        });
                    }
                    kind = Some(CollectionKind::Map);
                    self.advance();
                    let value = self.parse_expression()?;
                    elements.push(CollectionElement::Entry { key: first, value });
                } else {
                    if kind == Some(CollectionKind::Map) {
                        return Err(ParseError::MixedCollectionSyntax {
                            span: self.current_span(),
                        });
                    }
                    kind = Some(CollectionKind::Set);
                    elements.push(CollectionElement::Item(first));
                }
            }
            if self.check(&Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        let close = self.expect(Token::RBrace)?;
        let span = open.span.merge(&close.span);
        Ok(Expression::CollectionLiteral {
            kind: kind.unwrap_or(CollectionKind::Set),
            elements,
            span,
        })
    }

    /// `{ x -> ... }` vs `{ ... }`: always a lambda in expression position
    /// (§3.3, §4.2); whether it has declared parameters depends on
    /// whether a top-level `->` precedes the matching `}` or a top-level
    /// `;`.
    pub(crate) fn parse_lambda_literal(&mut self) -> ParseResult<LambdaExpr> {
        let open = self.expect(Token::LBrace)?;
        let mut params = Vec::new();
        if self.looks_like_lambda_params() {
            if !self.check(&Token::Arrow) {
                loop {
                    let name_tok = self.expect(Token::Identifier)?;
                    let type_annotation = if self.check(&Token::Colon) {
                        self.advance();
                        Some(self.parse_type_ref()?)
                    } else {
                        None
                    };
                    params.push(LambdaParam {
                        name: name_tok.text.to_string(),
                        type_annotation,
                        span: name_tok.span,
                    });
                    if self.check(&Token::Comma) {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            self.expect(Token::Arrow)?;
        }
        let body = self.parse_block_statements(&[Token::RBrace])?;
        let close = self.expect(Token::RBrace)?;
        let span = open.span.merge(&close.span);
        Ok(LambdaExpr { params, body, span })
    }

    fn looks_like_lambda_params(&self) -> bool {
        let mut probe = self.clone();
        let mut depth: i32 = 0;
        loop {
            match probe.current.as_ref().map(|t| t.token.clone()) {
                None => return false,
                Some(Token::Arrow) if depth == 0 => return true,
                Some(Token::Semicolon) if depth == 0 => return false,
                Some(Token::RBrace) => {
                    if depth == 0 {
                        return false;
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

    fn parse_if_expr(&mut self) -> ParseResult<Expression> {
        let kw = self.expect(Token::KwIf)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let then_branch = self.parse_expression()?;
        let (else_branch, end_span) = if self.check(&Token::KwElse) {
            self.advance();
            let e = self.parse_expression()?;
            let sp = e.span();
            (Some(Box::new(e)), sp)
        } else {
            let sp = then_branch.span();
            (None, sp)
        };
        let span = kw.span.merge(&end_span);
        Ok(Expression::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch,
            span,
        })
    }

    fn parse_when_expr(&mut self) -> ParseResult<Expression> {
        let kw = self.expect(Token::KwWhen)?;
        let subject = if self.check(&Token::LParen) {
            self.advance();
            let e = self.parse_expression()?;
            self.expect(Token::RParen)?;
            Some(Box::new(e))
        } else {
            None
        };
        self.expect(Token::LBrace)?;
        self.skip_trivia();
        let mut arms = Vec::new();
        while !self.check(&Token::RBrace) {
            let start = self.current_span();
            let conditions = if self.check(&Token::KwElse) {
                self.advance();
                vec![]
            } else {
                let mut conds = vec![self.parse_expression()?];
                while self.check(&Token::Comma) {
                    self.advance();
                    conds.push(self.parse_expression()?);
                }
                conds
            };
            self.expect(Token::Arrow)?;
            let body = self.parse_expression()?;
            let span = start.merge(&body.span());
            arms.push(WhenArm {
                conditions,
                body: Box::new(body),
                span,
            });
            self.skip_trivia();
        }
        let close = self.expect(Token::RBrace)?;
        let span = kw.span.merge(&close.span);
        Ok(Expression::When { subject, arms, span })
    }

    fn parse_use_expr(&mut self) -> ParseResult<Expression> {
        let kw = self.expect(Token::KwUse)?;
        self.expect(Token::LParen)?;
        let resource = self.parse_expression()?;
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let body = self.parse_block_statements(&[Token::RBrace])?;
        let close = self.expect(Token::RBrace)?;
        let span = kw.span.merge(&close.span);
        Ok(Expression::Use {
            resource: Box::new(resource),
            body,
            span,
        })
    }

    fn parse_annotated_expr(&mut self) -> ParseResult<Expression> {
        let at = self.expect(Token::At)?;
        let name_tok = self.expect(Token::Identifier)?;
        let mut args = Vec::new();
        if self.check(&Token::LParen) {
            self.advance();
            if !self.check(&Token::RParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if self.check(&Token::Comma) {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            self.expect(Token::RParen)?;
        }
        let inner = self.parse_expression()?;
        let span = at.span.merge(&inner.span());
        Ok(Expression::Annotated {
            name: name_tok.text.to_string(),
            args,
            inner: Box::new(inner),
            span,
        })
    }
}

fn attach_trailing_lambda(expr: Expression, lambda: LambdaExpr) -> Expression {
    match expr {
        Expression::Call {
            callee,
            type_args,
            positional_args,
            named_args,
            spread_positions,
            arg_order,
            trailing_lambda: None,
            span,
        } => {
            let span = span.merge(&lambda.span);
            Expression::Call {
                callee,
                type_args,
                positional_args,
                named_args,
                spread_positions,
                arg_order,
                trailing_lambda: Some(Box::new(lambda)),
                span,
            }
        }
        other => {
            let span = other.span().merge(&lambda.span);
            Expression::Call {
                callee: Box::new(other),
                type_args: Vec::new(),
                positional_args: Vec::new(),
                named_args: Vec::new(),
                spread_positions: Vec::new(),
                arg_order: Vec::new(),
                trailing_lambda: Some(Box::new(lambda)),
                span,
            }
        }
    }
}

fn to_binary_op(token: &Token) -> BinaryOp {
    match token {
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Percent => BinaryOp::Rem,
        Token::EqEq => BinaryOp::Eq,
        Token::NotEq => BinaryOp::NotEq,
        Token::RefEq => BinaryOp::RefEq,
        Token::NotRefEq => BinaryOp::NotRefEq,
        Token::Lt => BinaryOp::Lt,
        Token::LtEq => BinaryOp::LtEq,
        Token::Gt => BinaryOp::Gt,
        Token::GtEq => BinaryOp::GtEq,
        Token::AndAnd => BinaryOp::And,
        Token::OrOr => BinaryOp::Or,
        Token::KwAnd => BinaryOp::BitAnd,
        Token::KwOr => BinaryOp::BitOr,
        Token::KwXor => BinaryOp::BitXor,
        Token::KwShl => BinaryOp::Shl,
        Token::KwShr => BinaryOp::Shr,
        other => unreachable!("{other:?} is not a generic binary operator"),
    }
}

