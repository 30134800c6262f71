//! Type reference parsing: simple names, generics, nullability, and
//! function types.

use super::Parser;
use crate::ast::TypeRef;
use crate::error::ParseResult;
use crate::token::Token;

impl<'a> Parser<'a> {
    /// Parse a type reference. Handles `Foo`, `Foo<Bar, Baz>`, `Foo?`,
    /// and `(Foo, Bar) -> Baz` / `Foo.(Bar) -> Baz` function types.
    pub(crate) fn parse_type_ref(&mut self) -> ParseResult<TypeRef> {
        let ty = if self.check(&Token::LParen) {
            self.parse_function_type(None)?
        } else {
            self.parse_simple_or_receiver_function_type()?
        };
        self.parse_nullable_suffix(ty)
    }

    fn parse_nullable_suffix(&mut self, inner: TypeRef) -> ParseResult<TypeRef> {
        if self.check(&Token::Question) {
            let q = self.expect(Token::Question)?;
            let span = inner.span().merge(&q.span);
            Ok(TypeRef::Nullable {
                inner: Box::new(inner),
                span,
            })
        } else {
            Ok(inner)
        }
    }

    /// A simple name, possibly generic, possibly the receiver of a
    /// function type (`Foo.(Bar) -> Baz`).
    fn parse_simple_or_receiver_function_type(&mut self) -> ParseResult<TypeRef> {
        let start = self.current_span();
        let name_tok = self.expect(Token::Identifier)?;
        let name = name_tok.text.to_string();

        let mut type_args = Vec::new();
        if self.check(&Token::Lt) {
            self.advance();
            loop {
                type_args.push(self.parse_type_ref()?);
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(Token::Gt)?;
        }

        if self.check(&Token::Dot) && self.peek_next() == Some(Token::LParen) {
            self.advance();
            let receiver = TypeRef::Simple {
                name,
                type_args,
                span: start,
            };
            return self.parse_function_type(Some(receiver));
        }

        let end = name_tok.span;
        Ok(TypeRef::Simple {
            name,
            type_args,
            span: start.merge(&end),
        })
    }

    fn parse_function_type(&mut self, receiver: Option<TypeRef>) -> ParseResult<TypeRef> {
        let start = self.current_span();
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                params.push(self.parse_type_ref()?);
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        self.expect(Token::Arrow)?;
        let return_type = self.parse_type_ref()?;
        let span = start.merge(&return_type.span());
        Ok(TypeRef::Function {
            receiver: receiver.map(Box::new),
            params,
            return_type: Box::new(return_type),
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::Parser;
    use crate::ast::TypeRef;

    fn parse_ty(src: &str) -> TypeRef {
        let mut parser = Parser::new(src);
        parser.advance();
        parser.parse_type_ref().unwrap()
    }

    #[test]
    fn simple_type() {
        assert!(matches!(parse_ty("Int"), TypeRef::Simple { name, .. } if name == "Int"));
    }

    #[test]
    fn nullable_type() {
        assert!(matches!(parse_ty("String?"), TypeRef::Nullable { .. }));
    }

    #[test]
    fn generic_type() {
        match parse_ty("List<Int>") {
            TypeRef::Simple { name, type_args, .. } => {
                assert_eq!(name, "List");
                assert_eq!(type_args.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn function_type() {
        assert!(matches!(parse_ty("(Int, Int) -> Int"), TypeRef::Function { .. }));
    }
}
