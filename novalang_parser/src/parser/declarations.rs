//! Declaration parsing: functions, properties, classes, interfaces,
//! objects, enums, imports, and the modifier-set prefix shared by all of
//! them (§3.3, §4.2).

use super::statements::starts_statement_declaration;
use super::Parser;
use crate::ast::{
    ClassDecl, Declaration, DestructuringDecl, EnumDecl, EnumEntry, FunctionBody, FunctionDecl,
    ImportDecl, InterfaceDecl, ObjectDecl, Param, PropertyDecl, TypeParam, TypeRef,
};
use crate::error::{ParseError, ParseResult};
use crate::modifiers::{Modifier, ModifierSet};
use crate::token::Token;

impl<'a> Parser<'a> {
    /// Parse one top-level or class-member declaration, including any
    /// leading modifiers. Dispatches on the keyword that follows the
    /// modifier prefix.
    pub(crate) fn parse_top_level_declaration(&mut self) -> ParseResult<Declaration> {
        let modifiers = self.parse_modifiers()?;

        match self.current.as_ref().map(|t| t.token.clone()) {
            Some(Token::KwFun) => self.parse_function_decl(modifiers).map(Declaration::Function),
            Some(Token::KwVal) | Some(Token::KwVar) => self.parse_val_or_var(modifiers),
            Some(Token::KwClass) => self.parse_class_decl(modifiers, false).map(Declaration::Class),
            Some(Token::KwInterface) => self.parse_interface_decl(modifiers).map(Declaration::Interface),
            Some(Token::KwObject) => self.parse_object_decl(modifiers).map(Declaration::Object),
            Some(Token::KwEnum) => self.parse_enum_decl(modifiers).map(Declaration::Enum),
            Some(Token::KwInit) => self.parse_init_block(),
            Some(Token::Identifier) if self.current_text() == "data" && self.peek_next() == Some(Token::KwClass) => {
                self.advance();
                self.parse_class_decl(modifiers, true).map(Declaration::Class)
            }
            _ => {
                let span = self.current_span();
                let found = self
                    .current
                    .as_ref()
                    .map(|t| t.text.to_string())
                    .unwrap_or_else(|| "end of input".to_string());
                Err(ParseError::expected(found, "declaration".to_string(), span))
            }
        }
    }

    fn current_text(&self) -> &str {
        self.current.as_ref().map(|t| t.text).unwrap_or("")
    }

    /// Consume a run of modifier keywords, validating mutual exclusivity
    /// as each is seen (§3.3, §4.2: two modifiers in the same group, or a
    /// literal duplicate, is `ParseError::ConflictingModifier`).
    fn parse_modifiers(&mut self) -> ParseResult<ModifierSet> {
        let mut set = ModifierSet::new();
        while let Some(token) = self.current.as_ref().map(|t| t.token.clone()) {
            let Some(modifier) = Modifier::from_token(&token) else {
                break;
            };
            let span = self.current_span();
            self.advance();
            set.try_add(modifier, span)?;
        }
        Ok(set)
    }

    pub(crate) fn parse_import(&mut self) -> ParseResult<ImportDecl> {
        let kw = self.expect(Token::KwImport)?;
        let mut path = vec![self.expect(Token::Identifier)?.text.to_string()];
        while self.check(&Token::Dot) {
            self.advance();
            path.push(self.expect(Token::Identifier)?.text.to_string());
        }
        let path_tail = path.last().cloned().unwrap_or_default();

        let mut alias = None;
        let mut end_span = kw.span;
        if self.check(&Token::KwAs) {
            self.advance();
            let alias_tok = self.expect(Token::Identifier)?;
            end_span = alias_tok.span;
            alias = Some(alias_tok.text.to_string());
        }
        let span = kw.span.merge(&end_span);
        Ok(ImportDecl {
            path,
            path_tail,
            alias,
            span,
        })
    }

    fn parse_init_block(&mut self) -> ParseResult<Declaration> {
        let kw = self.expect(Token::KwInit)?;
        self.expect(Token::LBrace)?;
        let body = self.parse_block_statements(&[Token::RBrace])?;
        let close = self.expect(Token::RBrace)?;
        Ok(Declaration::InitBlock {
            body,
            span: kw.span.merge(&close.span),
        })
    }

    // ==================== Functions ====================

    /// `fun [<T>] [Receiver.] name(params) [: ReturnType] (= expr | { body })`.
    ///
    /// The extension-receiver form (§4.2) is resolved by speculatively
    /// parsing a type after `fun`: if a `.` follows, it was a receiver; if
    /// not, the parsed name *is* the function name and the speculative
    /// parse is discarded by construction (we only ever commit the type
    /// once we've confirmed the following `.`).
    fn parse_function_decl(&mut self, modifiers: ModifierSet) -> ParseResult<FunctionDecl> {
        let kw = self.expect(Token::KwFun)?;
        let type_params = self.parse_optional_type_params()?;

        let (receiver, name) = self.parse_function_receiver_and_name()?;

        let params = self.parse_param_list()?;
        let return_type = if self.check(&Token::Colon) {
            self.advance();
            Some(self.parse_type_ref()?)
        } else {
            None
        };

        let (body, end_span) = if self.check(&Token::Eq) {
            self.advance();
            let expr = self.parse_expression()?;
            let span = expr.span();
            (FunctionBody::Expression(Box::new(expr)), span)
        } else if self.check(&Token::LBrace) {
            self.advance();
            let stmts = self.parse_block_statements(&[Token::RBrace])?;
            let close = self.expect(Token::RBrace)?;
            (FunctionBody::Block(stmts), close.span)
        } else {
            // `abstract fun foo(): Int` — declared with no body.
            let span = return_type
                .as_ref()
                .map(|t| t.span())
                .unwrap_or(self.current_span());
            (FunctionBody::Abstract, span)
        };

        let span = kw.span.merge(&end_span);
        Ok(FunctionDecl {
            name,
            modifiers,
            type_params,
            receiver,
            params,
            return_type,
            body,
            span,
        })
    }

    /// Speculatively parse `Type.name` vs. a bare `name` after `fun`
    /// (§4.2's extension-receiver disambiguation).
    fn parse_function_receiver_and_name(&mut self) -> ParseResult<(Option<TypeRef>, String)> {
        if self.check(&Token::Identifier) {
            let mut probe = self.clone();
            if let Ok(candidate_type) = probe.parse_type_ref() {
                if probe.check(&Token::Dot) {
                    probe.advance();
                    if probe.check(&Token::Identifier) {
                        let name_tok = probe.expect(Token::Identifier)?;
                        *self = probe;
                        return Ok((Some(candidate_type), name_tok.text.to_string()));
                    }
                }
            }
        }
        let name_tok = self.expect(Token::Identifier)?;
        Ok((None, name_tok.text.to_string()))
    }

    fn parse_param_list(&mut self) -> ParseResult<Vec<Param>> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let is_vararg = if self.check(&Token::Star) {
                    self.advance();
                    true
                } else {
                    false
                };
                let name_tok = self.expect(Token::Identifier)?;
                let type_annotation = if self.check(&Token::Colon) {
                    self.advance();
                    Some(self.parse_type_ref()?)
                } else {
                    None
                };
                let default_value = if self.check(&Token::Eq) {
                    self.advance();
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                let end = default_value
                    .as_ref()
                    .map(|e| e.span())
                    .or_else(|| type_annotation.as_ref().map(|t| t.span()))
                    .unwrap_or(name_tok.span);
                params.push(Param {
                    name: name_tok.text.to_string(),
                    type_annotation,
                    default_value,
                    is_vararg,
                    span: name_tok.span.merge(&end),
                });
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn parse_optional_type_params(&mut self) -> ParseResult<Vec<TypeParam>> {
        if !self.check(&Token::Lt) {
            return Ok(Vec::new());
        }
        self.advance();
        let mut params = Vec::new();
        loop {
            let name_tok = self.expect(Token::Identifier)?;
            let bound = if self.check(&Token::Colon) {
                self.advance();
                Some(self.parse_type_ref()?)
            } else {
                None
            };
            let end = bound.as_ref().map(|b| b.span()).unwrap_or(name_tok.span);
            params.push(TypeParam {
                name: name_tok.text.to_string(),
                bound,
                span: name_tok.span.merge(&end),
            });
            if self.check(&Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(Token::Gt)?;
        Ok(params)
    }

    // ==================== Properties & destructuring ====================

    fn parse_val_or_var(&mut self, modifiers: ModifierSet) -> ParseResult<Declaration> {
        let is_var = self.check(&Token::KwVar);
        let kw = self.advance().unwrap();
        if self.check(&Token::LParen) {
            return self
                .parse_destructuring_tail(is_var, kw.span)
                .map(Declaration::Destructuring);
        }
        self.parse_property_tail(modifiers, is_var, kw.span)
            .map(Declaration::Property)
    }

    /// `val (a, b) = pair` (§4.4 destructuring-declaration desugaring).
    fn parse_destructuring_tail(&mut self, is_var: bool, start: crate::span::Span) -> ParseResult<DestructuringDecl> {
        self.expect(Token::LParen)?;
        let mut bindings = Vec::new();
        loop {
            bindings.push(self.expect(Token::Identifier)?.text.to_string());
            if self.check(&Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(Token::RParen)?;
        self.expect(Token::Eq)?;
        let initializer = self.parse_expression()?;
        let span = start.merge(&initializer.span());
        Ok(DestructuringDecl {
            is_var,
            bindings,
            initializer,
            span,
        })
    }

    fn parse_property_tail(
        &mut self,
        modifiers: ModifierSet,
        is_var: bool,
        start: crate::span::Span,
    ) -> ParseResult<PropertyDecl> {
        let name_tok = self.expect(Token::Identifier)?;
        let name = name_tok.text.to_string();
        let type_annotation = if self.check(&Token::Colon) {
            self.advance();
            Some(self.parse_type_ref()?)
        } else {
            None
        };
        let initializer = if self.check(&Token::Eq) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        let mut end_span = initializer
            .as_ref()
            .map(|e| e.span())
            .or_else(|| type_annotation.as_ref().map(|t| t.span()))
            .unwrap_or(name_tok.span);

        // Accessors on a following line (§4.2): `get()`/`set(v)` bodies,
        // optionally prefixed by a visibility modifier. Speculate past a
        // modifier run so a following declaration's modifiers are never
        // consumed by mistake.
        let mut getter = None;
        let mut setter = None;
        loop {
            let mut probe = self.clone();
            probe.skip_trivia_except_accessor_boundary();
            while let Some(tok) = probe.current.as_ref().map(|t| t.token.clone()) {
                if Modifier::from_token(&tok).is_none() {
                    break;
                }
                probe.advance();
            }
            let is_get = probe.check(&Token::Identifier) && probe.current_text() == "get";
            let is_set = probe.check(&Token::Identifier) && probe.current_text() == "set";
            if !is_get && !is_set {
                break;
            }
            *self = probe;
            let accessor = self.parse_accessor_function(is_get)?;
            end_span = accessor.span;
            if is_get {
                getter = Some(Box::new(accessor));
            } else {
                setter = Some(Box::new(accessor));
            }
        }

        let span = start.merge(&end_span);
        Ok(PropertyDecl {
            name,
            is_var,
            modifiers,
            type_annotation,
            initializer,
            getter,
            setter,
            span,
        })
    }

    fn skip_trivia_except_accessor_boundary(&mut self) {
        while self.check(&Token::Newline) {
            self.advance();
        }
    }

    fn parse_accessor_function(&mut self, is_get: bool) -> ParseResult<FunctionDecl> {
        let kw = self.expect(Token::Identifier)?; // "get" or "set"
        let params = if self.check(&Token::LParen) {
            self.parse_param_list()?
        } else {
            Vec::new()
        };
        let return_type = if self.check(&Token::Colon) {
            self.advance();
            Some(self.parse_type_ref()?)
        } else {
            None
        };
        let (body, end_span) = if self.check(&Token::Eq) {
            self.advance();
            let expr = self.parse_expression()?;
            let span = expr.span();
            (FunctionBody::Expression(Box::new(expr)), span)
        } else if self.check(&Token::LBrace) {
            self.advance();
            let stmts = self.parse_block_statements(&[Token::RBrace])?;
            let close = self.expect(Token::RBrace)?;
            (FunctionBody::Block(stmts), close.span)
        } else {
            (FunctionBody::Abstract, kw.span)
        };
        let span = kw.span.merge(&end_span);
        Ok(FunctionDecl {
            name: if is_get { "get" } else { "set" }.to_string(),
            modifiers: ModifierSet::new(),
            type_params: Vec::new(),
            receiver: None,
            params,
            return_type,
            body,
            span,
        })
    }

    // ==================== Class / interface / object / enum ====================

    fn parse_class_decl(&mut self, modifiers: ModifierSet, is_data: bool) -> ParseResult<ClassDecl> {
        let kw = self.expect(Token::KwClass)?;
        let name = self.expect(Token::Identifier)?.text.to_string();
        let type_params = self.parse_optional_type_params()?;
        let primary_constructor = if self.check(&Token::LParen) {
            self.parse_param_list()?
        } else {
            Vec::new()
        };

        let (superclass, interfaces) = self.parse_optional_supertypes()?;
        let (members, end_span) = self.parse_optional_member_body()?;

        let span = kw.span.merge(&end_span.unwrap_or(
            interfaces
                .last()
                .map(|t: &TypeRef| t.span())
                .or_else(|| superclass.as_ref().map(|t| t.span()))
                .unwrap_or(kw.span),
        ));
        Ok(ClassDecl {
            name,
            modifiers,
            is_data,
            type_params,
            primary_constructor,
            superclass,
            interfaces,
            members,
            span,
        })
    }

    fn parse_interface_decl(&mut self, modifiers: ModifierSet) -> ParseResult<InterfaceDecl> {
        let kw = self.expect(Token::KwInterface)?;
        let name = self.expect(Token::Identifier)?.text.to_string();
        let type_params = self.parse_optional_type_params()?;
        let (_, superinterfaces) = self.parse_optional_supertypes()?;
        let (members, end_span) = self.parse_optional_member_body()?;
        let span = kw.span.merge(&end_span.unwrap_or(kw.span));
        Ok(InterfaceDecl {
            name,
            modifiers,
            type_params,
            superinterfaces,
            members,
            span,
        })
    }

    fn parse_object_decl(&mut self, modifiers: ModifierSet) -> ParseResult<ObjectDecl> {
        let kw = self.expect(Token::KwObject)?;
        let name = self.expect(Token::Identifier)?.text.to_string();
        let (superclass, interfaces) = self.parse_optional_supertypes()?;
        let (members, end_span) = self.parse_optional_member_body()?;
        let span = kw.span.merge(&end_span.unwrap_or(kw.span));
        Ok(ObjectDecl {
            name,
            modifiers,
            superclass,
            interfaces,
            members,
            span,
        })
    }

    fn parse_enum_decl(&mut self, modifiers: ModifierSet) -> ParseResult<EnumDecl> {
        let kw = self.expect(Token::KwEnum)?;
        let name = self.expect(Token::Identifier)?.text.to_string();
        self.expect(Token::LBrace)?;
        self.skip_trivia();

        let mut entries = Vec::new();
        while self.check(&Token::Identifier) {
            let entry_tok = self.advance().unwrap();
            let mut args = Vec::new();
            let mut end_span = entry_tok.span;
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
                let close = self.expect(Token::RParen)?;
                end_span = close.span;
            }
            entries.push(EnumEntry {
                name: entry_tok.text.to_string(),
                args,
                span: entry_tok.span.merge(&end_span),
            });
            if self.check(&Token::Comma) {
                self.advance();
                self.skip_trivia();
                continue;
            }
            break;
        }
        self.skip_trivia();

        let mut members = Vec::new();
        if self.check(&Token::Semicolon) {
            self.advance();
            self.skip_trivia();
            while !self.check(&Token::RBrace) {
                members.push(self.parse_top_level_declaration()?);
                self.skip_trivia();
            }
        }
        let close = self.expect(Token::RBrace)?;
        let span = kw.span.merge(&close.span);
        Ok(EnumDecl {
            name,
            modifiers,
            entries,
            members,
            span,
        })
    }

    /// `: Superclass(args), Interface1, Interface2` — the first supertype
    /// is the superclass only when it is itself followed by a constructor
    /// call; interfaces never take arguments.
    fn parse_optional_supertypes(&mut self) -> ParseResult<(Option<TypeRef>, Vec<TypeRef>)> {
        if !self.check(&Token::Colon) {
            return Ok((None, Vec::new()));
        }
        self.advance();
        let mut superclass = None;
        let mut interfaces = Vec::new();
        let mut first = true;
        loop {
            let ty = self.parse_type_ref()?;
            if first && self.check(&Token::LParen) {
                self.advance();
                if !self.check(&Token::RParen) {
                    loop {
                        self.parse_expression()?;
                        if self.check(&Token::Comma) {
                            self.advance();
                            continue;
                        }
                        break;
                    }
                }
                self.expect(Token::RParen)?;
                superclass = Some(ty);
            } else {
                interfaces.push(ty);
            }
            first = false;
            if self.check(&Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok((superclass, interfaces))
    }

    /// An optional `{ members }` body shared by class/interface/object
    /// declarations; member declarations may themselves be preceded by
    /// statement-shaped constructs (nested `val`/`var`/`fun`), so this
    /// reuses the same top-level-declaration parser recursively.
    fn parse_optional_member_body(&mut self) -> ParseResult<(Vec<Declaration>, Option<crate::span::Span>)> {
        if !self.check(&Token::LBrace) {
            return Ok((Vec::new(), None));
        }
        self.advance();
        self.skip_trivia();
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.check_any(&[
                Token::KwFun,
                Token::KwVal,
                Token::KwVar,
                Token::KwClass,
                Token::KwInterface,
                Token::KwObject,
                Token::KwEnum,
                Token::KwInit,
            ]) || self.check_any(&[
                Token::KwPublic,
                Token::KwPrivate,
                Token::KwProtected,
                Token::KwInternal,
                Token::KwAbstract,
                Token::KwOpen,
                Token::KwFinal,
                Token::KwOverride,
                Token::KwInline,
                Token::KwStatic,
            ]) {
                members.push(self.parse_top_level_declaration()?);
            } else if self.check(&Token::Identifier) && self.current_text() == "data" {
                members.push(self.parse_top_level_declaration()?);
            } else {
                break;
            }
            self.skip_trivia();
        }
        let close = self.expect(Token::RBrace)?;
        Ok((members, Some(close.span)))
    }
}

/// Whether `token` can start a class/interface/object member, used by
/// callers deciding whether an indented line continues a member list
/// rather than closing the enclosing body.
pub(crate) fn starts_member_declaration(token: &Token) -> bool {
    starts_statement_declaration(token)
        || matches!(
            token,
            Token::KwInterface | Token::KwObject | Token::KwEnum | Token::KwInit
        )
}
