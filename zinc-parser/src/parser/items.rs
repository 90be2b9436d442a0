// Top-level items: function definitions, struct/class definitions,
// extern blocks.

use super::Parser;
use crate::ParseError;
use zinc_ast::*;
use zinc_lexer::Token;

impl Parser {
    /// `func name(a: T, b: U) { … }` with optional `: R` return annotation.
    pub(crate) fn parse_func(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.consume(&Token::Func, "expected 'func'")?;
        let name = self.consume_ident("expected function name after 'func'")?;
        let params = self.parse_params()?;

        let return_annotation = if self.match_token(&Token::Colon) {
            Some(self.parse_type_info()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        Ok(self.node(
            line,
            NodeKind::FuncDef {
                name,
                params,
                return_annotation,
                body: Box::new(body),
            },
        ))
    }

    pub(crate) fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.consume(&Token::LParen, "expected '(' after function name")?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            if !params.is_empty() {
                self.consume(&Token::Comma, "expected ',' between parameters")?;
            }
            let line = self.line();
            let name = self.consume_ident("expected parameter name")?;
            self.consume(&Token::Colon, "expected ':' after parameter name")?;
            let annotation = self.parse_type_info()?;
            params.push(Param {
                name,
                annotation,
                line,
            });
        }
        self.consume(&Token::RParen, "expected ')' after parameters")?;
        Ok(params)
    }

    /// `struct Name { var x: int let y: float = 1.5 }` or
    /// `class Name { var n: int weak var parent: Name? }`.
    pub(crate) fn parse_type_def(&mut self, is_class: bool) -> Result<Node, ParseError> {
        let line = self.line();
        self.advance(); // consume 'struct' / 'class'
        let name = self.consume_ident("expected type name")?;
        self.consume(&Token::LBrace, "expected '{' after type name")?;

        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.match_token(&Token::Semicolon) {
                continue;
            }
            fields.push(self.parse_field_def()?);
        }
        self.consume(&Token::RBrace, "expected '}' after fields")?;

        Ok(self.node(
            line,
            NodeKind::TypeDef {
                name,
                is_class,
                fields,
            },
        ))
    }

    fn parse_field_def(&mut self) -> Result<FieldDef, ParseError> {
        let line = self.line();
        let is_weak = self.match_token(&Token::Weak);

        let is_const = if self.match_token(&Token::Var) {
            false
        } else if self.match_token(&Token::Let) {
            true
        } else if is_weak {
            return Err(self.error("expected 'var' after 'weak'"));
        } else {
            return Err(self.error("expected 'var' or 'let' field declaration"));
        };

        let name = self.consume_ident("expected field name")?;
        self.consume(&Token::Colon, "expected ':' after field name")?;
        let annotation = self.parse_type_info()?;

        let default = if self.match_token(&Token::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(FieldDef {
            name,
            annotation,
            is_const,
            is_weak,
            default,
            line,
        })
    }

    /// `extern { func puts(s: string): int  var errno: int }`
    pub(crate) fn parse_extern_block(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.consume(&Token::Extern, "expected 'extern'")?;
        self.consume(&Token::LBrace, "expected '{' after 'extern'")?;

        let mut items = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.match_token(&Token::Semicolon) {
                continue;
            }
            let item_line = self.line();
            if self.match_token(&Token::Func) {
                let name = self.consume_ident("expected extern function name")?;
                let params = self.parse_params()?;
                let return_annotation = if self.match_token(&Token::Colon) {
                    Some(self.parse_type_info()?)
                } else {
                    None
                };
                items.push(self.node(
                    item_line,
                    NodeKind::ExternFunc {
                        name,
                        params,
                        return_annotation,
                    },
                ));
            } else if self.check(&Token::Var) || self.check(&Token::Let) {
                let is_const = matches!(self.advance(), Token::Let);
                let name = self.consume_ident("expected extern variable name")?;
                self.consume(&Token::Colon, "expected ':' after extern variable name")?;
                let annotation = self.parse_type_info()?;
                items.push(self.node(
                    item_line,
                    NodeKind::ExternVar {
                        name,
                        annotation,
                        is_const,
                    },
                ));
            } else {
                return Err(self.error("expected 'func', 'var' or 'let' in extern block"));
            }
        }
        self.consume(&Token::RBrace, "expected '}' after extern block")?;

        Ok(self.node(line, NodeKind::ExternBlock { items }))
    }

    /// `{ stmt* }`; the block's value is its final expression. Errors
    /// inside a block are collected and the parser resynchronizes at the
    /// next statement boundary.
    pub(crate) fn parse_block(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.consume(&Token::LBrace, "expected '{'")?;

        let mut body = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.match_token(&Token::Semicolon) {
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_statement();
                }
            }
        }
        self.consume(&Token::RBrace, "expected '}' to close block")?;

        Ok(self.node(line, NodeKind::Block { body }))
    }
}
