// Expression parsing: precedence chain, postfix forms, literals, and
// the expression-position control-flow constructs.

use super::Parser;
use crate::ParseError;
use zinc_ast::*;
use zinc_lexer::Token;

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> Result<Node, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_and()?;
        while self.check(&Token::Or) {
            let line = self.line();
            self.advance();
            let right = self.parse_and()?;
            left = self.binary(line, BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_equality()?;
        while self.check(&Token::And) {
            let line = self.line();
            self.advance();
            let right = self.parse_equality()?;
            left = self.binary(line, BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.parse_comparison()?;
            left = self.binary(line, op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary(line, op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(line, op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(line, op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        let op = match self.peek() {
            Token::Not => Some(UnaryOp::Not),
            Token::Minus => Some(UnaryOp::Neg),
            Token::Plus => Some(UnaryOp::Pos),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.line();
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(self.node(
                line,
                NodeKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Node, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Token::LParen if expr.is_ident() => {
                    let line = expr.line;
                    let callee = match &expr.kind {
                        NodeKind::Ident(name) => name.clone(),
                        _ => break,
                    };
                    let args = self.parse_call_args()?;
                    expr = self.node(
                        line,
                        NodeKind::Call {
                            callee,
                            args,
                            is_struct_init: false,
                        },
                    );
                }
                Token::LBracket => {
                    let line = self.line();
                    self.advance();
                    let index = self.parse_expression()?;
                    self.consume(&Token::RBracket, "expected ']' after index")?;
                    expr = self.node(
                        line,
                        NodeKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                Token::Dot => {
                    self.advance();
                    expr = self.parse_field_access(expr)?;
                }
                Token::Question => {
                    let line = self.line();
                    self.advance();
                    expr = self.node(
                        line,
                        NodeKind::OptionalCheck {
                            expr: Box::new(expr),
                        },
                    );
                }
                Token::Increment | Token::Decrement => {
                    let line = self.line();
                    let op = if matches!(self.advance(), Token::Increment) {
                        PostfixOp::Increment
                    } else {
                        PostfixOp::Decrement
                    };
                    expr = self.node(
                        line,
                        NodeKind::Postfix {
                            op,
                            target: Box::new(expr),
                        },
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// One step of `.`-access. Surface tuple access `.0` is rewritten to
    /// the canonical `_0` field name; a float-shaped token after the dot
    /// (`a.0.1`) is re-split into two accesses.
    fn parse_field_access(&mut self, base: Node) -> Result<Node, ParseError> {
        let line = self.line();
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(self.node(
                    line,
                    NodeKind::FieldAccess {
                        base: Box::new(base),
                        field: name,
                        is_dot_int: false,
                    },
                ))
            }
            Token::IntLiteral(digits) => {
                self.advance();
                Ok(self.node(
                    line,
                    NodeKind::FieldAccess {
                        base: Box::new(base),
                        field: format!("_{}", digits),
                        is_dot_int: true,
                    },
                ))
            }
            Token::FloatLiteral(raw) => {
                if raw.contains(['e', 'E']) {
                    return Err(self.error("expected field name after '.'"));
                }
                self.advance();
                let (first, second) = match raw.split_once('.') {
                    Some(parts) => parts,
                    None => return Err(self.error("expected field name after '.'")),
                };
                let inner = self.node(
                    line,
                    NodeKind::FieldAccess {
                        base: Box::new(base),
                        field: format!("_{}", first),
                        is_dot_int: true,
                    },
                );
                Ok(self.node(
                    line,
                    NodeKind::FieldAccess {
                        base: Box::new(inner),
                        field: format!("_{}", second),
                        is_dot_int: true,
                    },
                ))
            }
            _ => Err(self.error("expected field name after '.'")),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Node>, ParseError> {
        self.consume(&Token::LParen, "expected '('")?;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            if !args.is_empty() {
                self.consume(&Token::Comma, "expected ',' between arguments")?;
            }
            // `name: expr` is a named argument (struct/class instantiation).
            if matches!(self.peek(), Token::Ident(_)) && self.check_ahead(1, &Token::Colon) {
                let line = self.line();
                let name = self.consume_ident("expected argument name")?;
                self.consume(&Token::Colon, "expected ':'")?;
                let value = self.parse_expression()?;
                args.push(self.node(
                    line,
                    NodeKind::NamedArg {
                        name,
                        value: Box::new(value),
                    },
                ));
            } else {
                args.push(self.parse_expression()?);
            }
        }
        self.consume(&Token::RParen, "expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        match self.peek().clone() {
            Token::IntLiteral(raw) => {
                self.advance();
                let value: i64 = raw
                    .parse()
                    .map_err(|_| self.error("integer literal out of range"))?;
                Ok(self.node(line, NodeKind::IntLit(value)))
            }
            Token::FloatLiteral(raw) => {
                self.advance();
                let value: f64 = raw
                    .parse()
                    .map_err(|_| self.error("malformed float literal"))?;
                Ok(self.node(line, NodeKind::FloatLit(value)))
            }
            Token::StringLiteral(raw) => {
                self.advance();
                self.parse_string_literal(&raw, line)
            }
            Token::CharLiteral(raw) => {
                self.advance();
                Ok(self.node(line, NodeKind::CharLit(zinc_lexer::unescape_char(&raw))))
            }
            Token::True => {
                self.advance();
                Ok(self.node(line, NodeKind::BoolLit(true)))
            }
            Token::False => {
                self.advance();
                Ok(self.node(line, NodeKind::BoolLit(false)))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(self.node(line, NodeKind::Ident(name)))
            }
            Token::If => self.parse_if(false),
            Token::Unless => self.parse_if(true),
            Token::While => self.parse_while(false),
            Token::Until => self.parse_while(true),
            Token::For => self.parse_for(),
            Token::LParen => self.parse_paren(),
            Token::LBracket => self.parse_bracket(),
            Token::LBrace => self.parse_brace(),
            _ => Err(self.error("expected expression")),
        }
    }

    /// `(expr)` grouping, or a tuple literal: `(1, "x")` / `(x: 1, y: 2)`.
    fn parse_paren(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.consume(&Token::LParen, "expected '('")?;

        if self.check(&Token::RParen) {
            return Err(self.error("expected expression inside '()'"));
        }

        // `ident:` opens a named tuple.
        let named = matches!(self.peek(), Token::Ident(_)) && self.check_ahead(1, &Token::Colon);
        if named {
            let mut elems = Vec::new();
            while !self.check(&Token::RParen) {
                if !elems.is_empty() {
                    self.consume(&Token::Comma, "expected ',' between tuple elements")?;
                }
                let name = self.consume_ident("expected tuple element name")?;
                self.consume(&Token::Colon, "expected ':' after tuple element name")?;
                let value = self.parse_expression()?;
                elems.push(TupleElem {
                    name: Some(name),
                    value,
                });
            }
            self.consume(&Token::RParen, "expected ')' after tuple")?;
            return Ok(self.node(line, NodeKind::Tuple { elems }));
        }

        let first = self.parse_expression()?;
        if !self.check(&Token::Comma) {
            self.consume(&Token::RParen, "expected ')' after expression")?;
            return Ok(first);
        }

        let mut elems = vec![TupleElem {
            name: None,
            value: first,
        }];
        while self.match_token(&Token::Comma) {
            if matches!(self.peek(), Token::Ident(_)) && self.check_ahead(1, &Token::Colon) {
                return Err(self.error("tuple elements must be all named or all positional"));
            }
            elems.push(TupleElem {
                name: None,
                value: self.parse_expression()?,
            });
        }
        self.consume(&Token::RParen, "expected ')' after tuple")?;
        Ok(self.node(line, NodeKind::Tuple { elems }))
    }

    /// `[1, 2, 3]` array literal, or `[int]` typed empty array.
    fn parse_bracket(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.consume(&Token::LBracket, "expected '['")?;

        if self.check(&Token::RBracket) {
            return Err(self.error("empty array literal needs an element type, e.g. [int]"));
        }

        // Backtracking probe for the typed-empty form.
        let saved = self.current;
        if let Ok(info) = self.parse_type_info() {
            if self.check(&Token::RBracket) && Self::annotation_is_unambiguous(&info) {
                self.advance();
                return Ok(self.node(line, NodeKind::TypedEmptyArray { elem: info }));
            }
        }
        self.current = saved;

        let mut elems = Vec::new();
        while !self.check(&Token::RBracket) {
            if !elems.is_empty() {
                self.consume(&Token::Comma, "expected ',' between array elements")?;
            }
            elems.push(self.parse_expression()?);
        }
        self.consume(&Token::RBracket, "expected ']' after array literal")?;
        Ok(self.node(line, NodeKind::ArrayLit { elems }))
    }

    /// `{"k": v}` hash literal, `{name: v}` object literal, or
    /// `{string: int}` typed empty hash.
    fn parse_brace(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.consume(&Token::LBrace, "expected '{'")?;

        if self.match_token(&Token::RBrace) {
            return Ok(self.node(line, NodeKind::HashLit { pairs: Vec::new() }));
        }

        // Backtracking probe for the typed-empty form.
        let saved = self.current;
        if let Ok(key) = self.parse_type_info() {
            if self.match_token(&Token::Colon) {
                if let Ok(value) = self.parse_type_info() {
                    if self.check(&Token::RBrace)
                        && Self::annotation_is_unambiguous(&key)
                        && Self::annotation_is_unambiguous(&value)
                    {
                        self.advance();
                        return Ok(self.node(line, NodeKind::TypedEmptyHash { key, value }));
                    }
                }
            }
        }
        self.current = saved;

        // `ident:` keys make an object literal; anything else is a hash.
        if matches!(self.peek(), Token::Ident(_)) && self.check_ahead(1, &Token::Colon) {
            let mut fields = Vec::new();
            while !self.check(&Token::RBrace) {
                if !fields.is_empty() {
                    self.consume(&Token::Comma, "expected ',' between object fields")?;
                }
                let name = self.consume_ident("expected object field name")?;
                self.consume(&Token::Colon, "expected ':' after object field name")?;
                let value = self.parse_expression()?;
                fields.push((name, value));
            }
            self.consume(&Token::RBrace, "expected '}' after object literal")?;
            return Ok(self.node(line, NodeKind::ObjectLit { fields }));
        }

        let mut pairs = Vec::new();
        while !self.check(&Token::RBrace) {
            if !pairs.is_empty() {
                self.consume(&Token::Comma, "expected ',' between hash entries")?;
            }
            let key = self.parse_expression()?;
            self.consume(&Token::Colon, "expected ':' after hash key")?;
            let value = self.parse_expression()?;
            pairs.push((key, value));
        }
        self.consume(&Token::RBrace, "expected '}' after hash literal")?;
        Ok(self.node(line, NodeKind::HashLit { pairs }))
    }

    /// Whether an annotation parsed by the typed-empty probe is clearly a
    /// type and not an expression. Named types must be capitalized to
    /// qualify (a lowercase identifier is read as a variable).
    fn annotation_is_unambiguous(info: &TypeInfo) -> bool {
        match info.kind {
            TypeKind::Struct | TypeKind::Class => {
                if info.is_object || info.is_tuple {
                    return true;
                }
                info.name
                    .as_deref()
                    .and_then(|n| n.chars().next())
                    .is_some_and(|c| c.is_ascii_uppercase())
            }
            _ => true,
        }
    }

    fn binary(&self, line: u32, op: BinaryOp, lhs: Node, rhs: Node) -> Node {
        self.node(
            line,
            NodeKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }
}
