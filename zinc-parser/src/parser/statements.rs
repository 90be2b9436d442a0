// Statement-position parsing: declarations, control-flow jumps,
// assignments, expression statements.

use super::Parser;
use crate::ParseError;
use zinc_ast::*;
use zinc_lexer::Token;

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> Result<Node, ParseError> {
        match self.peek() {
            Token::Let | Token::Var => self.parse_decl(),
            Token::Break => self.parse_break(),
            Token::Continue => self.parse_continue(),
            Token::Return => self.parse_return(),
            _ => self.parse_expr_statement(),
        }
    }

    /// `let x = e` / `var x: T = e`.
    pub(crate) fn parse_decl(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        let mutable = matches!(self.advance(), Token::Var);
        let name = self.consume_ident("expected variable name")?;

        let annotation = if self.match_token(&Token::Colon) {
            Some(self.parse_type_info()?)
        } else {
            None
        };

        self.consume(&Token::Eq, "expected '=' in declaration")?;
        let init = self.parse_expression()?;

        Ok(self.node(
            line,
            NodeKind::Decl {
                mutable,
                name,
                annotation,
                init: Box::new(init),
            },
        ))
    }

    fn parse_break(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.advance();
        let value = self.parse_jump_value(line)?;
        Ok(self.node(line, NodeKind::Break { value }))
    }

    fn parse_continue(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.advance();
        let value = self.parse_jump_value(line)?;
        Ok(self.node(line, NodeKind::Continue { value }))
    }

    fn parse_return(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.advance();
        let value = self.parse_jump_value(line)?;
        Ok(self.node(line, NodeKind::Return { value }))
    }

    /// A `break`/`continue`/`return` value must start on the same line as
    /// the keyword; otherwise the next line is an independent statement.
    fn parse_jump_value(&mut self, keyword_line: u32) -> Result<Option<Box<Node>>, ParseError> {
        if self.is_at_end()
            || self.check(&Token::RBrace)
            || self.check(&Token::Semicolon)
            || self.line() != keyword_line
        {
            return Ok(None);
        }
        Ok(Some(Box::new(self.parse_expression()?)))
    }

    /// An expression in statement position, possibly continued into an
    /// assignment or compound assignment.
    fn parse_expr_statement(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        let expr = self.parse_expression()?;

        if self.match_token(&Token::Eq) {
            let value = self.parse_expression()?;
            return Ok(self.node(
                line,
                NodeKind::Assign {
                    target: Box::new(expr),
                    value: Box::new(value),
                },
            ));
        }

        let compound = match self.peek() {
            Token::PlusEq => Some(BinaryOp::Add),
            Token::MinusEq => Some(BinaryOp::Sub),
            Token::StarEq => Some(BinaryOp::Mul),
            Token::SlashEq => Some(BinaryOp::Div),
            Token::PercentEq => Some(BinaryOp::Mod),
            _ => None,
        };
        if let Some(op) = compound {
            self.advance();
            let value = self.parse_expression()?;
            return Ok(self.node(
                line,
                NodeKind::CompoundAssign {
                    target: Box::new(expr),
                    op,
                    value: Box::new(value),
                },
            ));
        }

        Ok(expr)
    }

    /// `if cond { … } [else { … } | else if …]`. Also the desugar target
    /// for `unless`, which negates its condition.
    pub(crate) fn parse_if(&mut self, negate: bool) -> Result<Node, ParseError> {
        let line = self.line();
        self.advance(); // 'if' / 'unless'
        let mut cond = self.parse_expression()?;
        if negate {
            cond = self.node(
                cond.line,
                NodeKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(cond),
                },
            );
        }
        let then_block = self.parse_block()?;

        let else_block = if self.match_token(&Token::Else) {
            if self.check(&Token::If) {
                // else-if chain: wrap the nested if in a block so both
                // branches are uniformly blocks.
                let nested_line = self.line();
                let nested = self.parse_if(false)?;
                Some(Box::new(self.node(
                    nested_line,
                    NodeKind::Block { body: vec![nested] },
                )))
            } else {
                Some(Box::new(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(self.node(
            line,
            NodeKind::If {
                cond: Box::new(cond),
                then_block: Box::new(then_block),
                else_block,
            },
        ))
    }

    /// `while cond { … }`. Also the desugar target for `until`: the
    /// condition is wrapped in `!`, so `until false` reaches the
    /// analyzer as the always-true form `while !false`.
    pub(crate) fn parse_while(&mut self, negate: bool) -> Result<Node, ParseError> {
        let line = self.line();
        self.advance(); // 'while' / 'until'
        let mut cond = self.parse_expression()?;
        if negate {
            cond = self.node(
                cond.line,
                NodeKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(cond),
                },
            );
        }
        let body = self.parse_block()?;
        Ok(self.node(
            line,
            NodeKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
            },
        ))
    }

    /// C-style `for init; cond; step { … }`; each clause may be empty.
    pub(crate) fn parse_for(&mut self) -> Result<Node, ParseError> {
        let line = self.line();
        self.advance(); // 'for'

        let init = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        self.consume(&Token::Semicolon, "expected ';' after for-loop init")?;

        let cond = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.consume(&Token::Semicolon, "expected ';' after for-loop condition")?;

        let step = if self.check(&Token::LBrace) {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };

        let body = self.parse_block()?;
        Ok(self.node(
            line,
            NodeKind::For {
                init,
                cond,
                step,
                body: Box::new(body),
            },
        ))
    }
}
