// Recursive-descent parser for the Zinc language.
//
// Desugaring happens here, at parse time: `unless` becomes `if !`,
// `until` becomes `while !`, and string interpolation becomes a `+`
// concat tree. The analyzer and emitter never see the sugared forms.

use crate::ParseError;
use zinc_ast::*;
use zinc_lexer::{Lexer, Token, TokenSpan};

mod expressions;
mod interpolation;
mod items;
mod statements;
mod types;

pub struct Parser {
    pub(crate) tokens: Vec<TokenSpan>,
    pub(crate) current: usize,
    /// Added to every token line; non-zero for the sub-parsers that
    /// handle interpolated expressions.
    pub(crate) line_offset: u32,
    pub(crate) errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        Self::with_line_offset(source, 0)
    }

    pub(crate) fn with_line_offset(source: &str, line_offset: u32) -> Result<Self, ParseError> {
        let lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        for tok in lexer {
            match tok {
                Ok(t) => tokens.push(t),
                Err(e) => {
                    let line = match &e {
                        zinc_lexer::LexError::InvalidToken { line, .. } => *line,
                    };
                    return Err(ParseError::LexerError {
                        line: line + line_offset,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            tokens,
            current: 0,
            line_offset,
            errors: Vec::new(),
        })
    }

    /// Parse a whole source file. Errors are collected with top-level
    /// resynchronization so one bad item does not hide the rest.
    pub fn parse(&mut self) -> Result<Program, Vec<ParseError>> {
        let mut items = Vec::new();

        while !self.is_at_end() {
            let result = if self.check(&Token::Func) {
                self.parse_func()
            } else if self.check(&Token::Struct) {
                self.parse_type_def(false)
            } else if self.check(&Token::Class) {
                self.parse_type_def(true)
            } else if self.check(&Token::Extern) {
                self.parse_extern_block()
            } else if self.match_token(&Token::Semicolon) {
                continue;
            } else {
                Err(self.error("expected top-level item (func, struct, class, extern)"))
            };

            match result {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_top_level();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Program { items })
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    // ==================== Helper Methods ====================

    pub(crate) fn match_token(&mut self, kind: &Token) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &Token) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
        }
    }

    pub(crate) fn check_ahead(&self, offset: usize, kind: &Token) -> bool {
        match self.tokens.get(self.current + offset) {
            Some(span) => std::mem::discriminant(&span.token) == std::mem::discriminant(kind),
            None => false,
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    pub(crate) fn peek(&self) -> &Token {
        self.tokens
            .get(self.current)
            .map(|t| &t.token)
            .unwrap_or(&Token::Semicolon)
    }

    pub(crate) fn previous(&self) -> &Token {
        self.tokens
            .get(self.current.saturating_sub(1))
            .map(|t| &t.token)
            .unwrap_or(&Token::Semicolon)
    }

    /// 1-based line of the current token (or of the last token at EOF),
    /// with the interpolation offset applied.
    pub(crate) fn line(&self) -> u32 {
        let idx = self.current.min(self.tokens.len().saturating_sub(1));
        let raw = self.tokens.get(idx).map(|t| t.line).unwrap_or(1);
        raw + self.line_offset
    }

    pub(crate) fn node(&self, line: u32, kind: NodeKind) -> Node {
        Node::new(line, kind)
    }

    pub(crate) fn consume(&mut self, kind: &Token, message: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn consume_ident(&mut self, message: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(message)),
        }
    }

    pub(crate) fn error(&self, message: &str) -> ParseError {
        ParseError::SyntaxError {
            line: self.line(),
            message: message.to_string(),
        }
    }

    // ==================== Error Recovery ====================

    /// Skip forward to the next top-level item keyword.
    pub(crate) fn synchronize_top_level(&mut self) {
        while !self.is_at_end() {
            if self.check(&Token::Func)
                || self.check(&Token::Struct)
                || self.check(&Token::Class)
                || self.check(&Token::Extern)
            {
                return;
            }
            self.advance();
        }
    }

    /// Skip to the next statement boundary inside a block: a `;` at the
    /// current brace depth, or the block's closing `}` (left unconsumed).
    pub(crate) fn synchronize_statement(&mut self) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.peek() {
                Token::LBrace => {
                    depth += 1;
                    self.advance();
                }
                Token::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                Token::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}
