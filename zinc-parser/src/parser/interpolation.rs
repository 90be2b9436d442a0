// String interpolation, desugared at parse time.
//
// A literal like `"sum is {a + b}!"` becomes the concat tree
// `"sum is " + (a + b) + "!"`. Embedded expressions are parsed by a
// sub-parser whose line offset points back at the literal, so analysis
// errors inside interpolations report the right line.

use super::Parser;
use crate::ParseError;
use zinc_ast::*;
use zinc_lexer::unescape_string;

enum Part {
    Literal(String),
    Expr(String),
}

impl Parser {
    /// Build the AST for a raw string-literal body: a plain `StrLit` when
    /// there is no interpolation, otherwise the desugared concat tree.
    pub(crate) fn parse_string_literal(
        &mut self,
        raw: &str,
        line: u32,
    ) -> Result<Node, ParseError> {
        let parts = split_parts(raw);

        let only_literal = matches!(parts.as_slice(), [Part::Literal(_)] | []);
        if only_literal {
            let text = match parts.into_iter().next() {
                Some(Part::Literal(t)) => t,
                _ => String::new(),
            };
            return Ok(self.str_lit(line, unescape_string(&text)));
        }

        // Desugar: fold the parts into a left-leaning `+` tree. The fold
        // starts from a string literal so the whole tree types as string.
        let mut parts = parts.into_iter();
        let mut acc = match parts.next() {
            Some(Part::Literal(text)) => self.str_lit(line, unescape_string(&text)),
            Some(Part::Expr(src)) => {
                let lit = self.str_lit(line, String::new());
                let expr = self.parse_embedded(&src, line)?;
                self.concat(line, lit, expr)
            }
            None => self.str_lit(line, String::new()),
        };

        for part in parts {
            let rhs = match part {
                Part::Literal(text) => self.str_lit(line, unescape_string(&text)),
                Part::Expr(src) => self.parse_embedded(&src, line)?,
            };
            acc = self.concat(line, acc, rhs);
        }

        Ok(acc)
    }

    fn parse_embedded(&mut self, src: &str, line: u32) -> Result<Node, ParseError> {
        if src.trim().is_empty() {
            return Err(ParseError::SyntaxError {
                line,
                message: "empty interpolation".to_string(),
            });
        }
        let mut sub = Parser::with_line_offset(src, line.saturating_sub(1))?;
        let expr = sub.parse_expression()?;
        if !sub.is_at_end() {
            return Err(ParseError::SyntaxError {
                line,
                message: "unexpected trailing tokens in interpolation".to_string(),
            });
        }
        Ok(expr)
    }

    fn str_lit(&self, line: u32, value: String) -> Node {
        self.node(
            line,
            NodeKind::StrLit {
                value,
                string_id: None,
            },
        )
    }

    fn concat(&self, line: u32, lhs: Node, rhs: Node) -> Node {
        self.node(
            line,
            NodeKind::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }
}

/// Split a raw literal body into literal segments (escapes intact) and
/// interpolated expression sources. Braces nest inside interpolations so
/// hash literals can appear there; `\{` stays a literal brace.
fn split_parts(raw: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                literal.push(ch);
                if let Some(next) = chars.next() {
                    literal.push(next);
                }
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                let mut depth = 1usize;
                let mut expr = String::new();
                for inner in chars.by_ref() {
                    match inner {
                        '{' => {
                            depth += 1;
                            expr.push(inner);
                        }
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                            expr.push(inner);
                        }
                        _ => expr.push(inner),
                    }
                }
                parts.push(Part::Expr(expr));
            }
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    parts
}
