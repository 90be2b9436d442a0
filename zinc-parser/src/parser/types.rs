// Type annotation parsing into `TypeInfo`. Struct/class names stay
// unresolved here; the analyzer resolves them against the registry and
// registers any anonymous composite types it encounters.

use super::Parser;
use crate::ParseError;
use zinc_ast::*;
use zinc_lexer::Token;

impl Parser {
    pub(crate) fn parse_type_info(&mut self) -> Result<TypeInfo, ParseError> {
        let mut info = match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "int" => TypeInfo::new(TypeKind::Int),
                    "float" => TypeInfo::new(TypeKind::Float),
                    "bool" => TypeInfo::new(TypeKind::Bool),
                    "char" => TypeInfo::new(TypeKind::Char),
                    "string" => TypeInfo::new(TypeKind::String),
                    "void" => TypeInfo::new(TypeKind::Void),
                    _ => TypeInfo::named(name),
                }
            }
            Token::LBracket => {
                self.advance();
                let elem = self.parse_type_info()?;
                self.consume(&Token::RBracket, "expected ']' in array type")?;
                TypeInfo {
                    elem: Some(Box::new(elem)),
                    ..TypeInfo::new(TypeKind::Array)
                }
            }
            Token::LBrace => {
                self.advance();
                self.parse_brace_type()?
            }
            Token::LParen => {
                self.advance();
                self.parse_tuple_type()?
            }
            _ => return Err(self.error("expected type")),
        };

        if self.match_token(&Token::Question) {
            info.is_optional = true;
        }
        Ok(info)
    }

    /// After `{`: either a hash annotation `{K: V}` or an object
    /// annotation `{name: T, …}`. A single `ident: type` entry is a hash
    /// when the key spells a type (primitive name or capitalized).
    fn parse_brace_type(&mut self) -> Result<TypeInfo, ParseError> {
        let first_is_ident = matches!(self.peek(), Token::Ident(_));
        let first_name = match self.peek() {
            Token::Ident(n) => n.clone(),
            _ => String::new(),
        };

        if first_is_ident && self.check_ahead(1, &Token::Colon) {
            // Could still be either form; parse entries generically.
            let mut entries: Vec<(String, TypeInfo)> = Vec::new();
            while !self.check(&Token::RBrace) {
                if !entries.is_empty() {
                    self.consume(&Token::Comma, "expected ',' between fields")?;
                }
                let name = self.consume_ident("expected field name")?;
                self.consume(&Token::Colon, "expected ':' in type annotation")?;
                let ty = self.parse_type_info()?;
                entries.push((name, ty));
            }
            self.consume(&Token::RBrace, "expected '}' in type annotation")?;

            let key_is_type_name = matches!(
                first_name.as_str(),
                "int" | "float" | "bool" | "char" | "string"
            ) || first_name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase());

            if entries.len() == 1 && key_is_type_name {
                let (key_name, value) = match entries.pop() {
                    Some(e) => e,
                    None => return Err(self.error("expected hash key type")),
                };
                let key = match key_name.as_str() {
                    "int" => TypeInfo::new(TypeKind::Int),
                    "float" => TypeInfo::new(TypeKind::Float),
                    "bool" => TypeInfo::new(TypeKind::Bool),
                    "char" => TypeInfo::new(TypeKind::Char),
                    "string" => TypeInfo::new(TypeKind::String),
                    _ => TypeInfo::named(key_name),
                };
                return Ok(TypeInfo {
                    key: Some(Box::new(key)),
                    elem: Some(Box::new(value)),
                    ..TypeInfo::new(TypeKind::Hash)
                });
            }

            let fields = entries
                .into_iter()
                .map(|(name, ty)| TypeInfoField {
                    name: Some(name),
                    info: ty,
                })
                .collect();
            return Ok(TypeInfo {
                is_object: true,
                fields,
                ..TypeInfo::new(TypeKind::Class)
            });
        }

        // Key is a composite type form: `{[int]: string}` style.
        let key = self.parse_type_info()?;
        self.consume(&Token::Colon, "expected ':' in hash type")?;
        let value = self.parse_type_info()?;
        self.consume(&Token::RBrace, "expected '}' in hash type")?;
        Ok(TypeInfo {
            key: Some(Box::new(key)),
            elem: Some(Box::new(value)),
            ..TypeInfo::new(TypeKind::Hash)
        })
    }

    /// After `(`: a tuple annotation, positional `(int, string)` or named
    /// `(x: int, y: int)`; names are all-or-nothing.
    fn parse_tuple_type(&mut self) -> Result<TypeInfo, ParseError> {
        let mut fields: Vec<TypeInfoField> = Vec::new();
        let named = matches!(self.peek(), Token::Ident(_)) && self.check_ahead(1, &Token::Colon);

        while !self.check(&Token::RParen) {
            if !fields.is_empty() {
                self.consume(&Token::Comma, "expected ',' between tuple components")?;
            }
            let name = if named {
                let n = self.consume_ident("expected tuple component name")?;
                self.consume(&Token::Colon, "expected ':' after component name")?;
                Some(n)
            } else {
                None
            };
            let info = self.parse_type_info()?;
            fields.push(TypeInfoField { name, info });
        }
        self.consume(&Token::RParen, "expected ')' in tuple type")?;

        if fields.len() < 2 {
            return Err(self.error("tuple types need at least two components"));
        }
        Ok(TypeInfo {
            is_tuple: true,
            fields,
            ..TypeInfo::new(TypeKind::Struct)
        })
    }
}
