use logos::Logos;

/// Unescape a raw string-literal body.
///
/// String tokens carry their raw source text because the parser's
/// interpolation pass needs to see `\{` before it is collapsed to `{`.
/// The parser calls this on each literal segment after splitting.
pub fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('0') => result.push('\0'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('\\') => result.push('\\'),
                Some('{') => result.push('{'),
                Some('}') => result.push('}'),
                Some('u') => {
                    // Unicode escape: \uXXXX
                    let hex: String = chars.by_ref().take(4).collect();
                    if let Ok(code) = u32::from_str_radix(&hex, 16) {
                        if let Some(unicode_char) = char::from_u32(code) {
                            result.push(unicode_char);
                        }
                    }
                }
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Unescape a raw char-literal body (the text between the quotes).
pub fn unescape_char(raw: &str) -> char {
    unescape_string(raw).chars().next().unwrap_or('\0')
}

/// Token types for the Zinc programming language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Keywords
    #[token("func")]
    Func,
    #[token("let")]
    Let,
    #[token("var")]
    Var,
    #[token("struct")]
    Struct,
    #[token("class")]
    Class,
    #[token("extern")]
    Extern,
    #[token("weak")]
    Weak,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("unless")]
    Unless,
    #[token("while")]
    While,
    #[token("until")]
    Until,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Compound assignment operators (must come BEFORE single operators)
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,

    // Operators
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("++")]
    Increment,
    #[token("--")]
    Decrement,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Not,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("?")]
    Question,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    // Literals
    // Float literal with optional scientific notation: 3.14, 1.5e10, 2.0E-5.
    // Stored raw: the parser re-splits float-shaped tokens that are really
    // chained tuple accesses (a.0.1).
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    FloatLiteral(String),

    // Decimal integer, stored raw (parser validates range)
    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    IntLiteral(String),

    // String literal, stored raw (escapes and interpolation are handled
    // by the parser)
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    StringLiteral(String),

    // Char literal, stored raw
    #[regex(r"'([^'\\]|\\.)'", |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    CharLiteral(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Comments (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*([^*]|\*[^/])*\*/", logos::skip)]
    BlockComment,
}

/// A token together with its 1-based source line and byte span.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub line: u32,
    pub span: std::ops::Range<usize>,
}

pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    source: &'source str,
    scanned: usize,
    line: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            source,
            scanned: 0,
            line: 1,
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<TokenSpan, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let span = self.inner.span();

        // Incremental line tracking: count newlines skipped since the
        // previous token.
        let gap = self.source.get(self.scanned..span.start).unwrap_or("");
        self.line += gap.chars().filter(|&c| c == '\n').count() as u32;
        self.scanned = span.start;

        match token {
            Ok(tok) => Some(Ok(TokenSpan {
                token: tok,
                line: self.line,
                span,
            })),
            Err(_) => Some(Err(LexError::InvalidToken {
                line: self.line,
                span,
            })),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("invalid token at line {line}")]
    InvalidToken {
        line: u32,
        span: std::ops::Range<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Lexer::new(src).map(|t| t.unwrap().token).collect()
    }

    #[test]
    fn test_keywords_and_operators() {
        assert_eq!(
            tokens("let x = 1 + 2"),
            vec![
                Token::Let,
                Token::Ident("x".to_string()),
                Token::Eq,
                Token::IntLiteral("1".to_string()),
                Token::Plus,
                Token::IntLiteral("2".to_string()),
            ]
        );
    }

    #[test]
    fn test_compound_ops_win_over_singles() {
        assert_eq!(
            tokens("x += 1"),
            vec![
                Token::Ident("x".to_string()),
                Token::PlusEq,
                Token::IntLiteral("1".to_string()),
            ]
        );
        assert_eq!(tokens("x++")[1], Token::Increment);
    }

    #[test]
    fn test_string_kept_raw() {
        assert_eq!(
            tokens(r#""a\{b {x}""#),
            vec![Token::StringLiteral(r"a\{b {x}".to_string())]
        );
    }

    #[test]
    fn test_dot_int_lexes_as_float() {
        // a.0.1 lexes as ident, dot, float-shaped token; the parser re-splits.
        assert_eq!(
            tokens("a.0.1"),
            vec![
                Token::Ident("a".to_string()),
                Token::Dot,
                Token::FloatLiteral("0.1".to_string()),
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let spans: Vec<TokenSpan> = Lexer::new("let x\n\n  var y")
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(spans[0].line, 1);
        assert_eq!(spans[2].line, 3);
        assert_eq!(spans[3].line, 3);
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            tokens("1 // comment\n/* block */ 2"),
            vec![
                Token::IntLiteral("1".to_string()),
                Token::IntLiteral("2".to_string()),
            ]
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_string(r"a\nb\{c"), "a\nb{c");
        assert_eq!(unescape_char(r"\n"), '\n');
        assert_eq!(unescape_char("x"), 'x');
    }
}
