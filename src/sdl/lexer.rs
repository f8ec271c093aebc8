//! SDL tokenizer.
//!
//! Shared by the tree parser and by the cursor location scanner, so it never
//! fails: malformed input yields tokens plus [`ParseError`]s. Comments and
//! whitespace (other than newlines) produce no tokens.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ParseError, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    String { raw: bool, terminated: bool },
    Number,
    Date,
    Duration,
    Binary { terminated: bool },
    Colon,
    Equals,
    LBrace,
    RBrace,
    Semicolon,
    Newline,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range<usize>,
}

impl Token {
    pub fn text<'s>(&self, src: &'s str) -> &'s str {
        &src[self.range.clone()]
    }

    /// Statement terminators end a tag's value/attribute list.
    pub fn ends_statement(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::LBrace | TokenKind::RBrace
        )
    }

    /// Decode this token as an SDL literal, if it is one.
    pub fn value(&self, src: &str) -> Option<Value> {
        let text = self.text(src);
        let (kind, decoded) = match self.kind {
            TokenKind::String { raw, terminated } => {
                let end = if terminated { text.len() - 1 } else { text.len() };
                let body = &text[1..end.max(1)];
                let decoded = if raw {
                    body.to_string()
                } else {
                    unescape(body)
                };
                (ValueType::String, decoded)
            }
            TokenKind::Number => (ValueType::Number, text.to_string()),
            TokenKind::Date => (ValueType::Date, text.to_string()),
            TokenKind::Duration => (ValueType::Duration, text.to_string()),
            TokenKind::Binary { terminated } => {
                let end = if terminated { text.len() - 1 } else { text.len() };
                (ValueType::Binary, text[1..end.max(1)].trim().to_string())
            }
            TokenKind::Identifier => match text {
                "true" | "on" => (ValueType::Boolean, "true".to_string()),
                "false" | "off" => (ValueType::Boolean, "false".to_string()),
                "null" => (ValueType::Null, "null".to_string()),
                _ => return None,
            },
            _ => return None,
        };

        Some(Value {
            kind,
            text: decoded,
            range: self.range.clone(),
        })
    }
}

/// Keywords that lex as identifiers but denote literal values.
pub fn is_literal_keyword(text: &str) -> bool {
    matches!(text, "true" | "false" | "on" | "off" | "null")
}

#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<ParseError>,
    /// The input ended inside a line or block comment.
    pub ends_in_comment: bool,
}

pub fn tokenize(src: &str) -> Lexed {
    let mut lexer = Lexer {
        src,
        pos: 0,
        out: Lexed::default(),
    };
    lexer.run();
    lexer.out
}

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+[lL]?$").unwrap());
static FLOAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(\d+\.\d*|\.\d+|\d+)([fFdD]|[bB][dD])?$").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}/\d{1,2}/\d{1,2}$").unwrap());
static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(\d+d:)?\d+:\d{2}(:\d{2}(\.\d{1,3})?)?$").unwrap());
static TIME_AFTER_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]+\d{1,2}:\d{2}(:\d{2}(\.\d{1,3})?)?(-[A-Za-z0-9:+/]+)?").unwrap());

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    out: Lexed,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.out.tokens.push(Token {
            kind,
            range: start..self.pos,
        });
    }

    fn error(&mut self, range: Range<usize>, message: impl Into<String>) {
        self.out.errors.push(ParseError::error(range, message));
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                '\n' => {
                    self.bump();
                    self.push(TokenKind::Newline, start);
                }
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' => self.line_continuation(),
                '/' if self.peek_nth(1) == Some('/') => self.line_comment(),
                '/' if self.peek_nth(1) == Some('*') => self.block_comment(),
                '#' => self.line_comment(),
                '-' if self.peek_nth(1) == Some('-') => self.line_comment(),
                '"' => self.string(),
                '`' => self.raw_string(),
                '[' => self.binary(),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                ';' => self.single(TokenKind::Semicolon),
                ':' => self.single(TokenKind::Colon),
                '=' => self.single(TokenKind::Equals),
                c if c.is_ascii_digit() => self.number(),
                '-' | '.' if self.peek_nth(1).is_some_and(|n| n.is_ascii_digit()) => self.number(),
                c if is_identifier_start(c) => self.identifier(),
                c => {
                    self.bump();
                    self.push(TokenKind::Unknown, start);
                    self.error(start..self.pos, format!("Unexpected character '{c}'"));
                }
            }
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.pos;
        self.bump();
        self.push(kind, start);
    }

    fn line_continuation(&mut self) {
        let start = self.pos;
        self.bump();
        while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
            self.bump();
        }
        match self.peek() {
            Some('\n') => {
                self.bump();
            }
            None => {}
            Some(_) => self.error(start..start + 1, "Unexpected character '\\'"),
        }
    }

    fn line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                return;
            }
            self.bump();
        }
        self.out.ends_in_comment = true;
    }

    fn block_comment(&mut self) {
        let start = self.pos;
        self.bump();
        self.bump();
        while self.peek().is_some() {
            if self.src[self.pos..].starts_with("*/") {
                self.pos += 2;
                return;
            }
            self.bump();
        }
        self.out.ends_in_comment = true;
        self.error(start..self.pos, "Unterminated block comment");
    }

    fn string(&mut self) {
        let start = self.pos;
        self.bump();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.push(
                        TokenKind::String {
                            raw: false,
                            terminated: false,
                        },
                        start,
                    );
                    self.error(start..self.pos, "Unterminated string");
                    return;
                }
                Some('\\') => {
                    self.bump();
                    // A backslash at the end of a line continues the string.
                    if self.peek() == Some('\r') {
                        self.bump();
                    }
                    self.bump();
                }
                Some('"') => {
                    self.bump();
                    self.push(
                        TokenKind::String {
                            raw: false,
                            terminated: true,
                        },
                        start,
                    );
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn raw_string(&mut self) {
        let start = self.pos;
        self.bump();
        while let Some(c) = self.bump() {
            if c == '`' {
                self.push(
                    TokenKind::String {
                        raw: true,
                        terminated: true,
                    },
                    start,
                );
                return;
            }
        }
        self.push(
            TokenKind::String {
                raw: true,
                terminated: false,
            },
            start,
        );
        self.error(start..self.pos, "Unterminated string");
    }

    fn binary(&mut self) {
        let start = self.pos;
        self.bump();
        while let Some(c) = self.bump() {
            if c == ']' {
                self.push(TokenKind::Binary { terminated: true }, start);
                return;
            }
        }
        self.push(TokenKind::Binary { terminated: false }, start);
        self.error(start..self.pos, "Unterminated binary literal");
    }

    fn number(&mut self) {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '/' | '_'))
        {
            self.bump();
        }

        let text = &self.src[start..self.pos];
        let kind = if DATE_RE.is_match(text) {
            if let Some(time) = TIME_AFTER_DATE_RE.find(&self.src[self.pos..]) {
                self.pos += time.end();
            }
            TokenKind::Date
        } else if DURATION_RE.is_match(text) {
            TokenKind::Duration
        } else {
            if !INTEGER_RE.is_match(text) && !FLOAT_RE.is_match(text) {
                let message = format!("Invalid number literal '{text}'");
                self.error(start..self.pos, message);
            }
            TokenKind::Number
        };
        self.push(kind, start);
    }

    fn identifier(&mut self) {
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.bump();
        }
        self.push(TokenKind::Identifier, start);
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '$')
}

/// Decode the escapes of a double-quoted string body.
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('\r') | Some('\n') => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
