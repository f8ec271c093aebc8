//! SDL (Simple Declarative Language) document model and parser.
//!
//! `dub.sdl` recipes are SDL documents: a tree of tags, each with an
//! optional `namespace:` prefix, a name, positional values, `key=value`
//! attributes and an optional `{ ... }` block of child tags.
//!
//! ```text
//! name "my-package"
//! dependency "vibe-d" version="~>0.9.0"
//! configuration "unittest" {
//!     targetType "executable"
//! }
//! x:ddoxFilterArgs "--min-protection=Public"
//! ```
//!
//! The parser is tolerant. It always produces a [`Document`]; problems are
//! collected in [`Document::errors`] and parsing resumes at the next
//! statement. All ranges are byte offsets into the parsed text.

pub mod lexer;

use std::{collections::BTreeMap, fmt, ops::Range};

use lexer::{is_literal_keyword, tokenize, Token, TokenKind};

/// Name given to tags that start with a value instead of a name.
pub const ANONYMOUS_TAG: &str = "content";

/// Deepest block nesting kept in the tree. Deeper blocks are reported and
/// skipped, so walkers over [`Tag::children`] stay within a bounded depth.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Null,
    Date,
    Duration,
    Binary,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Null => "null",
            ValueType::Date => "date",
            ValueType::Duration => "duration",
            ValueType::Binary => "binary",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A literal value. `text` holds the decoded value (strings unescaped,
/// booleans normalized to `true`/`false`, everything else verbatim).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub kind: ValueType,
    pub text: String,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: String,
    pub name_range: Range<usize>,
    pub value: Value,
}

impl Attribute {
    /// `ns:name` for namespaced attributes, `name` otherwise.
    pub fn qualified_name(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub namespace: Option<String>,
    pub name: String,
    pub name_range: Range<usize>,
    /// Whole statement including its child block. `None` for the root.
    pub range: Option<Range<usize>>,
    pub values: Vec<Value>,
    pub attributes: Vec<Attribute>,
    /// Child tags in source order, namespaced or not.
    pub children: Vec<Tag>,
}

impl Tag {
    pub fn qualified_name(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }

    /// Children written without a namespace prefix, grouped by name.
    pub fn tags(&self) -> BTreeMap<&str, Vec<&Tag>> {
        let mut map: BTreeMap<&str, Vec<&Tag>> = BTreeMap::new();
        for child in self.children.iter().filter(|c| c.namespace.is_none()) {
            map.entry(child.name.as_str()).or_default().push(child);
        }
        map
    }

    /// Namespaced children, grouped by namespace and then by name.
    pub fn namespaces(&self) -> BTreeMap<&str, BTreeMap<&str, Vec<&Tag>>> {
        let mut map: BTreeMap<&str, BTreeMap<&str, Vec<&Tag>>> = BTreeMap::new();
        for child in &self.children {
            if let Some(namespace) = child.namespace.as_deref() {
                map.entry(namespace)
                    .or_default()
                    .entry(child.name.as_str())
                    .or_default()
                    .push(child);
            }
        }
        map
    }

    /// Attribute values grouped by qualified attribute name.
    pub fn attribute_map(&self) -> BTreeMap<String, Vec<&Value>> {
        let mut map: BTreeMap<String, Vec<&Value>> = BTreeMap::new();
        for attribute in &self.attributes {
            map.entry(attribute.qualified_name())
                .or_default()
                .push(&attribute.value);
        }
        map
    }

    /// Depth-first iterator over this tag's descendants (not including itself).
    pub fn descendants(&self) -> impl Iterator<Item = &Tag> {
        let mut stack: Vec<&Tag> = self.children.iter().rev().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
}

pub(crate) fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) if !namespace.is_empty() => format!("{namespace}:{name}"),
        _ => name.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub range: Option<Range<usize>>,
    pub message: String,
    pub severity: Severity,
}

impl ParseError {
    pub fn error(range: Range<usize>, message: impl Into<String>) -> Self {
        ParseError {
            range: Some(range),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(range: Range<usize>, message: impl Into<String>) -> Self {
        ParseError {
            range: Some(range),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub root: Tag,
    pub errors: Vec<ParseError>,
}

/// Parse SDL text. Never fails; see [`Document::errors`].
pub fn parse(text: &str) -> Document {
    let lexed = tokenize(text);
    let mut parser = Parser {
        src: text,
        tokens: lexed.tokens,
        pos: 0,
        depth: 0,
        errors: lexed.errors,
    };

    let mut root = Tag::default();
    parser.parse_children(&mut root, None);

    let mut errors = parser.errors;
    errors.sort_by_key(|e| e.range.as_ref().map(|r| r.start));
    Document { root, errors }
}

struct Parser<'s> {
    src: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    errors: Vec<ParseError>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(token)
    }

    fn is_identifier(&self, n: usize) -> bool {
        self.peek_nth(n).is_some_and(|t| {
            t.kind == TokenKind::Identifier && !is_literal_keyword(t.text(self.src))
        })
    }

    fn is_kind(&self, n: usize, kind: TokenKind) -> bool {
        self.peek_nth(n).is_some_and(|t| t.kind == kind)
    }

    /// Parse statements into `parent` until end of input, or until the `}`
    /// matching `open` (left unconsumed for the caller).
    fn parse_children(&mut self, parent: &mut Tag, open: Option<Range<usize>>) {
        loop {
            match self.peek_kind() {
                None => {
                    if let Some(brace) = open {
                        self.errors
                            .push(ParseError::error(brace, "Missing closing '}'"));
                    }
                    return;
                }
                Some(TokenKind::Newline | TokenKind::Semicolon) => {
                    self.pos += 1;
                }
                Some(TokenKind::RBrace) => {
                    if open.is_some() {
                        return;
                    }
                    if let Some(token) = self.advance() {
                        self.errors
                            .push(ParseError::error(token.range, "Unexpected '}'"));
                    }
                }
                Some(_) => {
                    if let Some(tag) = self.parse_tag() {
                        parent.children.push(tag);
                    }
                }
            }
        }
    }

    fn parse_tag(&mut self) -> Option<Tag> {
        let first = self.peek()?.clone();
        let start = first.range.start;
        let mut tag = Tag::default();

        if self.is_identifier(0) {
            if self.is_kind(1, TokenKind::Colon) && self.is_identifier(2) {
                let name = self.tokens[self.pos + 2].clone();
                tag.namespace = Some(first.text(self.src).to_string());
                tag.name = name.text(self.src).to_string();
                tag.name_range = start..name.range.end;
                self.pos += 3;
            } else {
                tag.name = first.text(self.src).to_string();
                tag.name_range = first.range.clone();
                self.pos += 1;
            }
        } else if let Some(value) = first.value(self.src) {
            tag.name = ANONYMOUS_TAG.to_string();
            tag.name_range = start..start;
            tag.values.push(value);
            self.pos += 1;
        } else {
            self.errors
                .push(ParseError::error(first.range.clone(), "Expected a tag name"));
            self.skip_statement();
            return None;
        }

        let mut end = self.tokens[self.pos - 1].range.end;
        while let Some(token) = self.peek().cloned() {
            if token.ends_statement() {
                break;
            }

            if self.is_identifier(0) && self.is_kind(1, TokenKind::Equals) {
                self.pos += 2;
                let attribute = self.parse_attribute_value(None, token.range.clone());
                end = self.tokens[self.pos - 1].range.end;
                tag.attributes.extend(attribute);
                continue;
            }
            if self.is_identifier(0)
                && self.is_kind(1, TokenKind::Colon)
                && self.is_identifier(2)
                && self.is_kind(3, TokenKind::Equals)
            {
                let name = self.tokens[self.pos + 2].clone();
                self.pos += 4;
                let namespace = token.text(self.src).to_string();
                let attribute =
                    self.parse_attribute_value(Some(namespace), token.range.start..name.range.end);
                end = self.tokens[self.pos - 1].range.end;
                tag.attributes.extend(attribute);
                continue;
            }

            self.pos += 1;
            end = token.range.end;
            match token.value(self.src) {
                Some(value) => {
                    if !tag.attributes.is_empty() {
                        self.errors.push(ParseError::warning(
                            value.range.clone(),
                            "Values should come before attributes",
                        ));
                    }
                    tag.values.push(value);
                }
                None if token.kind == TokenKind::Identifier => {
                    self.errors.push(ParseError::error(
                        token.range.clone(),
                        format!("Unexpected identifier '{}'", token.text(self.src)),
                    ));
                }
                // Lexer already reported unknown characters.
                None if token.kind == TokenKind::Unknown => {}
                None => {
                    self.errors.push(ParseError::error(
                        token.range.clone(),
                        format!("Unexpected '{}'", token.text(self.src)),
                    ));
                }
            }
        }

        if self.peek_kind() == Some(TokenKind::LBrace) {
            if self.depth >= MAX_DEPTH {
                let brace = self.tokens[self.pos].range.clone();
                self.errors
                    .push(ParseError::error(brace.clone(), "Nesting too deep"));
                end = self.skip_block().unwrap_or(brace.end);
            } else {
                let brace = self.advance()?.range;
                end = brace.end;
                self.depth += 1;
                self.parse_children(&mut tag, Some(brace));
                self.depth -= 1;
                if let Some(close) = self.peek().filter(|t| t.kind == TokenKind::RBrace).cloned()
                {
                    self.pos += 1;
                    end = close.range.end;
                } else if let Some(last) = self.tokens.get(self.pos.saturating_sub(1)) {
                    end = end.max(last.range.end);
                }
            }
        }

        tag.range = Some(start..end);
        Some(tag)
    }

    /// The `name=` part has been consumed; read the value.
    fn parse_attribute_value(
        &mut self,
        namespace: Option<String>,
        name_range: Range<usize>,
    ) -> Option<Attribute> {
        let name = match namespace {
            Some(_) => self.src[name_range.clone()]
                .split_once(':')
                .map(|(_, name)| name.to_string())
                .unwrap_or_default(),
            None => self.src[name_range.clone()].to_string(),
        };

        let value = self
            .peek()
            .filter(|t| !t.ends_statement())
            .and_then(|t| t.value(self.src));
        match value {
            Some(value) => {
                self.pos += 1;
                Some(Attribute {
                    namespace,
                    name,
                    name_range,
                    value,
                })
            }
            None => {
                let equals = self.tokens[self.pos - 1].range.clone();
                self.errors.push(ParseError::error(
                    name_range.start..equals.end,
                    format!("Expected a value for attribute '{name}'"),
                ));
                None
            }
        }
    }

    /// Error recovery: drop the rest of the statement, keeping braces balanced.
    fn skip_statement(&mut self) {
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Newline | TokenKind::Semicolon => return,
                TokenKind::RBrace => return,
                TokenKind::LBrace => {
                    self.skip_block();
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Drop a `{ ... }` block starting at the current `{`, nested blocks
    /// included. Returns the end of the matching `}`, or `None` (after
    /// reporting it) when the input ends first.
    fn skip_block(&mut self) -> Option<usize> {
        let open = self.advance()?.range;
        let mut level = 1usize;
        while let Some(token) = self.advance() {
            match token.kind {
                TokenKind::LBrace => level += 1,
                TokenKind::RBrace => {
                    level -= 1;
                    if level == 0 {
                        return Some(token.range.end);
                    }
                }
                _ => {}
            }
        }
        self.errors
            .push(ParseError::error(open, "Missing closing '}'"));
        None
    }
}
