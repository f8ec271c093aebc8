//! Cursor location analysis for completion.
//!
//! Works on the text *before* the cursor only, so it copes with the
//! half-typed statements completion is requested on (open strings, a
//! dangling `=`, unclosed blocks).

use crate::sdl::{
    lexer::{is_literal_keyword, tokenize, Token, TokenKind},
    Value, ANONYMOUS_TAG,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QualifiedName {
    /// Empty when the tag has no namespace prefix.
    pub namespace: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        QualifiedName {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        QualifiedName::new("", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// Where a tag name goes.
    Block,
    /// Inside a value, or directly after `attribute=`.
    Value,
    /// On an attribute name after the tag name.
    Attribute,
    /// Inside a comment; nothing to complete.
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationInfo {
    pub kind: LocationKind,
    /// Enclosing tags from the root (root excluded). For `Value` and
    /// `Attribute` the tag being edited is the last entry.
    pub path: Vec<QualifiedName>,
    /// Set when completing the value of this attribute.
    pub attribute: Option<String>,
    /// Text of the value or name under the cursor, up to the cursor.
    pub value: String,
    /// Positional values of the current tag before the cursor.
    pub values: Vec<Value>,
}

impl LocationInfo {
    fn new(kind: LocationKind, path: Vec<QualifiedName>) -> Self {
        LocationInfo {
            kind,
            path,
            attribute: None,
            value: String::new(),
            values: vec![],
        }
    }
}

/// Describe what the cursor at byte `offset` of `text` is positioned on.
pub fn location_info(text: &str, offset: usize) -> LocationInfo {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let src = &text[..offset];
    let lexed = tokenize(src);

    let mut blocks: Vec<QualifiedName> = vec![];
    let mut statement: Vec<Token> = vec![];
    for token in lexed.tokens {
        match token.kind {
            TokenKind::Newline | TokenKind::Semicolon => statement.clear(),
            TokenKind::LBrace => {
                blocks.push(
                    statement_head(src, &statement)
                        .unwrap_or_else(|| QualifiedName::plain(ANONYMOUS_TAG)),
                );
                statement.clear();
            }
            TokenKind::RBrace => {
                blocks.pop();
                statement.clear();
            }
            _ => statement.push(token),
        }
    }

    if lexed.ends_in_comment {
        return LocationInfo::new(LocationKind::Comment, blocks);
    }

    let touching = |token: &Token| token.range.end == offset;
    let last = statement.last();

    // Typing (or about to type) a tag name.
    let head_len = head_token_count(src, &statement);
    if statement.is_empty()
        || (head_len == statement.len()
            && last.is_some_and(|t| touching(t) || t.kind == TokenKind::Colon))
    {
        let mut info = LocationInfo::new(LocationKind::Block, blocks);
        if let Some(first) = statement.first() {
            info.value = src[first.range.start..offset].to_string();
        }
        return info;
    }

    let Some(last) = last else {
        return LocationInfo::new(LocationKind::Block, blocks);
    };

    let mut path = blocks;
    path.push(
        statement_head(src, &statement).unwrap_or_else(|| QualifiedName::plain(ANONYMOUS_TAG)),
    );
    let values = statement_values(src, &statement, head_len);

    let is_open_string = matches!(last.kind, TokenKind::String { terminated: false, .. });

    // `attr=` followed by nothing or by a partial value.
    let before_last = statement.len().checked_sub(2).map(|i| &statement[i]);
    let attribute_for = |equals_index: usize| -> Option<String> {
        let name = statement.get(equals_index.checked_sub(1)?)?;
        if name.kind != TokenKind::Identifier {
            return None;
        }
        let namespaced = equals_index >= 3
            && statement[equals_index - 2].kind == TokenKind::Colon
            && statement[equals_index - 3].kind == TokenKind::Identifier;
        Some(if namespaced {
            format!(
                "{}:{}",
                statement[equals_index - 3].text(src),
                name.text(src)
            )
        } else {
            name.text(src).to_string()
        })
    };

    if last.kind == TokenKind::Equals {
        let mut info = LocationInfo::new(LocationKind::Value, path);
        info.attribute = attribute_for(statement.len() - 1);
        info.values = values;
        return info;
    }

    if before_last.is_some_and(|t| t.kind == TokenKind::Equals)
        && (is_open_string || touching(last))
    {
        let mut info = LocationInfo::new(LocationKind::Value, path);
        info.attribute = attribute_for(statement.len() - 2);
        info.value = partial_value(src, last);
        info.values = values;
        return info;
    }

    if is_open_string {
        let mut info = LocationInfo::new(LocationKind::Value, path);
        info.value = partial_value(src, last);
        // The open string is the value being typed, not a finished one.
        info.values = values
            .into_iter()
            .filter(|v| v.range != last.range)
            .collect();
        return info;
    }

    let mut info = LocationInfo::new(LocationKind::Attribute, path);
    if last.kind == TokenKind::Identifier && touching(last) {
        info.value = last.text(src).to_string();
    }
    info.values = values;
    info
}

/// Number of tokens making up the statement's tag name (0 for anonymous tags).
fn head_token_count(src: &str, statement: &[Token]) -> usize {
    let is_name = |t: &Token| t.kind == TokenKind::Identifier && !is_literal_keyword(t.text(src));
    match statement {
        [first, colon, second, ..]
            if is_name(first) && colon.kind == TokenKind::Colon && is_name(second) =>
        {
            3
        }
        [first, colon, ..] if is_name(first) && colon.kind == TokenKind::Colon => 2,
        [first, ..] if is_name(first) => 1,
        _ => 0,
    }
}

fn statement_head(src: &str, statement: &[Token]) -> Option<QualifiedName> {
    match head_token_count(src, statement) {
        3 => Some(QualifiedName::new(
            statement[0].text(src),
            statement[2].text(src),
        )),
        1 => Some(QualifiedName::plain(statement[0].text(src))),
        _ => None,
    }
}

/// Positional values of the statement; attribute values are skipped.
fn statement_values(src: &str, statement: &[Token], head_len: usize) -> Vec<Value> {
    statement
        .iter()
        .enumerate()
        .skip(head_len)
        .filter(|(i, _)| *i == 0 || statement[i - 1].kind != TokenKind::Equals)
        .filter_map(|(_, token)| token.value(src))
        .collect()
}

fn partial_value(src: &str, token: &Token) -> String {
    match token.kind {
        TokenKind::String { .. } => token
            .value(src)
            .map(|v| v.text)
            .unwrap_or_default(),
        _ => token.text(src).to_string(),
    }
}
