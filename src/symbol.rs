//! Document outline for `dub.sdl`.
//!
//! One symbol per tag, nested the way blocks nest:
//!
//! | Tag | LSP Kind |
//! |-----|----------|
//! | `name` | `Package` |
//! | `configuration` | `Namespace` |
//! | `buildType` | `Enum` |
//! | `subPackage` | `Module` |
//! | `dependency` | `Object` |
//! | anything else | `Property` |

use ropey::Rope;
use tower_lsp::lsp_types::{DocumentSymbol, DocumentSymbolResponse, SymbolKind};

use crate::{
    range::lsp_range,
    sdl::{Document, Tag},
};

fn symbol_kind(tag: &Tag) -> SymbolKind {
    if tag.namespace.is_some() {
        return SymbolKind::PROPERTY;
    }
    match tag.name.as_str() {
        "name" => SymbolKind::PACKAGE,
        "configuration" => SymbolKind::NAMESPACE,
        "buildType" => SymbolKind::ENUM,
        "subPackage" => SymbolKind::MODULE,
        "dependency" => SymbolKind::OBJECT,
        _ => SymbolKind::PROPERTY,
    }
}

#[allow(deprecated)] // field deprecated has been deprecated in favor of using tags
fn to_symbol(tag: &Tag, rope: &Rope) -> DocumentSymbol {
    let selection_range = lsp_range(rope, tag.name_range.clone());
    let children = tag
        .children
        .iter()
        .map(|child| to_symbol(child, rope))
        .collect::<Vec<_>>();

    DocumentSymbol {
        name: tag.qualified_name(),
        detail: (!tag.values.is_empty()).then(|| {
            tag.values
                .iter()
                .map(|v| v.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        }),
        kind: symbol_kind(tag),
        tags: None,
        deprecated: None,
        range: tag
            .range
            .clone()
            .map(|r| lsp_range(rope, r))
            .unwrap_or(selection_range),
        selection_range,
        children: (!children.is_empty()).then_some(children),
    }
}

/// Outline of `document`, or `None` when it has no tags.
pub fn document_symbol(document: &Document, rope: &Rope) -> Option<DocumentSymbolResponse> {
    let symbols = document
        .root
        .children
        .iter()
        .map(|tag| to_symbol(tag, rope))
        .collect::<Vec<_>>();

    if symbols.is_empty() {
        return None;
    }
    Some(DocumentSymbolResponse::Nested(symbols))
}
