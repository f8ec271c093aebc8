//! Hover provider for `dub.sdl`.
//!
//! Hovering a tag or attribute name shows its schema description and the
//! type of value it takes.
//!
//! | Target | Shows |
//! |--------|-------|
//! | Tag name | Description, value type, allowed values |
//! | Attribute name | Description and value type |
//!
//! Hover can be disabled via [`Settings::hover`].

use std::ops::Range;

use ropey::Rope;
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind};

use crate::{
    config::Settings,
    location::QualifiedName,
    range::lsp_range,
    schema::{Schema, ValueSchema},
    sdl::{Attribute, Document, Tag},
};

enum Target<'d> {
    Tag(&'d Tag),
    Attribute(&'d Attribute),
}

/// Find the tag or attribute name under `offset`, filling `path` with the
/// tags leading to it.
fn locate<'d>(tag: &'d Tag, path: &mut Vec<QualifiedName>, offset: usize) -> Option<Target<'d>> {
    for child in &tag.children {
        path.push(QualifiedName::new(
            child.namespace.clone().unwrap_or_default(),
            child.name.clone(),
        ));

        if child.name_range.contains(&offset) {
            return Some(Target::Tag(child));
        }
        if let Some(attribute) = child
            .attributes
            .iter()
            .find(|a| a.name_range.contains(&offset))
        {
            return Some(Target::Attribute(attribute));
        }
        if let Some(found) = locate(child, path, offset) {
            return Some(found);
        }

        path.pop();
    }
    None
}

fn describe_values(values: &ValueSchema) -> String {
    let mut out = format!("Type: `{}`", values.kind);
    if let Some(members) = values.enum_values {
        let members = members
            .iter()
            .map(|m| format!("`{m}`"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("\n\nOne of: {members}"));
    }
    out
}

pub fn hover(
    document: &Document,
    schema: &Schema,
    rope: &Rope,
    offset: usize,
    settings: &Settings,
) -> Option<Hover> {
    if !settings.hover {
        return None;
    }

    let mut path = vec![];
    let target = locate(&document.root, &mut path, offset)?;
    let node = schema.resolve(&path)?;

    let (title, description, values, range): (String, &str, Option<&ValueSchema>, Range<usize>) =
        match target {
            Target::Tag(tag) => (
                tag.qualified_name(),
                node.description,
                node.values.as_ref(),
                tag.name_range.clone(),
            ),
            Target::Attribute(attribute) => {
                let name = attribute.qualified_name();
                let attribute_schema = node.attributes.get(name.as_str())?;
                (
                    name,
                    attribute_schema.description,
                    Some(&attribute_schema.values),
                    attribute.name_range.clone(),
                )
            }
        };

    let mut value = format!("**{title}**\n\n{description}");
    if let Some(values) = values {
        value.push_str("\n\n");
        value.push_str(&describe_values(values));
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(lsp_range(rope, range)),
    })
}
