//! Schema-driven completion for `dub.sdl`.
//!
//! The cursor's [`LocationInfo`] selects the schema node, then:
//!
//! | Location | Candidates |
//! |----------|------------|
//! | Block | child tag names of the enclosing block |
//! | Attribute | attribute names of the current tag (`version="$1"`) |
//! | Value | the value's completion source, enum members, or `true`/`false` |
//!
//! Package names and versions come from the [`PackageIndex`]; registry
//! failures are logged and yield no candidates.

mod package_completer;
mod util;

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, CompletionResponse, Documentation,
    InsertTextFormat,
};

use crate::{
    config::Settings,
    location::{LocationInfo, LocationKind},
    registry::PackageIndex,
    schema::{complete_license, CompletionSource, Schema, TagSchema, ValueSchema},
    sdl::{qualify, ValueType},
};

pub use package_completer::resolve_completion;

pub struct Context<'a, I: PackageIndex + ?Sized> {
    pub schema: &'a Schema,
    pub index: &'a I,
    pub settings: &'a Settings,
}

impl<I: PackageIndex + ?Sized> Clone for Context<'_, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I: PackageIndex + ?Sized> Copy for Context<'_, I> {}

pub async fn get_completions<I: PackageIndex + ?Sized>(
    context: Context<'_, I>,
    info: &LocationInfo,
) -> Vec<CompletionItem> {
    let Some(node) = context.schema.resolve(&info.path) else {
        tracing::debug!(path = ?info.path, "no schema node for completion path");
        return vec![];
    };

    match info.kind {
        LocationKind::Comment => vec![],
        LocationKind::Block => block_completions(context.schema, node),
        LocationKind::Attribute => attribute_completions(node),
        LocationKind::Value => {
            let values = match &info.attribute {
                Some(attribute) => node.attributes.get(attribute.as_str()).map(|a| &a.values),
                None => node.values.as_ref(),
            };
            match values {
                Some(values) => value_completions(context, info, values).await,
                None => vec![],
            }
        }
    }
}

/// Wrap items the way the server returns them: the package list is
/// truncated, so clients must ask again as the user types.
pub fn completion_response(items: Vec<CompletionItem>) -> CompletionResponse {
    CompletionResponse::List(CompletionList {
        is_incomplete: true,
        items,
    })
}

fn block_completions(schema: &Schema, node: &TagSchema) -> Vec<CompletionItem> {
    let Some(children) = schema.children(node) else {
        return vec![];
    };

    children
        .iter()
        .map(|(name, child)| CompletionItem {
            label: name.to_string(),
            kind: Some(CompletionItemKind::FIELD),
            documentation: Some(Documentation::String(child.description.to_string())),
            insert_text: Some(qualify(child.namespace, name)),
            ..Default::default()
        })
        .collect()
}

fn attribute_completions(node: &TagSchema) -> Vec<CompletionItem> {
    node.attributes
        .iter()
        .map(|(name, attribute)| {
            let (insert_text, format) = match attribute.values.kind {
                ValueType::String => (
                    format!("{}=\"$1\"", util::escape_snippet(name)),
                    InsertTextFormat::SNIPPET,
                ),
                _ => (format!("{name}="), InsertTextFormat::PLAIN_TEXT),
            };
            CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::VARIABLE),
                detail: Some(attribute.values.kind.to_string()),
                documentation: Some(Documentation::String(attribute.description.to_string())),
                insert_text: Some(insert_text),
                insert_text_format: Some(format),
                ..Default::default()
            }
        })
        .collect()
}

async fn value_completions<I: PackageIndex + ?Sized>(
    context: Context<'_, I>,
    info: &LocationInfo,
    values: &ValueSchema,
) -> Vec<CompletionItem> {
    if let Some(source) = values.complete {
        return match source {
            CompletionSource::License => complete_license(&info.value)
                .into_iter()
                .map(|value| value_item(value, values.kind))
                .collect(),
            CompletionSource::PackageName => {
                package_completer::complete_package_name(context, &info.value).await
            }
            CompletionSource::PackageVersion => {
                package_completer::complete_package_version(context, info).await
            }
        };
    }

    if let Some(members) = values.enum_values {
        return members
            .iter()
            .map(|member| value_item(member.to_string(), values.kind))
            .collect();
    }

    if values.kind == ValueType::Boolean {
        return ["true", "false"]
            .into_iter()
            .map(|keyword| CompletionItem {
                label: keyword.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                detail: Some(values.kind.to_string()),
                ..Default::default()
            })
            .collect();
    }

    vec![]
}

fn value_item(value: String, kind: ValueType) -> CompletionItem {
    CompletionItem {
        label: value.clone(),
        kind: Some(CompletionItemKind::VALUE),
        detail: Some(kind.to_string()),
        insert_text: Some(value),
        ..Default::default()
    }
}
