//! End-to-end tests over a realistic `dub.sdl`: parsing, validation,
//! completion, hover and the document outline working on the same text.

use std::sync::Arc;

use ropey::Rope;
use tower_lsp::lsp_types::{
    CompletionItemKind, DiagnosticSeverity, DocumentSymbolResponse, HoverContents, Position,
};

use dub_lsp::completion::{get_completions, Context};
use dub_lsp::config::Settings;
use dub_lsp::diagnostics::diagnostics;
use dub_lsp::hover::hover;
use dub_lsp::location::{location_info, LocationKind, QualifiedName};
use dub_lsp::range::byte_offset;
use dub_lsp::registry::{
    LatestPackageInfo, PackageIndex, PackageInfo, PackageSummary, PackageVersion, RegistryError,
};
use dub_lsp::schema::DUB_SCHEMA;
use dub_lsp::sdl;
use dub_lsp::symbol::document_symbol;

const RECIPE: &str = r#"name "webapp"
description "A small vibe.d web application"
authors "Jane Doe" "John Roe"
license "MIT"
dependency "vibe-d" version="~>0.9.7"
targetType "executable"

configuration "application" {
    targetType "executable"
    versions "VibeDefaultMain"
}

configuration "unittest" {
    targetType "library"
    dependency "silly" version="~>1.1.1"
}
"#;

struct FixtureIndex;

#[tower_lsp::async_trait]
impl PackageIndex for FixtureIndex {
    async fn search(&self, _query: &str) -> Result<Vec<PackageSummary>, RegistryError> {
        Ok(vec![])
    }

    async fn list_packages(&self) -> Result<Arc<Vec<String>>, RegistryError> {
        Ok(Arc::new(vec!["silly".to_string(), "vibe-d".to_string()]))
    }

    async fn package_info(&self, name: &str) -> Result<PackageInfo, RegistryError> {
        Ok(PackageInfo {
            name: Some(name.to_string()),
            versions: vec![
                PackageVersion {
                    version: "1.0.0".to_string(),
                    date: Some("2021-03-04T05:06:07Z".to_string()),
                },
                PackageVersion {
                    version: "1.1.1".to_string(),
                    date: Some("2022-08-09T10:11:12Z".to_string()),
                },
            ],
        })
    }

    async fn latest_package_info(&self, _name: &str) -> Result<LatestPackageInfo, RegistryError> {
        Ok(LatestPackageInfo::default())
    }
}

/// Text with `|` removed, and the cursor's byte offset.
fn cursor(marked: &str) -> (String, usize) {
    let offset = marked.find('|').expect("cursor marker");
    (marked.replacen('|', "", 1), offset)
}

#[test]
fn test_recipe_is_clean() {
    let diags = diagnostics(
        RECIPE,
        &Rope::from_str(RECIPE),
        &DUB_SCHEMA,
        &Settings::default(),
    )
    .unwrap();
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
}

#[test]
fn test_broken_edit_reports_positions() {
    let text = RECIPE.replace("targetType \"library\"", "targetType \"libary\"");
    let diags = diagnostics(&text, &Rope::from_str(&text), &DUB_SCHEMA, &Settings::default())
        .unwrap();

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "This is not a valid value");
    assert_eq!(diags[0].severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(diags[0].range.start, Position::new(13, 15));
}

#[test]
fn test_location_inside_configuration() {
    let (text, offset) = cursor(&RECIPE.replace(
        "    versions \"VibeDefaultMain\"",
        "    versions \"VibeDefaultMain\"\n    |",
    ));
    let info = location_info(&text, offset);
    assert_eq!(info.kind, LocationKind::Block);
    assert_eq!(info.path, vec![QualifiedName::plain("configuration")]);
}

#[tokio::test]
async fn test_version_completion_in_nested_dependency() {
    let (text, offset) = cursor(&RECIPE.replace("version=\"~>1.1.1\"", "version=\"|"));
    let info = location_info(&text, offset);
    assert_eq!(info.kind, LocationKind::Value);
    assert_eq!(info.attribute.as_deref(), Some("version"));

    let settings = Settings::default();
    let context = Context {
        schema: &DUB_SCHEMA,
        index: &FixtureIndex,
        settings: &settings,
    };
    let items = get_completions(context, &info).await;

    let labels = items.iter().map(|i| i.label.as_str()).collect::<Vec<_>>();
    assert_eq!(labels, vec!["1.1.1", "1.0.0"]);
    assert!(items
        .iter()
        .all(|i| i.kind == Some(CompletionItemKind::CLASS)));
    assert_eq!(items[1].detail.as_deref(), Some("Released on 2021-03-04"));
}

#[tokio::test]
async fn test_tag_completion_at_lsp_position() {
    let text = format!("{RECIPE}\n");
    let rope = Rope::from_str(&text);
    let offset = byte_offset(&rope, Position::new(17, 0)).unwrap();
    let info = location_info(&text, offset);

    let settings = Settings::default();
    let context = Context {
        schema: &DUB_SCHEMA,
        index: &FixtureIndex,
        settings: &settings,
    };
    let items = get_completions(context, &info).await;
    assert!(items.iter().any(|i| i.label == "subPackage"));
    assert!(items.iter().all(|i| i.kind == Some(CompletionItemKind::FIELD)));
}

#[test]
fn test_hover_and_outline_share_the_parse() {
    let document = sdl::parse(RECIPE);
    let rope = Rope::from_str(RECIPE);

    let offset = RECIPE.find("license").unwrap();
    let hover = hover(&document, &DUB_SCHEMA, &rope, offset, &Settings::default()).unwrap();
    match hover.contents {
        HoverContents::Markup(markup) => assert!(markup
            .value
            .contains("License(s) under which the project can be used")),
        other => panic!("unexpected hover contents: {other:?}"),
    }

    let Some(DocumentSymbolResponse::Nested(symbols)) = document_symbol(&document, &rope) else {
        panic!("expected a nested outline");
    };
    assert_eq!(symbols.len(), 8);
    let unittest = &symbols[7];
    assert_eq!(unittest.detail.as_deref(), Some("unittest"));
    assert_eq!(unittest.children.as_ref().map(Vec::len), Some(2));
}
