use chrono::DateTime;
use itertools::Itertools;
use nucleo_matcher::{
    pattern::{self, Normalization},
    Matcher,
};
use serde_json::{Map, Value};
use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Documentation};

use super::{util::version_sort_text, Context};
use crate::{location::LocationInfo, registry::PackageIndex};

/// Key under the item's `data` naming the package to describe on resolve.
const PACKAGE_KEY: &str = "package";

fn compute_match_score(
    matcher: &mut Matcher,
    pattern: &pattern::Pattern,
    name: &str,
) -> u32 {
    let mut buf = Vec::new();
    pattern
        .score(nucleo_matcher::Utf32Str::new(name, &mut buf), matcher)
        .unwrap_or_default()
}

/// Registry package names ranked against `partial`, best first. An empty
/// query keeps the registry's order.
fn rank_packages<'a>(packages: &'a [String], partial: &str, limit: usize) -> Vec<&'a str> {
    if partial.is_empty() {
        return packages.iter().map(String::as_str).take(limit).collect();
    }

    let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
    let pattern = pattern::Pattern::parse(
        partial,
        pattern::CaseMatching::Smart,
        Normalization::Smart,
    );

    packages
        .iter()
        .map(|name| (compute_match_score(&mut matcher, &pattern, name), name))
        .filter(|(score, _)| *score > 0)
        .sorted_by(|(a, _), (b, _)| Ord::cmp(b, a))
        .map(|(_, name)| name.as_str())
        .take(limit)
        .collect()
}

/// Names for the first value of `dependency`. Once the value contains a
/// `:`, the sub-packages of the named package are offered instead.
pub async fn complete_package_name<I: PackageIndex + ?Sized>(
    context: Context<'_, I>,
    partial: &str,
) -> Vec<CompletionItem> {
    if let Some((package, _)) = partial.split_once(':') {
        return match context.index.latest_package_info(package).await {
            Ok(info) => info
                .sub_packages
                .into_iter()
                .map(|sub| CompletionItem {
                    label: format!("{package}:{sub}"),
                    kind: Some(CompletionItemKind::PROPERTY),
                    documentation: info.description.clone().map(Documentation::String),
                    insert_text: Some(sub),
                    ..Default::default()
                })
                .collect(),
            Err(err) => {
                tracing::warn!(%package, error = %err, "failed to fetch sub-packages");
                vec![]
            }
        };
    }

    let packages = match context.index.list_packages().await {
        Ok(packages) => packages,
        Err(err) => {
            tracing::warn!(error = %err, "failed to fetch package list");
            return vec![];
        }
    };

    rank_packages(&packages, partial, context.settings.max_package_completions)
        .into_iter()
        .map(|name| CompletionItem {
            label: name.to_string(),
            kind: Some(CompletionItemKind::PROPERTY),
            data: Some(package_data(name)),
            ..Default::default()
        })
        .collect()
}

/// `data` payload marking an item as a package to describe on resolve.
fn package_data(name: &str) -> Value {
    let mut data = Map::new();
    data.insert(PACKAGE_KEY.to_string(), Value::String(name.to_string()));
    Value::Object(data)
}

/// Released versions of the dependency named by the tag's single value,
/// newest first.
pub async fn complete_package_version<I: PackageIndex + ?Sized>(
    context: Context<'_, I>,
    info: &LocationInfo,
) -> Vec<CompletionItem> {
    let [package] = info.values.as_slice() else {
        return vec![];
    };

    let versions = match context.index.package_info(&package.text).await {
        Ok(info) => info.versions,
        Err(err) => {
            tracing::warn!(package = %package.text, error = %err, "failed to fetch package versions");
            return vec![];
        }
    };

    versions
        .into_iter()
        .rev()
        .map(|version| CompletionItem {
            sort_text: Some(version_sort_text(&version.version)),
            detail: version
                .date
                .as_deref()
                .map(|date| format!("Released on {}", release_date(date))),
            kind: Some(CompletionItemKind::CLASS),
            insert_text: Some(version.version.clone()),
            label: version.version,
            ..Default::default()
        })
        .collect()
}

fn release_date(date: &str) -> String {
    DateTime::parse_from_rfc3339(date)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| date.to_string())
}

/// Fill in the description and latest version of a package-name item.
/// Items without a package, or whose lookup fails, come back unchanged.
pub async fn resolve_completion<I: PackageIndex + ?Sized>(
    index: &I,
    mut item: CompletionItem,
) -> CompletionItem {
    let Some(package) = item
        .data
        .as_ref()
        .and_then(|data| data.get(PACKAGE_KEY))
        .and_then(|name| name.as_str())
        .map(str::to_string)
    else {
        return item;
    };

    match index.latest_package_info(&package).await {
        Ok(info) => {
            if let Some(description) = info.description {
                item.documentation = Some(Documentation::String(description));
            }
            if let Some(version) = info.version {
                item.detail = Some(version);
            }
        }
        Err(err) => tracing::warn!(%package, error = %err, "failed to resolve package"),
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::{
        config::Settings,
        location::location_info,
        schema::dub_schema,
        test_utils::{FailingIndex, StaticIndex},
    };

    fn context<'a, I: PackageIndex>(
        schema: &'a crate::schema::Schema,
        index: &'a I,
        settings: &'a Settings,
    ) -> Context<'a, I> {
        Context {
            schema,
            index,
            settings,
        }
    }

    #[test]
    fn test_rank_packages_prefers_better_matches() {
        let packages = vec![
            "mir-algorithm".to_string(),
            "vibe-core".to_string(),
            "dub".to_string(),
            "vibe-d".to_string(),
        ];
        let ranked = rank_packages(&packages, "vibe", 10);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|name| name.starts_with("vibe")));

        assert_eq!(rank_packages(&packages, "", 2), vec!["mir-algorithm", "vibe-core"]);
        assert!(rank_packages(&packages, "zzz", 10).is_empty());
    }

    #[tokio::test]
    async fn test_package_names_are_limited() {
        let index = StaticIndex::default();
        let schema = dub_schema();
        let settings = Settings {
            max_package_completions: 1,
            ..Settings::default()
        };
        let items = complete_package_name(context(&schema, &index, &settings), "").await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, Some(CompletionItemKind::PROPERTY));
        assert_eq!(items[0].data, Some(json!({ "package": items[0].label })));
    }

    #[tokio::test]
    async fn test_sub_packages_after_colon() {
        let index = StaticIndex::default();
        let schema = dub_schema();
        let settings = Settings::default();
        let items = complete_package_name(context(&schema, &index, &settings), "vibe-d:").await;
        let labels = items.iter().map(|i| i.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["vibe-d:core", "vibe-d:http"]);
        assert_eq!(items[0].insert_text.as_deref(), Some("core"));
        assert_eq!(
            items[0].documentation,
            Some(Documentation::String(
                "Event driven web and concurrency framework".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_versions_newest_first() {
        let index = StaticIndex::default();
        let schema = dub_schema();
        let settings = Settings::default();
        let text = "dependency \"vibe-d\" version=\"";
        let info = location_info(text, text.len());

        let items = complete_package_version(context(&schema, &index, &settings), &info).await;
        let labels = items.iter().map(|i| i.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["0.9.7", "0.9.6", "0.8.0"]);
        assert_eq!(items[0].detail.as_deref(), Some("Released on 2023-06-01"));
        assert_eq!(items[0].kind, Some(CompletionItemKind::CLASS));
        assert!(items[0].sort_text < items[1].sort_text);
        // Unparseable dates are shown as served.
        assert_eq!(items[2].detail.as_deref(), Some("Released on sometime"));
    }

    #[tokio::test]
    async fn test_versions_need_exactly_one_value() {
        let index = StaticIndex::default();
        let schema = dub_schema();
        let settings = Settings::default();
        let text = "dependency version=\"";
        let info = location_info(text, text.len());
        assert!(complete_package_version(context(&schema, &index, &settings), &info)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_registry_failures_yield_nothing() {
        let index = FailingIndex;
        let schema = dub_schema();
        let settings = Settings::default();
        assert!(complete_package_name(context(&schema, &index, &settings), "vi")
            .await
            .is_empty());
        assert!(complete_package_name(context(&schema, &index, &settings), "vibe-d:")
            .await
            .is_empty());

        let text = "dependency \"vibe-d\" version=\"";
        let info = location_info(text, text.len());
        assert!(complete_package_version(context(&schema, &index, &settings), &info)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_resolve_fills_documentation() {
        let item = CompletionItem {
            label: "vibe-d".to_string(),
            data: Some(json!({ "package": "vibe-d" })),
            ..Default::default()
        };
        let resolved = resolve_completion(&StaticIndex::default(), item).await;
        assert_eq!(resolved.detail.as_deref(), Some("0.9.7"));
        assert_eq!(
            resolved.documentation,
            Some(Documentation::String(
                "Event driven web and concurrency framework".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_resolve_keeps_fields_the_registry_lacks() {
        let item = CompletionItem {
            label: "vibe-core".to_string(),
            documentation: Some(Documentation::String("cached".to_string())),
            data: Some(package_data("vibe-core")),
            ..Default::default()
        };
        let resolved = resolve_completion(&StaticIndex::default(), item).await;
        assert_eq!(resolved.detail.as_deref(), Some("2.8.0"));
        assert_eq!(
            resolved.documentation,
            Some(Documentation::String("cached".to_string()))
        );
    }

    #[tokio::test]
    async fn test_resolve_leaves_other_items_alone() {
        let item = CompletionItem {
            label: "targetType".to_string(),
            ..Default::default()
        };
        let resolved = resolve_completion(&StaticIndex::default(), item.clone()).await;
        assert_eq!(resolved, item);

        let item = CompletionItem {
            label: "vibe-d".to_string(),
            data: Some(json!({ "package": "vibe-d" })),
            ..Default::default()
        };
        let resolved = resolve_completion(&FailingIndex, item.clone()).await;
        assert_eq!(resolved, item);
    }
}
