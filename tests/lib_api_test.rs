//! Integration tests for the dub-lsp library public API.
//!
//! These tests verify that the library can be used as an external dependency,
//! ensuring the lib+bin separation works correctly.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tower_lsp::lsp_types::{Url, WorkspaceFolder};

use dub_lsp::config::Settings;
use dub_lsp::diagnostics::validate;
use dub_lsp::registry::{
    LatestPackageInfo, PackageIndex, PackageInfo, PackageSummary, RegistryError,
};
use dub_lsp::schema::{dub_schema, DUB_SCHEMA};
use dub_lsp::sdl::{self, Severity};
use dub_lsp::tasks::{discover_tasks, provide_tasks, resolve_task, DubTaskDefinition, TaskScope};

/// Helper: Create a temporary workspace directory for testing.
///
/// Returns (TempDir, PathBuf) - keep TempDir alive for test duration.
fn create_test_workspace_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let workspace_dir = temp_dir.path().join("workspace");
    fs::create_dir(&workspace_dir).expect("Failed to create workspace subdirectory");
    (temp_dir, workspace_dir)
}

/// Registry stand-in implemented outside the crate.
struct EmptyIndex;

#[tower_lsp::async_trait]
impl PackageIndex for EmptyIndex {
    async fn search(&self, _query: &str) -> Result<Vec<PackageSummary>, RegistryError> {
        Ok(vec![])
    }

    async fn list_packages(&self) -> Result<Arc<Vec<String>>, RegistryError> {
        Ok(Arc::new(vec!["silly".to_string(), "unit-threaded".to_string()]))
    }

    async fn package_info(&self, _name: &str) -> Result<PackageInfo, RegistryError> {
        Ok(PackageInfo::default())
    }

    async fn latest_package_info(&self, _name: &str) -> Result<LatestPackageInfo, RegistryError> {
        Ok(LatestPackageInfo::default())
    }
}

// ============================================================================
// Public API Accessibility Tests
// ============================================================================

#[test]
fn test_parse_and_validate_from_external_crate() {
    let document = sdl::parse("name \"demo\"\ntargetType \"executable\"\n");
    assert!(document.errors.is_empty());
    assert_eq!(document.root.children.len(), 2);
    assert!(validate(&document, &DUB_SCHEMA).is_empty());
}

#[test]
fn test_settings_struct_accessible() {
    let settings = Settings::default();
    assert_eq!(settings.dub_path, "dub");
    assert!(settings.enable_sdl_linting);

    let _custom = Settings {
        dub_path: "/usr/local/bin/dub".to_string(),
        ..Settings::default()
    };
}

#[test]
fn test_schema_is_constructible() {
    let schema = dub_schema();
    assert_eq!(schema.required, vec!["name"]);
    assert_eq!(schema.namespaces, vec!["x"]);
}

#[test]
fn test_diagnostic_severity_is_public() {
    let diags = validate(&sdl::parse("name \"a\"\nunknownTag"), &DUB_SCHEMA);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Warning);
}

#[test]
fn test_resolve_task_from_external_crate() {
    let definition = DubTaskDefinition {
        run: true,
        configuration: Some("server".to_string()),
        ..Default::default()
    };
    assert_eq!(
        resolve_task(&definition, "dub"),
        vec!["dub", "run", "--config=server"]
    );
}

#[test]
fn test_task_discovery_from_external_crate() {
    let (_temp_dir, workspace_dir) = create_test_workspace_dir();
    fs::write(workspace_dir.join("dub.sdl"), "name \"demo\"\n").unwrap();

    let folders = vec![WorkspaceFolder {
        uri: Url::from_directory_path(&workspace_dir).unwrap(),
        name: "workspace".to_string(),
    }];
    let resolved = provide_tasks(discover_tasks(&folders, "dub"), &folders);

    assert_eq!(resolved.len(), 4);
    assert!(resolved
        .iter()
        .all(|task| task.scope == TaskScope::Folder(folders[0].clone())));
    assert_eq!(resolved[0].execution.process, "dub");
}

#[tokio::test]
async fn test_completion_with_external_index() {
    use dub_lsp::completion::{get_completions, Context};
    use dub_lsp::location::location_info;

    let text = "dependency \"uni";
    let info = location_info(text, text.len());
    let settings = Settings::default();
    let context = Context {
        schema: &DUB_SCHEMA,
        index: &EmptyIndex,
        settings: &settings,
    };

    let items = get_completions(context, &info).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "unit-threaded");
}
