//! Shared test utilities for dub-lsp.
//!
//! This module provides common helpers used across multiple test modules.
//! It is only compiled when running tests.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use crate::registry::{
    LatestPackageInfo, PackageIndex, PackageInfo, PackageSummary, PackageVersion, RegistryError,
};

/// Creates a temporary workspace directory for testing.
///
/// Task discovery skips hidden directories, and temp directories can live
/// under paths like `/tmp/.tmpXXXXX`, so the workspace is a non-hidden
/// `workspace` subdirectory of the temp dir.
pub fn create_test_workspace_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let workspace_dir = temp_dir.path().join("workspace");
    fs::create_dir(&workspace_dir).expect("Failed to create workspace subdirectory");
    (temp_dir, workspace_dir)
}

/// Creates a workspace holding two dub packages and a hidden build dir.
///
/// ```text
/// workspace/
/// ├── app/
/// │   └── dub.sdl
/// ├── lib/
/// │   └── dub.json
/// ├── notes/
/// │   └── README.md
/// └── .dub/
///     └── dub.sdl
/// ```
pub fn create_dub_workspace_fixture() -> (TempDir, PathBuf) {
    let (temp_dir, workspace_dir) = create_test_workspace_dir();

    for dir in ["app", "lib", "notes", ".dub"] {
        fs::create_dir(workspace_dir.join(dir)).expect("Failed to create fixture dir");
    }
    fs::write(workspace_dir.join("app/dub.sdl"), "name \"app\"\n")
        .expect("Failed to write app/dub.sdl");
    fs::write(workspace_dir.join("lib/dub.json"), "{\"name\": \"lib\"}")
        .expect("Failed to write lib/dub.json");
    fs::write(workspace_dir.join("notes/README.md"), "# Notes")
        .expect("Failed to write notes/README.md");
    fs::write(workspace_dir.join(".dub/dub.sdl"), "name \"cached\"\n")
        .expect("Failed to write .dub/dub.sdl");

    (temp_dir, workspace_dir)
}

fn not_found(name: &str) -> RegistryError {
    RegistryError::Status {
        url: format!("static://{name}"),
        status: reqwest::StatusCode::NOT_FOUND,
    }
}

/// In-memory registry knowing `vibe-d` in detail and a handful of names.
#[derive(Debug, Clone)]
pub struct StaticIndex {
    pub packages: Arc<Vec<String>>,
}

impl Default for StaticIndex {
    fn default() -> Self {
        StaticIndex {
            packages: Arc::new(
                ["vibe-d", "vibe-core", "mir-algorithm", "dub"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
        }
    }
}

#[tower_lsp::async_trait]
impl PackageIndex for StaticIndex {
    async fn search(&self, query: &str) -> Result<Vec<PackageSummary>, RegistryError> {
        Ok(self
            .packages
            .iter()
            .filter(|name| name.contains(query))
            .map(|name| PackageSummary {
                name: name.clone(),
                description: None,
                version: None,
            })
            .collect())
    }

    async fn list_packages(&self) -> Result<Arc<Vec<String>>, RegistryError> {
        Ok(self.packages.clone())
    }

    async fn package_info(&self, name: &str) -> Result<PackageInfo, RegistryError> {
        if name != "vibe-d" {
            return Err(not_found(name));
        }
        let version = |version: &str, date: &str| PackageVersion {
            version: version.to_string(),
            date: Some(date.to_string()),
        };
        Ok(PackageInfo {
            name: Some(name.to_string()),
            versions: vec![
                version("0.8.0", "sometime"),
                version("0.9.6", "2023-01-15T08:30:00Z"),
                version("0.9.7", "2023-06-01T10:00:00Z"),
            ],
        })
    }

    async fn latest_package_info(&self, name: &str) -> Result<LatestPackageInfo, RegistryError> {
        match name {
            "vibe-d" => Ok(LatestPackageInfo {
                version: Some("0.9.7".to_string()),
                description: Some("Event driven web and concurrency framework".to_string()),
                sub_packages: vec!["core".to_string(), "http".to_string()],
            }),
            // Published without a description.
            "vibe-core" => Ok(LatestPackageInfo {
                version: Some("2.8.0".to_string()),
                ..Default::default()
            }),
            _ => Err(not_found(name)),
        }
    }
}

/// Registry that is always unavailable.
#[derive(Debug, Clone, Copy)]
pub struct FailingIndex;

fn unavailable() -> RegistryError {
    RegistryError::Status {
        url: "static://unavailable".to_string(),
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[tower_lsp::async_trait]
impl PackageIndex for FailingIndex {
    async fn search(&self, _query: &str) -> Result<Vec<PackageSummary>, RegistryError> {
        Err(unavailable())
    }

    async fn list_packages(&self) -> Result<Arc<Vec<String>>, RegistryError> {
        Err(unavailable())
    }

    async fn package_info(&self, _name: &str) -> Result<PackageInfo, RegistryError> {
        Err(unavailable())
    }

    async fn latest_package_info(&self, _name: &str) -> Result<LatestPackageInfo, RegistryError> {
        Err(unavailable())
    }
}
