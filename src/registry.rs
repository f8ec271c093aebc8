//! Client for the dub package registry (`code.dlang.org`).
//!
//! Completion goes through the [`PackageIndex`] trait so it can be exercised
//! without network access; [`DubRegistry`] is the HTTP implementation.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | [`PackageIndex::search`] | `/api/packages/search?q=<query>` |
//! | [`PackageIndex::list_packages`] | `/packages/index.json` |
//! | [`PackageIndex::package_info`] | `/api/packages/<name>/info` |
//! | [`PackageIndex::latest_package_info`] | `/api/packages/<name>/latest/info` |

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Settings;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PackageSummary {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PackageVersion {
    pub version: String,
    /// ISO 8601 release timestamp.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: Option<String>,
    /// Oldest first, as served by the registry.
    #[serde(default)]
    pub versions: Vec<PackageVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LatestPackageInfo {
    pub version: Option<String>,
    pub description: Option<String>,
    pub sub_packages: Vec<String>,
}

#[derive(Deserialize)]
struct RawLatestInfo {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    info: Option<RawRecipe>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecipe {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sub_packages: Vec<RawSubPackage>,
}

/// Inline sub-packages carry a name; path sub-packages are plain strings
/// and are skipped.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSubPackage {
    Inline { name: String },
    Path(serde::de::IgnoredAny),
}

impl From<RawLatestInfo> for LatestPackageInfo {
    fn from(raw: RawLatestInfo) -> Self {
        let (description, sub_packages) = match raw.info {
            Some(recipe) => (
                recipe.description,
                recipe
                    .sub_packages
                    .into_iter()
                    .filter_map(|sub| match sub {
                        RawSubPackage::Inline { name } => Some(name),
                        RawSubPackage::Path(_) => None,
                    })
                    .collect(),
            ),
            None => (None, vec![]),
        };
        LatestPackageInfo {
            version: raw.version,
            description,
            sub_packages,
        }
    }
}

#[tower_lsp::async_trait]
pub trait PackageIndex: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<PackageSummary>, RegistryError>;

    async fn list_packages(&self) -> Result<Arc<Vec<String>>, RegistryError>;

    async fn package_info(&self, name: &str) -> Result<PackageInfo, RegistryError>;

    async fn latest_package_info(&self, name: &str) -> Result<LatestPackageInfo, RegistryError>;
}

pub struct DubRegistry {
    client: reqwest::Client,
    base_url: String,
    package_list_ttl: Duration,
    package_list: RwLock<Option<(Instant, Arc<Vec<String>>)>>,
}

impl DubRegistry {
    pub fn new(settings: &Settings) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.registry_timeout_secs))
            .user_agent(concat!("dub-lsp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RegistryError::Client)?;

        Ok(DubRegistry {
            client,
            base_url: settings.registry_url.trim_end_matches('/').to_string(),
            package_list_ttl: Duration::from_secs(settings.package_list_ttl_secs),
            package_list: RwLock::new(None),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, RegistryError> {
        tracing::debug!(%url, "registry request");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| RegistryError::Http {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(RegistryError::Status {
                url,
                status: response.status(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| RegistryError::Decode { url, source })
    }
}

#[tower_lsp::async_trait]
impl PackageIndex for DubRegistry {
    async fn search(&self, query: &str) -> Result<Vec<PackageSummary>, RegistryError> {
        let url = format!(
            "{}/api/packages/search?q={}",
            self.base_url,
            urlencoding::encode(query)
        );
        self.get_json(url).await
    }

    async fn list_packages(&self) -> Result<Arc<Vec<String>>, RegistryError> {
        if let Some((fetched, packages)) = self.package_list.read().await.as_ref() {
            if fetched.elapsed() < self.package_list_ttl {
                return Ok(packages.clone());
            }
        }

        let url = format!("{}/packages/index.json", self.base_url);
        let packages: Arc<Vec<String>> = Arc::new(self.get_json(url).await?);
        tracing::info!(count = packages.len(), "fetched dub package list");

        *self.package_list.write().await = Some((Instant::now(), packages.clone()));
        Ok(packages)
    }

    async fn package_info(&self, name: &str) -> Result<PackageInfo, RegistryError> {
        let url = format!(
            "{}/api/packages/{}/info",
            self.base_url,
            urlencoding::encode(name)
        );
        self.get_json(url).await
    }

    async fn latest_package_info(&self, name: &str) -> Result<LatestPackageInfo, RegistryError> {
        let url = format!(
            "{}/api/packages/{}/latest/info",
            self.base_url,
            urlencoding::encode(name)
        );
        let raw: RawLatestInfo = self.get_json(url).await?;
        Ok(raw.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_info_keeps_inline_sub_packages() {
        let raw: RawLatestInfo = serde_json::from_str(
            r#"{
                "version": "0.9.7",
                "date": "2023-06-01T10:00:00Z",
                "info": {
                    "name": "vibe-d",
                    "description": "Event driven web and concurrency framework",
                    "subPackages": [
                        {"name": "core", "sourcePaths": ["core"]},
                        "./http/",
                        {"name": "data"}
                    ]
                }
            }"#,
        )
        .unwrap();

        let info = LatestPackageInfo::from(raw);
        assert_eq!(info.version.as_deref(), Some("0.9.7"));
        assert_eq!(
            info.description.as_deref(),
            Some("Event driven web and concurrency framework")
        );
        assert_eq!(info.sub_packages, vec!["core", "data"]);
    }

    #[test]
    fn test_latest_info_without_recipe() {
        let raw: RawLatestInfo = serde_json::from_str(r#"{"version": "1.0.0"}"#).unwrap();
        let info = LatestPackageInfo::from(raw);
        assert!(info.sub_packages.is_empty());
        assert!(info.description.is_none());
    }

    #[test]
    fn test_package_info_tolerates_extra_fields() {
        let info: PackageInfo = serde_json::from_str(
            r#"{"name": "x", "versions": [{"version": "1.0.0", "date": "2020-01-01T00:00:00Z", "readme": "..."}], "id": "abc"}"#,
        )
        .unwrap();
        assert_eq!(info.versions.len(), 1);
        assert_eq!(info.versions[0].version, "1.0.0");
    }

    #[test]
    fn test_registry_trims_trailing_slash() {
        let settings = Settings {
            registry_url: "https://registry.example/".to_string(),
            ..Settings::default()
        };
        let registry = DubRegistry::new(&settings).unwrap();
        assert_eq!(registry.base_url, "https://registry.example");
    }
}
