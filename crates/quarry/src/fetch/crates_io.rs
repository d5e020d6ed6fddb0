use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use plinth_client::PlinthClient;
use plinth_common::{CancelToken, ManifestKind, Package};
use serde::Deserialize;
use url::Url;

use crate::error::Result;
use crate::fetch::PackageFetcher;
use crate::QuarryError;

#[derive(Debug)]
pub struct CratesIoFetcher {
    client: PlinthClient,
    api_base: Url,
    crates: DashMap<String, Arc<Package>>,
}

impl CratesIoFetcher {
    pub fn new(client: PlinthClient, api_base: Url) -> Self {
        Self {
            client,
            api_base,
            crates: DashMap::new(),
        }
    }

    pub fn with_client(client: PlinthClient) -> Self {
        Self::new(
            client,
            "https://crates.io/api/v1/"
                .parse()
                .expect("static API URL"),
        )
    }

    fn crate_url(&self, name: &str) -> Result<Url> {
        Ok(self
            .api_base
            .join(&format!("crates/{name}"))
            .map_err(plinth_client::PlinthClientError::from)?)
    }

    fn dependencies_url(&self, name: &str, version: &str) -> Result<Url> {
        Ok(self
            .api_base
            .join(&format!("crates/{name}/{version}/dependencies"))
            .map_err(plinth_client::PlinthClientError::from)?)
    }
}

#[async_trait]
impl PackageFetcher for CratesIoFetcher {
    fn kind(&self) -> ManifestKind {
        ManifestKind::Cargo
    }

    /// crates.io treats `-` and `_` as the same name; nodes use the dashed,
    /// lowercased form.
    fn normalize(&self, name: &str) -> String {
        name.trim().to_ascii_lowercase().replace('_', "-")
    }

    async fn fetch(&self, name: &str, refresh: bool, cancel: &CancelToken) -> Result<Package> {
        let name = self.normalize(name);
        if !refresh {
            if let Some(hit) = self.crates.get(&name) {
                return Ok((**hit.value()).clone());
            }
        }
        let url = self.crate_url(&name)?;
        let response: CrateResponse = self.client.get_json(&url, refresh, cancel).await?;
        let version = response
            .krate
            .max_stable_version
            .clone()
            .or_else(|| response.krate.newest_version.clone())
            .or_else(|| response.krate.max_version.clone())
            .ok_or_else(|| QuarryError::IncompleteRegistryData {
                name: name.clone(),
                what: "a published version",
            })?;

        let deps_url = self.dependencies_url(&name, &version)?;
        let deps: DependenciesResponse = self.client.get_json(&deps_url, refresh, cancel).await?;
        let mut dependencies: Vec<String> = deps
            .dependencies
            .iter()
            .filter(|dep| dep.kind == "normal" && !dep.optional)
            .map(|dep| self.normalize(&dep.crate_id))
            .collect();
        dependencies.sort();
        dependencies.dedup();

        let license = response
            .versions
            .iter()
            .find(|v| v.num == version)
            .and_then(|v| v.license.clone());

        let mut registry_urls = BTreeMap::new();
        registry_urls.insert(
            "registry".to_string(),
            format!("https://crates.io/crates/{name}"),
        );
        registry_urls.insert("docs".to_string(), format!("https://docs.rs/{name}"));

        let package = Package {
            name: name.clone(),
            version: Some(version),
            dependencies,
            description: response.krate.description,
            license,
            author: None,
            downloads: response.krate.downloads,
            repository: response.krate.repository.and_then(|raw| raw.parse().ok()),
            homepage: response.krate.homepage.and_then(|raw| raw.parse().ok()),
            registry_urls,
            kind: ManifestKind::Cargo,
        };
        self.crates.insert(name, Arc::new(package.clone()));
        Ok(package)
    }
}

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateData,
    #[serde(default)]
    versions: Vec<VersionData>,
}

#[derive(Debug, Default, Deserialize)]
struct CrateData {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    downloads: Option<u64>,
    #[serde(default)]
    max_stable_version: Option<String>,
    #[serde(default)]
    newest_version: Option<String>,
    #[serde(default)]
    max_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionData {
    #[serde(default)]
    num: String,
    #[serde(default)]
    license: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DependenciesResponse {
    #[serde(default)]
    dependencies: Vec<DependencyData>,
}

#[derive(Debug, Deserialize)]
struct DependencyData {
    crate_id: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    optional: bool,
}
