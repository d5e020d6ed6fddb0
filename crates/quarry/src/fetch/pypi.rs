use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use plinth_client::PlinthClient;
use plinth_common::{pep503_normalize, requirement_name, CancelToken, ManifestKind, Package};
use serde::Deserialize;
use url::Url;

use crate::error::Result;
use crate::fetch::PackageFetcher;

#[derive(Debug)]
pub struct PyPiFetcher {
    client: PlinthClient,
    api_base: Url,
    projects: DashMap<String, Arc<Package>>,
}

impl PyPiFetcher {
    pub fn new(client: PlinthClient, api_base: Url) -> Self {
        Self {
            client,
            api_base,
            projects: DashMap::new(),
        }
    }

    pub fn with_client(client: PlinthClient) -> Self {
        Self::new(
            client,
            "https://pypi.org/".parse().expect("static API URL"),
        )
    }

    fn project_url(&self, name: &str) -> Result<Url> {
        Ok(self
            .api_base
            .join(&format!("pypi/{name}/json"))
            .map_err(plinth_client::PlinthClientError::from)?)
    }
}

#[async_trait]
impl PackageFetcher for PyPiFetcher {
    fn kind(&self) -> ManifestKind {
        ManifestKind::PyPi
    }

    fn normalize(&self, name: &str) -> String {
        pep503_normalize(name)
    }

    async fn fetch(&self, name: &str, refresh: bool, cancel: &CancelToken) -> Result<Package> {
        let name = self.normalize(name);
        if !refresh {
            if let Some(hit) = self.projects.get(&name) {
                return Ok((**hit.value()).clone());
            }
        }
        let url = self.project_url(&name)?;
        let response: ProjectResponse = self.client.get_json(&url, refresh, cancel).await?;
        let info = response.info;

        let mut dependencies: Vec<String> = info
            .requires_dist
            .unwrap_or_default()
            .iter()
            .filter_map(|req| requirement_name(req))
            .collect();
        dependencies.sort();
        dependencies.dedup();

        let mut registry_urls = BTreeMap::new();
        registry_urls.insert(
            "registry".to_string(),
            format!("https://pypi.org/project/{name}/"),
        );

        let repository = info
            .project_urls
            .as_ref()
            .and_then(|urls| {
                urls.iter()
                    .find(|(key, _)| {
                        let key = key.to_ascii_lowercase();
                        key.contains("source") || key.contains("repository") || key.contains("code")
                    })
                    .map(|(_, value)| value.clone())
            })
            .and_then(|raw| raw.parse().ok());

        let package = Package {
            name: name.clone(),
            version: info.version,
            dependencies,
            description: info.summary,
            license: info.license,
            author: info.author.filter(|a| !a.is_empty()),
            downloads: None,
            repository,
            homepage: info.home_page.and_then(|raw| raw.parse().ok()),
            registry_urls,
            kind: ManifestKind::PyPi,
        };
        self.projects.insert(name, Arc::new(package.clone()));
        Ok(package)
    }
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectInfo {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    home_page: Option<String>,
    #[serde(default)]
    project_urls: Option<BTreeMap<String, String>>,
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalization_is_pep503() {
        let fetcher = PyPiFetcher::with_client(PlinthClient::default());
        assert_eq!(fetcher.normalize("Django_REST..framework"), "django-rest-framework");
    }
}
