use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use plinth_client::PlinthClient;
use plinth_common::{CancelToken, ManifestKind, Package};
use serde::Deserialize;
use url::Url;

use crate::error::Result;
use crate::fetch::PackageFetcher;

/// Characters escaped in a registry path segment. The slash matters: scoped
/// names (`@scope/name`) are a single segment on the packument endpoint.
const SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'/').add(b'?').add(b'#').add(b'%');

#[derive(Debug)]
pub struct NpmFetcher {
    client: PlinthClient,
    registry: Url,
    packuments: DashMap<String, Arc<Package>>,
}

impl NpmFetcher {
    pub fn new(client: PlinthClient, registry: Url) -> Self {
        Self {
            client,
            registry,
            packuments: DashMap::new(),
        }
    }

    pub fn with_client(client: PlinthClient) -> Self {
        Self::new(
            client,
            "https://registry.npmjs.org/"
                .parse()
                .expect("static registry URL"),
        )
    }

    fn packument_url(&self, name: &str) -> Result<Url> {
        let encoded = utf8_percent_encode(name, SEGMENT).to_string();
        Ok(self
            .registry
            .join(&encoded)
            .map_err(plinth_client::PlinthClientError::from)?)
    }
}

#[async_trait]
impl PackageFetcher for NpmFetcher {
    fn kind(&self) -> ManifestKind {
        ManifestKind::Npm
    }

    fn normalize(&self, name: &str) -> String {
        name.trim().to_ascii_lowercase()
    }

    async fn fetch(&self, name: &str, refresh: bool, cancel: &CancelToken) -> Result<Package> {
        let name = self.normalize(name);
        if !refresh {
            if let Some(hit) = self.packuments.get(&name) {
                return Ok((**hit.value()).clone());
            }
        }
        let url = self.packument_url(&name)?;
        let packument: Packument = self.client.get_json(&url, refresh, cancel).await?;
        let package = packument.into_package(&name, self);
        self.packuments
            .insert(name.clone(), Arc::new(package.clone()));
        Ok(package)
    }
}

#[derive(Debug, Default, Deserialize)]
struct Packument {
    #[serde(default, rename = "dist-tags")]
    tags: HashMap<String, String>,
    #[serde(default)]
    versions: HashMap<String, VersionMetadata>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    repository: Option<RepositoryField>,
    #[serde(default)]
    license: Option<LicenseField>,
    #[serde(default)]
    author: Option<PersonField>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionMetadata {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    repository: Option<RepositoryField>,
    #[serde(default)]
    license: Option<LicenseField>,
    #[serde(default)]
    author: Option<PersonField>,
}

/// `repository` can be a bare URL string or `{ "type": ..., "url": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepositoryField {
    Str(String),
    Obj {
        #[serde(default)]
        url: Option<String>,
    },
}

impl RepositoryField {
    fn url(&self) -> Option<Url> {
        let raw = match self {
            RepositoryField::Str(s) => s.as_str(),
            RepositoryField::Obj { url } => url.as_deref()?,
        };
        let raw = raw.strip_prefix("git+").unwrap_or(raw);
        let raw = raw.strip_suffix(".git").unwrap_or(raw);
        raw.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LicenseField {
    Str(String),
    Obj {
        #[serde(default, rename = "type")]
        kind: Option<String>,
    },
}

impl LicenseField {
    fn name(&self) -> Option<String> {
        match self {
            LicenseField::Str(s) => Some(s.clone()),
            LicenseField::Obj { kind } => kind.clone(),
        }
    }
}

/// Represents a human.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersonField {
    Str(String),
    Obj {
        #[serde(default)]
        name: Option<String>,
    },
}

impl PersonField {
    fn name(&self) -> Option<String> {
        match self {
            PersonField::Str(s) => Some(s.clone()),
            PersonField::Obj { name } => name.clone(),
        }
    }
}

impl Packument {
    fn into_package(self, name: &str, fetcher: &NpmFetcher) -> Package {
        let latest = self
            .tags
            .get("latest")
            .cloned()
            .or_else(|| self.versions.keys().max().cloned());
        let version_meta = latest.as_ref().and_then(|v| self.versions.get(v));

        let mut dependencies: Vec<String> = version_meta
            .map(|meta| {
                meta.dependencies
                    .keys()
                    .map(|dep| fetcher.normalize(dep))
                    .collect()
            })
            .unwrap_or_default();
        dependencies.sort();
        dependencies.dedup();

        let description = version_meta
            .and_then(|m| m.description.clone())
            .or(self.description);
        let homepage = version_meta
            .and_then(|m| m.homepage.clone())
            .or(self.homepage)
            .and_then(|raw| raw.parse().ok());
        let repository = version_meta
            .and_then(|m| m.repository.as_ref().and_then(RepositoryField::url))
            .or_else(|| self.repository.as_ref().and_then(RepositoryField::url));
        let license = version_meta
            .and_then(|m| m.license.as_ref().and_then(LicenseField::name))
            .or_else(|| self.license.as_ref().and_then(LicenseField::name));
        let author = version_meta
            .and_then(|m| m.author.as_ref().and_then(PersonField::name))
            .or_else(|| self.author.as_ref().and_then(PersonField::name));

        let mut registry_urls = BTreeMap::new();
        registry_urls.insert(
            "registry".to_string(),
            format!("https://www.npmjs.com/package/{name}"),
        );

        Package {
            name: name.to_string(),
            version: latest,
            dependencies,
            description,
            license,
            author,
            downloads: None,
            repository,
            homepage,
            registry_urls,
            kind: ManifestKind::Npm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_lowercases() {
        let fetcher = NpmFetcher::with_client(PlinthClient::default());
        assert_eq!(fetcher.normalize(" Left-Pad "), "left-pad");
        assert_eq!(fetcher.normalize("@Scope/Name"), "@scope/name");
    }

    #[test]
    fn scoped_names_stay_one_path_segment() {
        let fetcher = NpmFetcher::with_client(PlinthClient::default());
        let url = fetcher.packument_url("@scope/name").unwrap();
        assert_eq!(
            url.as_str(),
            "https://registry.npmjs.org/@scope%2Fname"
        );
    }

    #[test]
    fn repository_field_cleans_git_urls() {
        let field = RepositoryField::Str("git+https://github.com/foo/bar.git".into());
        assert_eq!(
            field.url().unwrap().as_str(),
            "https://github.com/foo/bar"
        );
    }
}
