use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use url::Url;

/// Which kind of manifest/registry a [`Package`] came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    #[default]
    Npm,
    Cargo,
    PyPi,
    /// Ecosystems this crate has no first-class support for. The tag is
    /// carried through verbatim.
    Other(String),
}

impl Display for ManifestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestKind::Npm => write!(f, "npm"),
            ManifestKind::Cargo => write!(f, "cargo"),
            ManifestKind::PyPi => write!(f, "pypi"),
            ManifestKind::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// A registry-neutral package record, as returned by fetchers and manifest
/// parsers. The crawler only consumes `name` and `dependencies`; everything
/// else flows into node metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Names of direct dependencies, normalized per ecosystem.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<Url>,
    /// Registry-specific URLs, keyed by a short tag (`"registry"`, `"docs"`,
    /// ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub registry_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub kind: ManifestKind,
}

impl Package {
    pub fn new(name: impl Into<String>, kind: ManifestKind) -> Self {
        Package {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    /// The URL shown for this package's node, preferring the repository over
    /// the home page over any registry URL.
    pub fn display_url(&self) -> Option<String> {
        self.repository
            .as_ref()
            .map(|u| u.to_string())
            .or_else(|| self.homepage.as_ref().map(|u| u.to_string()))
            .or_else(|| self.registry_urls.values().next().cloned())
    }
}
