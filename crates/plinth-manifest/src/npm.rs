use std::collections::BTreeMap;
use std::path::Path;

use ashlar::{Graph, PROJECT_ROOT_ID};
use plinth_common::{ManifestKind, Package};
use serde::Deserialize;

use crate::parser::read_manifest;
use crate::{ManifestError, ManifestParser, ParsedManifest, Result};

fn npm_normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// `package.json`: direct dependencies only.
#[derive(Debug)]
pub struct PackageJsonParser;

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
}

impl ManifestParser for PackageJsonParser {
    fn supports(&self, basename: &str) -> bool {
        basename == "package.json"
    }

    fn kind(&self) -> &'static str {
        "package.json"
    }

    fn includes_transitive(&self) -> bool {
        false
    }

    fn parse(&self, path: &Path) -> Result<ParsedManifest> {
        let raw = read_manifest(path)?;
        let manifest: PackageJson =
            serde_json::from_str(&raw).map_err(|source| ManifestError::JsonError {
                path: path.to_path_buf(),
                source,
            })?;

        let root_id = manifest
            .name
            .as_deref()
            .map(npm_normalize)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| PROJECT_ROOT_ID.to_string());

        let mut dependencies: Vec<String> = manifest
            .dependencies
            .keys()
            .chain(manifest.dev_dependencies.keys())
            .map(|name| npm_normalize(name))
            .filter(|name| *name != root_id)
            .collect();
        dependencies.sort();
        dependencies.dedup();

        let mut graph = Graph::new();
        graph.add_node(&root_id);
        for dep in &dependencies {
            graph.add_node(dep);
            graph.ensure_edge(&root_id, dep)?;
        }

        let mut root = Package::new(root_id, ManifestKind::Npm);
        root.version = manifest.version;
        root.description = manifest.description;
        root.dependencies = dependencies;

        Ok(ParsedManifest {
            graph,
            root,
            includes_transitive: false,
        })
    }
}

/// `package-lock.json` v2/v3: the full transitive graph.
#[derive(Debug)]
pub struct PackageLockParser;

#[derive(Debug, Default, Deserialize)]
struct PackageLock {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "lockfileVersion")]
    lockfile_version: u32,
    #[serde(default)]
    packages: BTreeMap<String, LockEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct LockEntry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

/// `"node_modules/a/node_modules/@s/b"` -> `"@s/b"`.
fn lock_entry_name(key: &str) -> Option<String> {
    let tail = key.rsplit("node_modules/").next()?;
    if tail.is_empty() || tail == key {
        None
    } else {
        Some(npm_normalize(tail))
    }
}

impl ManifestParser for PackageLockParser {
    fn supports(&self, basename: &str) -> bool {
        basename == "package-lock.json" || basename == "npm-shrinkwrap.json"
    }

    fn kind(&self) -> &'static str {
        "package-lock.json"
    }

    fn includes_transitive(&self) -> bool {
        true
    }

    fn parse(&self, path: &Path) -> Result<ParsedManifest> {
        let raw = read_manifest(path)?;
        let lock: PackageLock =
            serde_json::from_str(&raw).map_err(|source| ManifestError::JsonError {
                path: path.to_path_buf(),
                source,
            })?;
        if lock.lockfile_version < 2 {
            return Err(ManifestError::InvalidManifest(format!(
                "package-lock v{} has no `packages` map; regenerate with npm >= 7",
                lock.lockfile_version
            )));
        }

        let root_id = lock
            .name
            .as_deref()
            .map(npm_normalize)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| PROJECT_ROOT_ID.to_string());

        let mut graph = Graph::new();
        graph.add_node(&root_id);
        let mut root_deps: Vec<String> = Vec::new();

        for (key, entry) in &lock.packages {
            let from = if key.is_empty() {
                root_id.clone()
            } else {
                match lock_entry_name(key) {
                    Some(name) => name,
                    None => continue,
                }
            };
            {
                let node = graph.add_node(&from);
                if node.meta.version().is_none() {
                    if let Some(version) = &entry.version {
                        node.meta.set_version(version);
                    }
                }
            }
            for dep in entry.dependencies.keys() {
                let dep = npm_normalize(dep);
                if dep == from {
                    continue;
                }
                graph.add_node(&dep);
                graph.ensure_edge(&from, &dep)?;
                if from == root_id {
                    root_deps.push(dep);
                }
            }
        }
        root_deps.sort();
        root_deps.dedup();

        let mut root = Package::new(root_id, ManifestKind::Npm);
        root.version = lock.packages.get("").and_then(|e| e.version.clone());
        root.dependencies = root_deps;

        Ok(ParsedManifest {
            graph,
            root,
            includes_transitive: true,
        })
    }
}
