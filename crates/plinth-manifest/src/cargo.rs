use std::collections::BTreeMap;
use std::path::Path;

use ashlar::{Graph, PROJECT_ROOT_ID};
use plinth_common::{ManifestKind, Package};
use serde::Deserialize;

use crate::parser::read_manifest;
use crate::{ManifestError, ManifestParser, ParsedManifest, Result};

fn cargo_normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

/// `Cargo.toml`: direct dependencies only.
#[derive(Debug)]
pub struct CargoTomlParser;

#[derive(Debug, Default, Deserialize)]
struct CargoToml {
    #[serde(default)]
    package: Option<CargoPackage>,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: BTreeMap<String, toml::Value>,
    #[serde(default, rename = "build-dependencies")]
    build_dependencies: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CargoPackage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// A dependency key may be an alias for another registry package
/// (`foo = { package = "bar" }`); the real name wins.
fn dependency_name(key: &str, value: &toml::Value) -> String {
    value
        .as_table()
        .and_then(|table| table.get("package"))
        .and_then(|package| package.as_str())
        .map(cargo_normalize)
        .unwrap_or_else(|| cargo_normalize(key))
}

impl ManifestParser for CargoTomlParser {
    fn supports(&self, basename: &str) -> bool {
        basename == "Cargo.toml"
    }

    fn kind(&self) -> &'static str {
        "cargo.toml"
    }

    fn includes_transitive(&self) -> bool {
        false
    }

    fn parse(&self, path: &Path) -> Result<ParsedManifest> {
        let raw = read_manifest(path)?;
        let manifest: CargoToml =
            toml::from_str(&raw).map_err(|source| ManifestError::TomlError {
                path: path.to_path_buf(),
                source,
            })?;
        let package = manifest.package.unwrap_or_default();
        let root_id = package
            .name
            .as_deref()
            .map(cargo_normalize)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| PROJECT_ROOT_ID.to_string());

        let mut dependencies: Vec<String> = manifest
            .dependencies
            .iter()
            .chain(manifest.dev_dependencies.iter())
            .chain(manifest.build_dependencies.iter())
            .map(|(key, value)| dependency_name(key, value))
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

        let mut root = Package::new(root_id, ManifestKind::Cargo);
        root.version = package.version;
        root.description = package.description;
        root.dependencies = dependencies;

        Ok(ParsedManifest {
            graph,
            root,
            includes_transitive: false,
        })
    }
}

/// `Cargo.lock`: the full transitive graph.
#[derive(Debug)]
pub struct CargoLockParser;

#[derive(Debug, Default, Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<CargoLockEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct CargoLockEntry {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Lock dependency strings are `name`, `name version`, or
/// `name version (source)`.
fn lock_dependency_name(raw: &str) -> String {
    cargo_normalize(raw.split_whitespace().next().unwrap_or(raw))
}

impl ManifestParser for CargoLockParser {
    fn supports(&self, basename: &str) -> bool {
        basename == "Cargo.lock"
    }

    fn kind(&self) -> &'static str {
        "cargo.lock"
    }

    fn includes_transitive(&self) -> bool {
        true
    }

    fn parse(&self, path: &Path) -> Result<ParsedManifest> {
        let raw = read_manifest(path)?;
        let lock: CargoLock = toml::from_str(&raw).map_err(|source| ManifestError::TomlError {
            path: path.to_path_buf(),
            source,
        })?;

        let mut graph = Graph::new();
        for entry in &lock.package {
            let name = cargo_normalize(&entry.name);
            let node = graph.add_node(&name);
            if node.meta.version().is_none() {
                if let Some(version) = &entry.version {
                    node.meta.set_version(version);
                }
            }
        }
        for entry in &lock.package {
            let from = cargo_normalize(&entry.name);
            for dep in &entry.dependencies {
                let dep = lock_dependency_name(dep);
                if dep == from {
                    continue;
                }
                graph.add_node(&dep);
                graph.ensure_edge(&from, &dep)?;
            }
        }

        // A lock file has no root marker; packages nothing depends on are
        // the workspace roots. A single root stands for the project, while
        // several hang under a synthetic one.
        let roots = graph.sources();
        let (root_id, root_deps) = match roots.len() {
            0 => {
                return Err(ManifestError::InvalidManifest(
                    "Cargo.lock dependency graph has no root package".into(),
                ))
            }
            1 => (roots[0].clone(), graph.children(&roots[0])),
            _ => {
                graph.add_node(PROJECT_ROOT_ID);
                for root in &roots {
                    graph.ensure_edge(PROJECT_ROOT_ID, root)?;
                }
                (PROJECT_ROOT_ID.to_string(), roots)
            }
        };

        let mut root = Package::new(root_id.clone(), ManifestKind::Cargo);
        root.version = graph
            .node(&root_id)
            .and_then(|n| n.meta.version().map(str::to_owned));
        root.dependencies = root_deps;

        Ok(ParsedManifest {
            graph,
            root,
            includes_transitive: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lock_dependency_names_strip_version_and_source() {
        assert_eq!(lock_dependency_name("serde"), "serde");
        assert_eq!(lock_dependency_name("serde 1.0.152"), "serde");
        assert_eq!(
            lock_dependency_name("serde_json 1.0.93 (registry+https://github.com/rust-lang/crates.io-index)"),
            "serde-json"
        );
    }
}
