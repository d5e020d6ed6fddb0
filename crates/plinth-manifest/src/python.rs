use std::path::Path;

use ashlar::{Graph, PROJECT_ROOT_ID};
use plinth_common::{requirement_name, ManifestKind, Package};

use crate::parser::read_manifest;
use crate::{ManifestParser, ParsedManifest, Result};

/// `requirements.txt`: one requirement per line, direct dependencies only.
#[derive(Debug)]
pub struct RequirementsParser;

impl ManifestParser for RequirementsParser {
    fn supports(&self, basename: &str) -> bool {
        basename == "requirements.txt"
            || (basename.starts_with("requirements") && basename.ends_with(".txt"))
    }

    fn kind(&self) -> &'static str {
        "requirements.txt"
    }

    fn includes_transitive(&self) -> bool {
        false
    }

    fn parse(&self, path: &Path) -> Result<ParsedManifest> {
        let raw = read_manifest(path)?;
        let mut dependencies: Vec<String> = raw
            .lines()
            .map(str::trim)
            // Skip pip options (-r, -e, --hash, ...) and anything pinned to
            // a URL or local path; those are not registry names.
            .filter(|line| !line.starts_with('-') && !line.contains("://"))
            .filter_map(requirement_name)
            .collect();
        dependencies.sort();
        dependencies.dedup();

        let mut graph = Graph::new();
        graph.add_node(PROJECT_ROOT_ID);
        for dep in &dependencies {
            graph.add_node(dep);
            graph.ensure_edge(PROJECT_ROOT_ID, dep)?;
        }

        let mut root = Package::new(PROJECT_ROOT_ID, ManifestKind::PyPi);
        root.dependencies = dependencies;

        Ok(ParsedManifest {
            graph,
            root,
            includes_transitive: false,
        })
    }
}
