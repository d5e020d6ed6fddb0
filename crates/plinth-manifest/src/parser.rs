use std::path::Path;
use std::sync::Arc;

use ashlar::Graph;
use async_trait::async_trait;
use plinth_common::Package;

use crate::{
    CargoLockParser, CargoTomlParser, ManifestError, PackageJsonParser, PackageLockParser,
    RequirementsParser, Result,
};

/// What a manifest parser produced: the dependency graph, the root package
/// record, and whether the graph already covers transitive dependencies.
#[derive(Clone, Debug)]
pub struct ParsedManifest {
    pub graph: Graph,
    pub root: Package,
    pub includes_transitive: bool,
}

/// A thin per-format decoder. Parsers MUST NOT perform network I/O; when a
/// requirement file needs expansion to the transitive graph, that is
/// delegated to a [`Resolver`].
pub trait ManifestParser: std::fmt::Debug + Send + Sync {
    /// Whether this parser handles files with this basename.
    fn supports(&self, basename: &str) -> bool;

    /// Stable format tag (cache keys, logs).
    fn kind(&self) -> &'static str;

    /// True for lock files, false for requirement files.
    fn includes_transitive(&self) -> bool;

    fn parse(&self, path: &Path) -> Result<ParsedManifest>;
}

/// Expands a direct-dependency graph to its transitive closure. Backed by
/// the crawler in the pipeline; injected here so parsers stay offline.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn expand(&self, parsed: ParsedManifest) -> Result<ParsedManifest>;
}

/// All built-in parsers.
pub fn parsers() -> Vec<Box<dyn ManifestParser>> {
    vec![
        Box::new(PackageJsonParser),
        Box::new(PackageLockParser),
        Box::new(CargoTomlParser),
        Box::new(CargoLockParser),
        Box::new(RequirementsParser),
    ]
}

/// Finds the parser for a basename.
pub fn parser_for(basename: &str) -> Option<Box<dyn ManifestParser>> {
    parsers().into_iter().find(|p| p.supports(basename))
}

#[derive(Clone, Default)]
pub struct ParseOptions {
    pub resolver: Option<Arc<dyn Resolver>>,
}

/// Parses `path` with the matching parser and, for requirement files with a
/// resolver supplied, expands the result to the transitive graph.
pub async fn parse_manifest(path: &Path, opts: &ParseOptions) -> Result<ParsedManifest> {
    let basename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let parser = parser_for(basename)
        .ok_or_else(|| ManifestError::Unsupported(basename.to_string()))?;
    let parsed = parser.parse(path)?;
    tracing::debug!(
        "parsed {} as {}: {} nodes, transitive={}",
        path.display(),
        parser.kind(),
        parsed.graph.node_count(),
        parsed.includes_transitive,
    );
    if parsed.includes_transitive {
        return Ok(parsed);
    }
    match &opts.resolver {
        Some(resolver) => resolver.expand(parsed).await,
        None => Ok(parsed),
    }
}

pub(crate) fn read_manifest(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|err| ManifestError::IoError(format!("Failed to read {}", path.display()), err))
}
