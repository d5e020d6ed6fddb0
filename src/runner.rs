use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ashlar::{normalize, Graph, NormalizeOptions};
use async_trait::async_trait;
use gantry::{
    build as build_layout, influence_ranking, Frame, Layout, LayoutOptions, Style, VizType,
    DEFAULT_RANKING_SIZE,
};
use plinth_client::PlinthClient;
use plinth_common::{tracing_logger, CancelToken, Logger, ManifestKind};
use plinth_manifest::{
    parse_manifest, parser_for, ManifestError, ParseOptions, ParsedManifest, Resolver,
    Result as ManifestResult,
};
use plumb::{BarycentricOrderer, OptimalOrderer, Orderer};
use quarry::{
    CratesIoFetcher, CrawlOptions, Crawler, GithubEnricher, NpmFetcher, PackageFetcher,
    PyPiFetcher, QuarryError,
};
use serde_json::json;

use crate::{Cache, NullCache, PlinthError};

pub const DEFAULT_MAX_DEPTH: usize = quarry::DEFAULT_MAX_DEPTH;
pub const DEFAULT_MAX_NODES: usize = quarry::DEFAULT_MAX_NODES;
pub const DEFAULT_GRAPH_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_LAYOUT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_ARTIFACT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What to resolve: a registry package or a local manifest file.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Package(String),
    Manifest(PathBuf),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrdererKind {
    #[default]
    Barycentric,
    Optimal,
}

impl Display for OrdererKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrdererKind::Barycentric => write!(f, "barycentric"),
            OrdererKind::Optimal => write!(f, "optimal"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArtifactFormat {
    #[default]
    Json,
    Svg,
    Pdf,
    Png,
}

impl Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactFormat::Json => write!(f, "json"),
            ArtifactFormat::Svg => write!(f, "svg"),
            ArtifactFormat::Pdf => write!(f, "pdf"),
            ArtifactFormat::Png => write!(f, "png"),
        }
    }
}

/// Everything the artifact sink needs beyond the layout itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArtifactOptions {
    pub format: ArtifactFormat,
    pub style: Style,
    pub show_edges: bool,
    pub popups: bool,
    pub nebraska: bool,
    pub merge: bool,
    pub normalize: bool,
}

/// Caller options for one pipeline run. Validated once per execute;
/// validation is pure and never performs I/O.
#[derive(Clone, Debug)]
pub struct ExecuteOptions {
    pub target: Target,
    pub ecosystem: ManifestKind,
    pub max_depth: usize,
    pub max_nodes: usize,
    pub enrich: bool,
    /// Skip cache reads (HTTP and stage caches); results are still written
    /// back.
    pub refresh: bool,
    pub viz: VizType,
    pub width: f64,
    pub height: f64,
    pub normalize: bool,
    pub orderer: OrdererKind,
    pub merge: bool,
    pub randomize: bool,
    pub seed: u64,
    pub format: ArtifactFormat,
    pub style: Style,
    pub show_edges: bool,
    pub popups: bool,
    pub nebraska: bool,
}

impl ExecuteOptions {
    pub fn package(name: impl AsRef<str>, ecosystem: ManifestKind) -> Self {
        Self::with_target(Target::Package(name.as_ref().into()), ecosystem)
    }

    pub fn manifest(path: impl Into<PathBuf>, ecosystem: ManifestKind) -> Self {
        Self::with_target(Target::Manifest(path.into()), ecosystem)
    }

    fn with_target(target: Target, ecosystem: ManifestKind) -> Self {
        ExecuteOptions {
            target,
            ecosystem,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            enrich: false,
            refresh: false,
            viz: VizType::default(),
            width: 1200.0,
            height: 800.0,
            normalize: true,
            orderer: OrdererKind::default(),
            merge: false,
            randomize: false,
            seed: 0,
            format: ArtifactFormat::default(),
            style: Style::default(),
            show_edges: true,
            popups: false,
            nebraska: false,
        }
    }

    pub fn artifact_options(&self) -> ArtifactOptions {
        ArtifactOptions {
            format: self.format,
            style: self.style,
            show_edges: self.show_edges,
            popups: self.popups,
            nebraska: self.nebraska,
            merge: self.merge,
            normalize: self.normalize,
        }
    }

    /// Checks user-supplied fields before any I/O happens. Idempotent.
    pub fn validate(&self) -> Result<(), PlinthError> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(PlinthError::InvalidOption("width must be positive".into()));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(PlinthError::InvalidOption("height must be positive".into()));
        }
        if self.max_depth == 0 {
            return Err(PlinthError::InvalidOption(
                "max-depth must be at least 1".into(),
            ));
        }
        if self.max_nodes == 0 {
            return Err(PlinthError::InvalidOption(
                "max-nodes must be at least 1".into(),
            ));
        }
        match &self.target {
            Target::Package(name) => {
                if name.trim().is_empty() {
                    return Err(PlinthError::InvalidOption("package name is empty".into()));
                }
                if name.chars().any(char::is_whitespace) {
                    return Err(PlinthError::InvalidOption(format!(
                        "package name `{name}` contains whitespace"
                    )));
                }
            }
            Target::Manifest(path) => {
                let basename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or_default();
                if parser_for(basename).is_none() {
                    return Err(ManifestError::Unsupported(basename.to_string()).into());
                }
            }
        }
        Ok(())
    }
}

/// The artifact sink: consumes a finished layout plus artifact options and
/// emits the final bytes (SVG, PDF, ...). Supplied by the caller; the runner
/// only caches around it.
pub type RenderFn = Arc<dyn Fn(&Layout, &ArtifactOptions) -> Result<Vec<u8>, PlinthError> + Send + Sync>;

/// The built-in sink: the layout's canonical JSON.
pub fn json_renderer() -> RenderFn {
    Arc::new(|layout: &Layout, _opts: &ArtifactOptions| {
        layout.to_json().map_err(PlinthError::from)
    })
}

/// Result of one pipeline run, with per-stage cache-hit flags.
#[derive(Clone, Debug)]
pub struct ExecuteOutcome {
    pub graph: Graph,
    pub layout: Layout,
    pub artifact: Vec<u8>,
    pub parse_cached: bool,
    pub layout_cached: bool,
    pub artifact_cached: bool,
}

pub struct RunnerBuilder {
    cache: Option<Arc<dyn Cache>>,
    client: Option<PlinthClient>,
    logger: Option<Logger>,
    graph_ttl: Duration,
    layout_ttl: Duration,
    artifact_ttl: Duration,
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        RunnerBuilder {
            cache: None,
            client: None,
            logger: None,
            graph_ttl: DEFAULT_GRAPH_TTL,
            layout_ttl: DEFAULT_LAYOUT_TTL,
            artifact_ttl: DEFAULT_ARTIFACT_TTL,
        }
    }
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stage-result cache. Defaults to [`NullCache`] (caching disabled).
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// HTTP client shared by fetchers and enrichers.
    pub fn client(mut self, client: PlinthClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn graph_ttl(mut self, ttl: Duration) -> Self {
        self.graph_ttl = ttl;
        self
    }

    pub fn layout_ttl(mut self, ttl: Duration) -> Self {
        self.layout_ttl = ttl;
        self
    }

    pub fn artifact_ttl(mut self, ttl: Duration) -> Self {
        self.artifact_ttl = ttl;
        self
    }

    pub fn build(self) -> Runner {
        Runner {
            cache: self.cache.unwrap_or_else(|| Arc::new(NullCache)),
            client: self.client.unwrap_or_default(),
            logger: self.logger.unwrap_or_else(tracing_logger),
            graph_ttl: self.graph_ttl,
            layout_ttl: self.layout_ttl,
            artifact_ttl: self.artifact_ttl,
        }
    }
}

/// The deterministic pipeline runner: parse -> layout -> artifact, each
/// stage keyed by a content hash of its inputs and cached with its own TTL.
/// At most one computation per key is observable to the caller; a stage
/// error aborts the run while earlier stages stay cached for retry.
pub struct Runner {
    cache: Arc<dyn Cache>,
    client: PlinthClient,
    logger: Logger,
    graph_ttl: Duration,
    layout_ttl: Duration,
    artifact_ttl: Duration,
}

impl Runner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    /// Releases the cache handle.
    pub async fn close(&self) -> Result<(), PlinthError> {
        self.cache.close().await
    }

    fn fetcher_for(&self, kind: &ManifestKind) -> Result<Arc<dyn PackageFetcher>, PlinthError> {
        match kind {
            ManifestKind::Npm => Ok(Arc::new(NpmFetcher::with_client(self.client.clone()))),
            ManifestKind::Cargo => Ok(Arc::new(CratesIoFetcher::with_client(self.client.clone()))),
            ManifestKind::PyPi => Ok(Arc::new(PyPiFetcher::with_client(self.client.clone()))),
            ManifestKind::Other(tag) => Err(PlinthError::UnsupportedEcosystem(tag.clone())),
        }
    }

    fn crawl_options(&self, opts: &ExecuteOptions, cancel: &CancelToken) -> CrawlOptions {
        let mut crawl = CrawlOptions::new()
            .max_depth(opts.max_depth)
            .max_nodes(opts.max_nodes)
            .refresh(opts.refresh)
            .logger(self.logger.clone())
            .cancel(cancel.clone());
        if opts.enrich {
            crawl = crawl.enricher(Arc::new(GithubEnricher::with_client(self.client.clone())));
        }
        crawl
    }

    /// Runs just the parse stage: target -> (possibly cached) dependency
    /// graph.
    pub async fn resolve(
        &self,
        opts: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> Result<Graph, PlinthError> {
        opts.validate()?;
        Ok(self.parse_stage(opts, cancel).await?.0)
    }

    /// Runs the full pipeline.
    pub async fn execute(
        &self,
        opts: &ExecuteOptions,
        render: &RenderFn,
        cancel: &CancelToken,
    ) -> Result<ExecuteOutcome, PlinthError> {
        opts.validate()?;
        let (graph, graph_bytes, parse_cached) = self.parse_stage(opts, cancel).await?;
        if cancel.is_cancelled() {
            return Err(PlinthError::Cancelled);
        }
        let (layout, layout_bytes, layout_cached) =
            self.layout_stage(opts, &graph, &graph_bytes).await?;
        if cancel.is_cancelled() {
            return Err(PlinthError::Cancelled);
        }
        let (artifact, artifact_cached) = self
            .artifact_stage(opts, &layout, &layout_bytes, render)
            .await?;
        Ok(ExecuteOutcome {
            graph,
            layout,
            artifact,
            parse_cached,
            layout_cached,
            artifact_cached,
        })
    }

    async fn parse_stage(
        &self,
        opts: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> Result<(Graph, Vec<u8>, bool), PlinthError> {
        let target_token = match &opts.target {
            Target::Package(name) => name.clone(),
            Target::Manifest(path) => {
                let bytes = std::fs::read(path).map_err(|err| {
                    PlinthError::IoError(format!("Failed to read {}", path.display()), err)
                })?;
                content_hash(&bytes)
            }
        };
        // Refresh never changes the key; enrichment does.
        let key = stage_key(
            "parse",
            &json!([
                opts.ecosystem.to_string(),
                target_token,
                opts.max_depth,
                opts.max_nodes,
                opts.enrich,
            ]),
        );
        if !opts.refresh {
            if let Some(bytes) = self.cache.get(&key).await? {
                let graph = Graph::from_json(&bytes)?;
                return Ok((graph, bytes, true));
            }
        }
        let graph = match &opts.target {
            Target::Package(name) => {
                let fetcher = self.fetcher_for(&opts.ecosystem)?;
                let crawler = Crawler::new(fetcher, self.crawl_options(opts, cancel));
                crawler.crawl(name).await.map_err(|err| match err {
                    QuarryError::Cancelled => PlinthError::Cancelled,
                    other => other.into(),
                })?
            }
            Target::Manifest(path) => {
                let resolver: Option<Arc<dyn Resolver>> =
                    self.fetcher_for(&opts.ecosystem).ok().map(|fetcher| {
                        Arc::new(CrawlerResolver {
                            fetcher,
                            crawl_opts: self.crawl_options(opts, cancel),
                        }) as Arc<dyn Resolver>
                    });
                let parsed = parse_manifest(path, &ParseOptions { resolver }).await?;
                parsed.graph
            }
        };
        let bytes = graph.to_json()?;
        self.cache.set(&key, &bytes, self.graph_ttl).await?;
        Ok((graph, bytes, false))
    }

    async fn layout_stage(
        &self,
        opts: &ExecuteOptions,
        graph: &Graph,
        graph_bytes: &[u8],
    ) -> Result<(Layout, Vec<u8>, bool), PlinthError> {
        let key = stage_key(
            "layout",
            &json!([
                content_hash(graph_bytes),
                serde_json::to_value(opts.viz)?,
                opts.width,
                opts.height,
                opts.normalize,
                opts.orderer.to_string(),
                opts.merge,
                opts.randomize,
                opts.seed,
            ]),
        );
        if !opts.refresh {
            if let Some(bytes) = self.cache.get(&key).await? {
                let layout = Layout::from_json(&bytes)?;
                return Ok((layout, bytes, true));
            }
        }

        let mut working = graph.clone();
        if opts.normalize {
            normalize(&mut working, &NormalizeOptions::default())?;
        }
        let orders = match opts.orderer {
            OrdererKind::Barycentric => BarycentricOrderer::default().order_rows(&working)?,
            OrdererKind::Optimal => OptimalOrderer::new().order_rows(&working)?,
        };
        let layout_opts = LayoutOptions {
            frame: Frame {
                width: opts.width,
                height: opts.height,
                ..Frame::default()
            },
            style: opts.style,
            viz: opts.viz,
            seed: opts.seed,
            ..Default::default()
        };
        let mut layout = build_layout(&working, &orders, &layout_opts)?;
        if opts.randomize {
            layout = layout.randomize(&working, &layout_opts);
        }
        if opts.merge {
            layout = layout.merge(&working);
        }
        layout = layout.with_nebraska(influence_ranking(&working, DEFAULT_RANKING_SIZE));

        let bytes = layout.to_json()?;
        self.cache.set(&key, &bytes, self.layout_ttl).await?;
        Ok((layout, bytes, false))
    }

    async fn artifact_stage(
        &self,
        opts: &ExecuteOptions,
        layout: &Layout,
        layout_bytes: &[u8],
        render: &RenderFn,
    ) -> Result<(Vec<u8>, bool), PlinthError> {
        let artifact_opts = opts.artifact_options();
        let key = stage_key(
            "artifact",
            &json!([
                content_hash(layout_bytes),
                artifact_opts.format.to_string(),
                serde_json::to_value(artifact_opts.style)?,
                artifact_opts.show_edges,
                artifact_opts.popups,
                artifact_opts.nebraska,
                artifact_opts.merge,
                artifact_opts.normalize,
            ]),
        );
        if !opts.refresh {
            if let Some(bytes) = self.cache.get(&key).await? {
                return Ok((bytes, true));
            }
        }
        let bytes = render(layout, &artifact_opts)?;
        self.cache.set(&key, &bytes, self.artifact_ttl).await?;
        Ok((bytes, false))
    }
}

/// Expands a requirement-file graph to its transitive closure by crawling
/// each direct dependency. Failures on individual roots are non-fatal, like
/// any non-root crawl failure.
struct CrawlerResolver {
    fetcher: Arc<dyn PackageFetcher>,
    crawl_opts: CrawlOptions,
}

#[async_trait]
impl Resolver for CrawlerResolver {
    async fn expand(&self, parsed: ParsedManifest) -> ManifestResult<ParsedManifest> {
        let mut graph = parsed.graph.clone();
        for dep in &parsed.root.dependencies {
            let crawler = Crawler::new(self.fetcher.clone(), self.crawl_opts.clone());
            match crawler.crawl(dep).await {
                Ok(sub) => merge_graph(&mut graph, &sub)?,
                Err(err) if matches!(err, QuarryError::Cancelled) => {
                    return Err(ManifestError::ExpandError("crawl cancelled".into()))
                }
                Err(err) => {
                    tracing::warn!("failed to expand `{dep}`: {err}");
                }
            }
        }
        Ok(ParsedManifest {
            graph,
            root: parsed.root,
            includes_transitive: true,
        })
    }
}

fn merge_graph(dst: &mut Graph, src: &Graph) -> ManifestResult<()> {
    for id in src.ids() {
        let node = src.node(&id).expect("id from src");
        match dst.node_mut(&id) {
            None => dst.insert_node(node.clone())?,
            Some(existing) => {
                if existing.meta.is_empty() && !node.meta.is_empty() {
                    existing.meta = node.meta.clone();
                    existing.label = node.label.clone();
                    existing.url = node.url.clone();
                    existing.brittle = node.brittle;
                }
            }
        }
    }
    for (from, to) in src.edges() {
        dst.ensure_edge(&from, &to)?;
    }
    Ok(())
}

fn content_hash(bytes: &[u8]) -> String {
    ssri::Integrity::from(bytes).to_string()
}

fn stage_key(stage: &str, parts: &serde_json::Value) -> String {
    let material =
        serde_json::to_vec(&json!([stage, parts])).expect("key material always serializes");
    format!("plinth:{stage}:{}", content_hash(&material))
}
