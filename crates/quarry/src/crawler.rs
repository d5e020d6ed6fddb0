use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ashlar::Graph;
use futures::channel::mpsc;
use futures::StreamExt;
use plinth_common::{is_brittle, keys, tracing_logger, CancelToken, Logger, Package};
use serde_json::Value;

use crate::{MetadataEnricher, PackageFetcher, QuarryError, Result};

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_MAX_NODES: usize = 512;

/// A unit of crawl work: fetch `name`, whose shortest discovered path from
/// the root has `depth` edges.
#[derive(Clone, Debug)]
pub struct Job {
    pub(crate) name: String,
    pub(crate) depth: usize,
}

/// Build a crawl with specified options.
#[derive(Clone, Default)]
pub struct CrawlOptions {
    max_depth: Option<usize>,
    max_nodes: Option<usize>,
    concurrency: Option<usize>,
    refresh: bool,
    enrichers: Vec<Arc<dyn MetadataEnricher>>,
    logger: Option<Logger>,
    cancel: CancelToken,
}

impl CrawlOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Maximum number of edges from the root; dependencies past this depth
    /// appear as bare nodes but are not descended into.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Cap on total node count. Once reached, new dependency targets are
    /// pruned entirely.
    pub fn max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    /// Number of concurrent fetches.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Bypass HTTP cache reads (results are still written back).
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn enricher(mut self, enricher: Arc<dyn MetadataEnricher>) -> Self {
        self.enrichers.push(enricher);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Bounded-parallel crawler: turns a root package name plus a
/// [`PackageFetcher`] into a deduplicated dependency graph. Sibling
/// traversal order is unspecified; each name is fetched at most once.
pub struct Crawler {
    fetcher: Arc<dyn PackageFetcher>,
    opts: CrawlOptions,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PackageFetcher>, opts: CrawlOptions) -> Self {
        Self { fetcher, opts }
    }

    fn max_depth(&self) -> usize {
        self.opts.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    fn max_nodes(&self) -> usize {
        self.opts.max_nodes.unwrap_or(DEFAULT_MAX_NODES).max(1)
    }

    /// Crawls the graph reachable from `root`.
    ///
    /// A fetch failure on the root is fatal. Fetch failures elsewhere are
    /// logged and the node is kept, bare, so edges pointing at it stay
    /// valid. Enricher failures are always non-fatal.
    pub async fn crawl(&self, root: &str) -> Result<Graph> {
        let logger = self.opts.logger.clone().unwrap_or_else(tracing_logger);
        let cancel = self.opts.cancel.clone();
        let refresh = self.opts.refresh;
        let concurrency = self.opts.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1);
        let now_days = (SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            / 86_400) as i64;

        let root_id = self.fetcher.normalize(root);
        let (job_sink, job_stream) = mpsc::unbounded::<Job>();
        let fetch = self.fetcher.clone();
        let fetch_cancel = cancel.clone();
        let mut results = job_stream
            .map(move |job: Job| {
                let fetch = fetch.clone();
                let cancel = fetch_cancel.clone();
                async move {
                    let result = fetch.fetch(&job.name, refresh, &cancel).await;
                    (job, result)
                }
            })
            .buffer_unordered(concurrency)
            .ready_chunks(concurrency);

        let mut graph = Graph::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut in_flight = 0usize;

        visited.insert(root_id.clone());
        job_sink.unbounded_send(Job {
            name: root_id.clone(),
            depth: 0,
        })?;
        in_flight += 1;

        while in_flight > 0 {
            if cancel.is_cancelled() {
                // Stop scheduling, but drain in-flight fetches so their
                // responses still land in the HTTP cache. No partial graph
                // escapes.
                while in_flight > 0 {
                    match results.next().await {
                        Some(batch) => in_flight -= batch.len(),
                        None => break,
                    }
                }
                return Err(QuarryError::Cancelled);
            }
            let Some(batch) = results.next().await else {
                break;
            };
            for (job, result) in batch {
                in_flight -= 1;
                match result {
                    Ok(package) => {
                        self.ingest(
                            &mut graph,
                            &mut visited,
                            &job,
                            &package,
                            &job_sink,
                            &mut in_flight,
                            &logger,
                            now_days,
                        )
                        .await?
                    }
                    Err(err) if job.depth == 0 => return Err(err),
                    Err(err) => {
                        logger(&format!("failed to fetch `{}`: {err}", job.name));
                        graph.add_node(&job.name);
                    }
                }
            }
        }

        tracing::debug!(
            "crawled {} nodes / {} edges from `{root_id}`",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    #[allow(clippy::too_many_arguments)]
    async fn ingest(
        &self,
        graph: &mut Graph,
        visited: &mut HashSet<String>,
        job: &Job,
        package: &Package,
        job_sink: &mpsc::UnboundedSender<Job>,
        in_flight: &mut usize,
        logger: &Logger,
        now_days: i64,
    ) -> Result<()> {
        let mut enriched: Vec<(String, Value)> = Vec::new();
        if !self.opts.enrichers.is_empty() {
            let runs = self.opts.enrichers.iter().map(|enricher| {
                let cancel = self.opts.cancel.clone();
                let refresh = self.opts.refresh;
                async move {
                    (
                        enricher.name(),
                        enricher.enrich(package, refresh, &cancel).await,
                    )
                }
            });
            for (name, result) in futures::future::join_all(runs).await {
                match result {
                    Ok(pairs) => enriched.extend(pairs),
                    Err(err) => logger(&format!(
                        "enricher `{name}` failed for `{}`: {err}",
                        package.name
                    )),
                }
            }
        }

        {
            let node = graph.add_node(&job.name);
            if package.name != job.name {
                node.label = Some(package.name.clone());
            }
            if let Some(version) = &package.version {
                node.meta.set_version(version);
            }
            if let Some(description) = &package.description {
                node.meta
                    .insert(keys::DESCRIPTION, Value::from(description.clone()));
            }
            if let Some(license) = &package.license {
                node.meta
                    .insert(keys::LICENSE, Value::from(license.clone()));
            }
            if let Some(author) = &package.author {
                node.meta.insert(keys::AUTHOR, Value::from(author.clone()));
            }
            if let Some(downloads) = package.downloads {
                node.meta.insert(keys::DOWNLOADS, Value::from(downloads));
            }
            if let Some(homepage) = &package.homepage {
                node.meta
                    .insert(keys::HOMEPAGE, Value::from(homepage.to_string()));
            }
            if let Some(repository) = &package.repository {
                node.meta.set_repo_url(repository.as_str());
            }
            node.url = package.display_url();
            node.meta.merge(enriched);
            node.brittle = is_brittle(&node.meta, now_days);
        }

        for dep_raw in &package.dependencies {
            let dep = self.fetcher.normalize(dep_raw);
            if dep.is_empty() || dep == job.name {
                continue;
            }
            // Past the node cap, unseen targets are pruned entirely.
            if !graph.has_node(&dep) && graph.node_count() >= self.max_nodes() {
                continue;
            }
            graph.add_node(&dep);
            graph.ensure_edge(&job.name, &dep)?;
            if job.depth + 1 < self.max_depth()
                && graph.node_count() < self.max_nodes()
                && !visited.contains(&dep)
            {
                visited.insert(dep.clone());
                *in_flight += 1;
                job_sink.unbounded_send(Job {
                    name: dep,
                    depth: job.depth + 1,
                })?;
            }
        }
        Ok(())
    }
}
