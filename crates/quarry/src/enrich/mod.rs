use async_trait::async_trait;
use plinth_common::{CancelToken, Package};
use serde_json::Value;

use crate::error::Result;

pub use github::GithubEnricher;

mod github;

/// Pluggable node enrichment from repository hosts. Enrichers run
/// concurrently per node; failures are always non-fatal and merely logged by
/// the crawler.
#[async_trait]
pub trait MetadataEnricher: std::fmt::Debug + Send + Sync {
    /// Short name used in warning messages.
    fn name(&self) -> &'static str;

    /// Produces metadata entries to merge into the node for this package.
    /// An empty result means the enricher has nothing to say (for example,
    /// the package has no repository on a host it understands).
    async fn enrich(
        &self,
        package: &Package,
        refresh: bool,
        cancel: &CancelToken,
    ) -> Result<Vec<(String, Value)>>;
}
