use async_trait::async_trait;
use plinth_common::{CancelToken, ManifestKind, Package};

use crate::error::Result;

pub use crates_io::CratesIoFetcher;
pub use npm::NpmFetcher;
pub use pypi::PyPiFetcher;

mod crates_io;
mod npm;
mod pypi;

/// A per-ecosystem package source. Implementations must be safe for
/// concurrent calls and must route all I/O through the cached
/// [`plinth_client::PlinthClient`] so retries and timeouts stay uniform.
#[async_trait]
pub trait PackageFetcher: std::fmt::Debug + Send + Sync {
    /// Which ecosystem this fetcher serves.
    fn kind(&self) -> ManifestKind;

    /// Normalizes a raw package name into the node id used for
    /// deduplication.
    fn normalize(&self, name: &str) -> String;

    /// Fetches the latest published record for `name`. `refresh` bypasses
    /// the HTTP cache read (the result is still written back).
    async fn fetch(&self, name: &str, refresh: bool, cancel: &CancelToken) -> Result<Package>;
}
