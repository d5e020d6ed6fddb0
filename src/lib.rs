//! Plinth turns a package name or manifest file into a dependency graph and
//! lays it out as a tower: every block rests on the blocks it depends on.
//!
//! The heavy lifting lives in the member crates — [`quarry`] fetches and
//! crawls registries, [`ashlar`] holds and normalizes the DAG, [`plumb`]
//! orders rows to minimize crossings, [`gantry`] positions blocks — while
//! this crate wires them into a deterministic, cached, three-stage pipeline:
//! parse, layout, artifact. Every stage is keyed by a content hash of its
//! inputs, so repeated runs with the same inputs hit the cache instead of
//! recomputing (or re-downloading) anything.

mod cache;
mod error;
mod runner;

pub use cache::*;
pub use error::PlinthError;
pub use runner::*;

pub use ashlar::{normalize, Graph, Node, NodeKind, NormalizeOptions, PROJECT_ROOT_ID};
pub use gantry::{build as build_layout, influence_ranking, Frame, Layout, LayoutOptions, Style, VizType};
pub use plinth_client::PlinthClient;
pub use plinth_common::{CancelToken, Logger, ManifestKind, Package};
pub use plumb::{count_crossings, BarycentricOrderer, OptimalOrderer, Orderer, RowOrders};
pub use quarry::{CrawlOptions, Crawler, MetadataEnricher, PackageFetcher};
