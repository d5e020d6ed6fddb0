//! Registry-facing half of the tower pipeline: per-ecosystem package
//! fetchers, repository-metadata enrichers, and the bounded-parallel crawler
//! that turns a root package name into a dependency [`ashlar::Graph`].

mod crawler;
mod enrich;
mod error;
mod fetch;

pub use crawler::*;
pub use enrich::*;
pub use error::{QuarryError, Result};
pub use fetch::*;
