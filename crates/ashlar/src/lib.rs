//! The dependency DAG at the heart of the tower pipeline: string-id nodes
//! assigned to horizontal rows, directed edges, canonical JSON, and the
//! normalization steps (cycle breaking, transitive reduction, layering,
//! subdivision, span-overlap resolution) that make a crawled graph legal for
//! tower layout.

mod error;
mod graph;
mod node;
mod normalize;
mod wire;

pub use error::{AshlarError, Result};
pub use graph::*;
pub use node::*;
pub use normalize::*;
pub use wire::*;

/// Reserved node id for the synthetic root added by manifest parsers.
pub const PROJECT_ROOT_ID: &str = "__project__";
