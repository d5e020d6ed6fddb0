//! Row ordering for tower layout: a PQ-tree over each row encodes which
//! orderings keep related blocks consecutive, a barycentric heuristic
//! produces a fast incumbent, and a branch-and-bound search hunts for the
//! ordering with the fewest edge crossings.

mod barycentric;
mod crossings;
mod error;
mod fenwick;
mod optimal;
mod orderer;
mod pqtree;

pub use barycentric::*;
pub use crossings::*;
pub use error::{PlumbError, Result};
pub use optimal::*;
pub use orderer::*;
pub use pqtree::*;
