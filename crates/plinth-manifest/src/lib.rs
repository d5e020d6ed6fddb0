//! Thin manifest-file decoders. Each parser turns one manifest format into a
//! direct-dependency graph (requirement files) or a full transitive graph
//! (lock files). Parsers never touch the network; expanding a
//! direct-dependency graph to its transitive closure is delegated to an
//! injected [`Resolver`].

mod cargo;
mod error;
mod npm;
mod parser;
mod python;

pub use cargo::*;
pub use error::{ManifestError, Result};
pub use npm::*;
pub use parser::*;
pub use python::*;
