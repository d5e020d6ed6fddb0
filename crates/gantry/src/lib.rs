//! Tower layout: rows of blocks where every block physically rests on the
//! blocks it depends on. Widths flow up from the sinks, overlap repair keeps
//! edges implementable, and optional transforms shrink blocks for a
//! hand-stacked look or fuse subdivider chains into pillars.

mod build;
mod error;
mod layout;
mod nebraska;
mod transform;

pub use build::*;
pub use error::{GantryError, Result};
pub use layout::*;
pub use nebraska::*;
