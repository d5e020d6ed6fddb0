//! Shared types for the plinth dependency-tower toolkit: the registry-neutral
//! package record, the node metadata bag and its typed façade, and the
//! handler/cancellation contracts injected into the resolver and orderer.

mod hooks;
mod meta;
mod names;
mod package;

pub use hooks::*;
pub use meta::*;
pub use names::*;
pub use package::*;
