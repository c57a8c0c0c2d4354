//! Port contracts for discovery sources.

mod container;
mod source;

pub use container::{ContainerRuntime, ContainerSummary, PublishedPort};
pub use source::{Discovery, DiscoverySource};
