//! Discovery source adapters: manifests on disk, a container runtime, and
//! one external registry.

pub mod container;
pub mod external;
pub mod scanner;

pub use container::{ContainerDiscovery, DockerCli, HEALTH_PATH_LABEL, PORT_LABEL};
pub use external::{ExternalRegistryAdapter, ExternalServiceDescriptor};
pub use scanner::{DEFAULT_EXCLUDED_DIRS, DEFAULT_MAX_DEPTH, ManifestScanner};
