//! Container runtime port used by container discovery.

use crate::discovery::domain::DiscoveryResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A port published by a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPort {
    /// Host interface address, when bound to one.
    pub host_ip: Option<String>,
    /// Port on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
    /// Transport protocol (`tcp` or `udp`).
    pub protocol: String,
}

/// Summary of one running container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerSummary {
    /// Container identifier.
    pub id: String,
    /// Container names, without a leading slash.
    pub names: Vec<String>,
    /// Image reference.
    pub image: String,
    /// Runtime state, such as `running`.
    pub state: String,
    /// Human-readable status line.
    pub status: String,
    /// Published port bindings.
    pub ports: Vec<PublishedPort>,
    /// Container labels.
    pub labels: BTreeMap<String, String>,
}

/// Read access to a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Lists running containers.
    async fn running_containers(&self) -> DiscoveryResult<Vec<ContainerSummary>>;
}
