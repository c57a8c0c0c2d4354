//! Container runtime discovery.
//!
//! [`ContainerDiscovery`] maps running containers to candidates through the
//! [`ContainerRuntime`] port. [`DockerCli`] implements the port by asking the
//! docker CLI for its process list in JSON form.

use crate::discovery::{
    domain::{
        CandidateSource, Confidence, DiscoveryError, DiscoveryResult, ScanError, ServiceCandidate,
        ServiceKind,
    },
    ports::{ContainerRuntime, ContainerSummary, Discovery, DiscoverySource, PublishedPort},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio::process::Command;
use tracing::{debug, warn};

/// Label overriding the health check path of a container.
pub const HEALTH_PATH_LABEL: &str = "vauban.health.path";

/// Label overriding the port probed for a container.
pub const PORT_LABEL: &str = "vauban.port";

const DEFAULT_HEALTH_PATH: &str = "/health";
const SHORT_ID_LENGTH: usize = 12;

/// Discovery source backed by a container runtime.
#[derive(Debug, Clone)]
pub struct ContainerDiscovery<R>
where
    R: ContainerRuntime,
{
    runtime: R,
    health_path: String,
}

impl<R> ContainerDiscovery<R>
where
    R: ContainerRuntime,
{
    /// Creates a discovery source over `runtime`.
    #[must_use]
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            health_path: DEFAULT_HEALTH_PATH.to_owned(),
        }
    }

    /// Sets the health path guessed for containers without a label.
    #[must_use]
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    fn candidate_from(&self, container: &ContainerSummary) -> Result<ServiceCandidate, ScanError> {
        let short_id = container
            .id
            .get(..SHORT_ID_LENGTH)
            .unwrap_or(&container.id)
            .to_owned();
        let name = container
            .names
            .first()
            .cloned()
            .unwrap_or_else(|| short_id.clone());

        let mut candidate = ServiceCandidate::new(CandidateSource::Container, name, short_id)
            .map_err(|err| ScanError::InvalidEntry {
                origin: CandidateSource::Container.to_string(),
                reason: err.to_string(),
            })?
            .with_kind(ServiceKind::DockerContainer)
            .with_metadata("container_id", container.id.as_str())
            .with_metadata("image", container.image.as_str())
            .with_metadata("state", container.state.as_str())
            .with_metadata_entries(
                container
                    .labels
                    .iter()
                    .map(|(key, value)| (format!("label.{key}"), value.clone())),
            );

        let labelled_port = container
            .labels
            .get(PORT_LABEL)
            .and_then(|raw| raw.trim().parse::<u16>().ok());
        let port = labelled_port.or_else(|| published_tcp_port(&container.ports));
        let Some(port) = port else {
            return Ok(candidate.with_confidence(Confidence::new(0.5)));
        };

        let path = container
            .labels
            .get(HEALTH_PATH_LABEL)
            .map_or(self.health_path.as_str(), String::as_str);
        candidate = candidate
            .with_port(port)
            .with_health_endpoint(format!("http://127.0.0.1:{port}{path}"))
            .with_confidence(Confidence::new(0.9));
        Ok(candidate)
    }
}

fn published_tcp_port(ports: &[PublishedPort]) -> Option<u16> {
    ports
        .iter()
        .find(|binding| binding.protocol.eq_ignore_ascii_case("tcp"))
        .map(|binding| binding.host_port)
}

#[async_trait]
impl<R> DiscoverySource for ContainerDiscovery<R>
where
    R: ContainerRuntime,
{
    fn source(&self) -> CandidateSource {
        CandidateSource::Container
    }

    async fn discover(&self) -> DiscoveryResult<Discovery> {
        let containers = self.runtime.running_containers().await?;
        let mut discovery = Discovery::default();
        for container in &containers {
            match self.candidate_from(container) {
                Ok(candidate) => discovery.candidates.push(candidate),
                Err(issue) => {
                    warn!(error = %issue, "skipping container");
                    discovery.issues.push(issue);
                }
            }
        }
        debug!(
            containers = containers.len(),
            candidates = discovery.candidates.len(),
            "container discovery finished"
        );
        Ok(discovery)
    }
}

/// [`ContainerRuntime`] adapter shelling out to the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    endpoint: Option<String>,
}

impl DockerCli {
    /// Creates an adapter running `binary` against the default daemon.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            endpoint: None,
        }
    }

    /// Targets a specific daemon (`--host`), e.g. `unix:///run/docker.sock`.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn running_containers(&self) -> DiscoveryResult<Vec<ContainerSummary>> {
        let mut command = Command::new(&self.binary);
        if let Some(endpoint) = &self.endpoint {
            command.arg("--host").arg(endpoint);
        }
        command
            .args(["ps", "--no-trunc", "--format", "{{json .}}"])
            .kill_on_drop(true);

        let output = command.output().await.map_err(DiscoveryError::unavailable)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DiscoveryError::InvalidResponse(format!(
                "{} ps exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }
        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    names: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    ports: String,
    #[serde(default)]
    labels: String,
}

/// Parses newline-delimited `docker ps` JSON output.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidResponse`] when a line is not a JSON
/// container record.
pub fn parse_ps_output(stdout: &str) -> DiscoveryResult<Vec<ContainerSummary>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let record: PsLine = serde_json::from_str(line)
                .map_err(|err| DiscoveryError::InvalidResponse(err.to_string()))?;
            Ok(ContainerSummary {
                id: record.id,
                names: split_list(&record.names)
                    .map(|name| name.trim_start_matches('/').to_owned())
                    .collect(),
                image: record.image,
                state: record.state,
                status: record.status,
                ports: parse_ports(&record.ports),
                labels: parse_labels(&record.labels),
            })
        })
        .collect()
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Parses bindings like `0.0.0.0:8080->80/tcp, :::8080->80/tcp`.
///
/// Exposed-only ports and port ranges are skipped; duplicate host ports
/// (IPv4 and IPv6 bindings of one mapping) are listed once.
fn parse_ports(raw: &str) -> Vec<PublishedPort> {
    let mut ports: Vec<PublishedPort> = Vec::new();
    for binding in split_list(raw) {
        let Some(published) = parse_binding(binding) else {
            continue;
        };
        if !ports
            .iter()
            .any(|existing| existing.host_port == published.host_port)
        {
            ports.push(published);
        }
    }
    ports
}

fn parse_binding(binding: &str) -> Option<PublishedPort> {
    let (host, container) = binding.split_once("->")?;
    let (host_ip, host_port) = host.rsplit_once(':')?;
    let (container_port, protocol) = container.split_once('/').unwrap_or((container, "tcp"));
    Some(PublishedPort {
        host_ip: Some(host_ip.to_owned()).filter(|ip| !ip.is_empty()),
        host_port: host_port.parse().ok()?,
        container_port: container_port.parse().ok()?,
        protocol: protocol.to_owned(),
    })
}

fn parse_labels(raw: &str) -> BTreeMap<String, String> {
    split_list(raw)
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
        .collect()
}
