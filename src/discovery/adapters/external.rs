//! Pull-based adapter for one external service registry.

use crate::discovery::{
    domain::{
        CandidateSource, Confidence, DiscoveryError, DiscoveryResult, ScanError, ServiceCandidate,
        ServiceKind,
    },
    ports::{Discovery, DiscoverySource},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// A service as described by the external registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalServiceDescriptor {
    /// Service name.
    #[serde(default)]
    pub name: Option<String>,
    /// Location string, such as a path or URL.
    #[serde(default)]
    pub location: Option<String>,
    /// Free-form service type.
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    /// Listening port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Health endpoint URL.
    #[serde(default, alias = "healthEndpoint")]
    pub health_endpoint: Option<String>,
    /// Entrypoint.
    #[serde(default)]
    pub entrypoint: Option<String>,
    /// Arbitrary metadata; non-string values are kept in their JSON form.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl ExternalServiceDescriptor {
    /// Converts the descriptor into a trusted candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidEntry`] when the name or location is
    /// missing.
    pub fn into_candidate(self) -> Result<ServiceCandidate, ScanError> {
        let origin = CandidateSource::External.to_string();
        let name = self.name.unwrap_or_default();
        let location = self.location.unwrap_or_default();
        let mut candidate = ServiceCandidate::new(CandidateSource::External, name, location)
            .map_err(|err| ScanError::InvalidEntry {
                origin,
                reason: err.to_string(),
            })?
            .with_confidence(Confidence::CERTAIN)
            .with_metadata_entries(self.metadata.into_iter().map(|(key, value)| {
                let rendered = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                (key, rendered)
            }));

        if let Some(kind) = self.kind {
            candidate = candidate.with_kind(ServiceKind::from(kind));
        }
        if let Some(port) = self.port {
            candidate = candidate.with_port(port);
        }
        if let Some(url) = self.health_endpoint {
            candidate = candidate.with_health_endpoint(url);
        }
        if let Some(entrypoint) = self.entrypoint {
            candidate = candidate.with_entrypoint(entrypoint);
        }
        Ok(candidate)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Bare(Vec<Value>),
    Wrapped { services: Vec<Value> },
}

/// Decodes a registry payload into candidates.
///
/// Entries that do not decode or lack identity become issues; the rest of
/// the payload is still used.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidResponse`] when the body is neither a
/// JSON array nor an object with a `services` array.
pub fn parse_payload(body: &str) -> DiscoveryResult<Discovery> {
    let payload: Payload = serde_json::from_str(body)
        .map_err(|err| DiscoveryError::InvalidResponse(err.to_string()))?;
    let entries = match payload {
        Payload::Bare(entries) | Payload::Wrapped { services: entries } => entries,
    };

    let mut discovery = Discovery::default();
    for entry in entries {
        let converted = serde_json::from_value::<ExternalServiceDescriptor>(entry)
            .map_err(|err| ScanError::InvalidEntry {
                origin: CandidateSource::External.to_string(),
                reason: err.to_string(),
            })
            .and_then(ExternalServiceDescriptor::into_candidate);
        match converted {
            Ok(candidate) => discovery.candidates.push(candidate),
            Err(issue) => {
                warn!(error = %issue, "skipping external registry entry");
                discovery.issues.push(issue);
            }
        }
    }
    Ok(discovery)
}

/// Discovery source reading one remote registry over HTTP.
#[derive(Debug, Clone)]
pub struct ExternalRegistryAdapter {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ExternalRegistryAdapter {
    /// Creates an adapter for `url` with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Unavailable`] when the HTTP client cannot
    /// be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> DiscoveryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DiscoveryError::unavailable)?;
        Ok(Self::with_client(client, url, timeout))
    }

    /// Creates an adapter around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    /// Returns the registry URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_error(&self, err: reqwest::Error) -> DiscoveryError {
        if err.is_timeout() {
            DiscoveryError::Timeout(self.timeout)
        } else {
            DiscoveryError::unavailable(err)
        }
    }
}

#[async_trait]
impl DiscoverySource for ExternalRegistryAdapter {
    fn source(&self) -> CandidateSource {
        CandidateSource::External
    }

    async fn discover(&self) -> DiscoveryResult<Discovery> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| self.request_error(err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::InvalidResponse(format!(
                "{} answered HTTP {status}",
                self.url
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|err| self.request_error(err))?;
        let discovery = parse_payload(&body)?;
        debug!(
            url = %self.url,
            candidates = discovery.candidates.len(),
            issues = discovery.issues.len(),
            "external registry read"
        );
        Ok(discovery)
    }
}
