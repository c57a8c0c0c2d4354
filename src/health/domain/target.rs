//! Probe target selection.

use super::{HealthDomainError, ProbeMethod};
use crate::discovery::domain::ServiceCandidate;
use minijinja::{Environment, context};
use tracing::warn;

/// Template used to guess an HTTP health endpoint from a port.
pub const DEFAULT_HEALTH_URL_TEMPLATE: &str = "http://{{ host }}:{{ port }}{{ path }}";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PATH: &str = "/health";

/// Renders health URLs for HTTP-speaking candidates that only know a port.
///
/// The template sees `host`, `port` and `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthUrlTemplate {
    template: String,
    host: String,
    path: String,
}

impl HealthUrlTemplate {
    /// Creates a template, checking that it renders to an HTTP URL.
    ///
    /// # Errors
    ///
    /// Returns [`HealthDomainError`] when the template is invalid or renders
    /// to something other than an `http://` or `https://` URL.
    pub fn new(
        template: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, HealthDomainError> {
        let candidate = Self {
            template: template.into(),
            host: host.into(),
            path: path.into(),
        };
        let sample = candidate.render(80)?;
        if !(sample.starts_with("http://") || sample.starts_with("https://")) {
            return Err(HealthDomainError::NotHttp(sample));
        }
        Ok(candidate)
    }

    /// Renders the URL for `port`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthDomainError::Template`] when rendering fails.
    pub fn render(&self, port: u16) -> Result<String, HealthDomainError> {
        Environment::new()
            .render_str(
                &self.template,
                context! { host => &self.host, port => port, path => &self.path },
            )
            .map(|url| url.trim().to_owned())
            .map_err(|err| HealthDomainError::Template(err.to_string()))
    }

    /// Returns the host used for guessed endpoints and TCP probes.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Default for HealthUrlTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_HEALTH_URL_TEMPLATE.to_owned(),
            host: DEFAULT_HOST.to_owned(),
            path: DEFAULT_PATH.to_owned(),
        }
    }
}

/// What to probe for a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// HTTP GET against a URL.
    Http {
        /// Health endpoint URL.
        url: String,
    },
    /// TCP connect to a socket address.
    Tcp {
        /// Host name or address.
        host: String,
        /// Port.
        port: u16,
    },
    /// Nothing to probe.
    Skip,
}

impl ProbeTarget {
    /// Chooses a strategy from the candidate's shape.
    ///
    /// An explicit health endpoint always wins. Otherwise a port is
    /// required: HTTP-speaking kinds get a rendered URL, everything else a
    /// TCP connect.
    #[must_use]
    pub fn for_candidate(candidate: &ServiceCandidate, template: &HealthUrlTemplate) -> Self {
        if let Some(url) = candidate.health_endpoint() {
            return Self::Http {
                url: url.to_owned(),
            };
        }
        let Some(port) = candidate.port() else {
            return Self::Skip;
        };
        if candidate.kind().speaks_http() {
            match template.render(port) {
                Ok(url) => return Self::Http { url },
                Err(err) => warn!(
                    service = candidate.name(),
                    error = %err,
                    "falling back to a TCP probe"
                ),
            }
        }
        Self::Tcp {
            host: template.host().to_owned(),
            port,
        }
    }

    /// Returns the probe method, absent for [`Self::Skip`].
    #[must_use]
    pub const fn method(&self) -> Option<ProbeMethod> {
        match self {
            Self::Http { .. } => Some(ProbeMethod::Http),
            Self::Tcp { .. } => Some(ProbeMethod::Tcp),
            Self::Skip => None,
        }
    }

    /// Describes the target for results and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Http { url } => url.clone(),
            Self::Tcp { host, port } => format!("{host}:{port}"),
            Self::Skip => "none".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::domain::{CandidateSource, ServiceKind};
    use rstest::rstest;

    fn candidate(kind: ServiceKind) -> ServiceCandidate {
        ServiceCandidate::new(CandidateSource::Manifest, "billing-service", "/srv/billing")
            .expect("valid candidate")
            .with_kind(kind)
    }

    #[test]
    fn explicit_endpoint_wins() {
        let subject = candidate(ServiceKind::Go)
            .with_port(9090)
            .with_health_endpoint("http://127.0.0.1:9090/livez");

        let target = ProbeTarget::for_candidate(&subject, &HealthUrlTemplate::default());

        assert_eq!(
            target,
            ProbeTarget::Http {
                url: "http://127.0.0.1:9090/livez".to_owned()
            }
        );
    }

    #[test]
    fn http_kinds_render_the_template() {
        let subject = candidate(ServiceKind::NodeExpress).with_port(4010);

        let target = ProbeTarget::for_candidate(&subject, &HealthUrlTemplate::default());

        assert_eq!(
            target,
            ProbeTarget::Http {
                url: "http://127.0.0.1:4010/health".to_owned()
            }
        );
    }

    #[rstest]
    #[case(ServiceKind::Go)]
    #[case(ServiceKind::Node)]
    #[case(ServiceKind::Unknown)]
    fn other_kinds_with_a_port_use_tcp(#[case] kind: ServiceKind) {
        let subject = candidate(kind).with_port(6379);

        let target = ProbeTarget::for_candidate(&subject, &HealthUrlTemplate::default());

        assert_eq!(target.method(), Some(ProbeMethod::Tcp));
        assert_eq!(target.describe(), "127.0.0.1:6379");
    }

    #[test]
    fn no_port_and_no_endpoint_is_skipped() {
        let subject = candidate(ServiceKind::PythonAsgi);
        assert_eq!(
            ProbeTarget::for_candidate(&subject, &HealthUrlTemplate::default()),
            ProbeTarget::Skip
        );
    }

    #[test]
    fn custom_templates_are_honoured() {
        let template = HealthUrlTemplate::new(
            "https://{{ host }}:{{ port }}/_status{{ path }}",
            "localhost",
            "/ping",
        )
        .expect("valid template");

        assert_eq!(
            template.render(8443).expect("renders"),
            "https://localhost:8443/_status/ping"
        );
    }

    #[rstest]
    #[case("{{ host ")]
    #[case("tcp://{{ host }}:{{ port }}")]
    fn invalid_templates_are_rejected(#[case] raw: &str) {
        assert!(HealthUrlTemplate::new(raw, "127.0.0.1", "/health").is_err());
    }
}
