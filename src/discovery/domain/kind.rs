//! Inferred service type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of service a candidate appears to be.
///
/// Local detectors produce the named variants. The external registry may
/// report arbitrary type strings, which are kept verbatim in
/// [`ServiceKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceKind {
    /// Node project with a start script or entry module but no known
    /// framework.
    NodeHttp,
    /// Node project using Express.
    NodeExpress,
    /// Node project using Fastify.
    NodeFastify,
    /// Node project using Koa.
    NodeKoa,
    /// Node project using `NestJS`.
    NodeNest,
    /// Node project using Next.js.
    NodeNext,
    /// Node project using hapi.
    NodeHapi,
    /// Node package with no server signal.
    Node,
    /// Python project using an ASGI framework.
    PythonAsgi,
    /// Python project using a WSGI framework.
    PythonWsgi,
    /// Python project with no framework marker.
    Python,
    /// Directory carrying a Dockerfile.
    Dockerfile,
    /// Directory carrying a compose file.
    DockerCompose,
    /// Running container reported by the runtime.
    DockerContainer,
    /// Go module.
    Go,
    /// Rust package.
    Rust,
    /// Procfile-described process.
    Procfile,
    /// Nothing could be inferred.
    Unknown,
    /// Type reported by an external source.
    Other(String),
}

impl ServiceKind {
    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NodeHttp => "node-http",
            Self::NodeExpress => "node-express",
            Self::NodeFastify => "node-fastify",
            Self::NodeKoa => "node-koa",
            Self::NodeNest => "node-nest",
            Self::NodeNext => "node-next",
            Self::NodeHapi => "node-hapi",
            Self::Node => "node",
            Self::PythonAsgi => "python-asgi",
            Self::PythonWsgi => "python-wsgi",
            Self::Python => "python",
            Self::Dockerfile => "dockerfile",
            Self::DockerCompose => "docker-compose",
            Self::DockerContainer => "docker-container",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Procfile => "procfile",
            Self::Unknown => "unknown",
            Self::Other(value) => value,
        }
    }

    /// Returns whether a service of this kind is expected to answer HTTP.
    ///
    /// Kinds that do not speak HTTP are probed with a bare TCP connect.
    #[must_use]
    pub const fn speaks_http(&self) -> bool {
        matches!(
            self,
            Self::NodeHttp
                | Self::NodeExpress
                | Self::NodeFastify
                | Self::NodeKoa
                | Self::NodeNest
                | Self::NodeNext
                | Self::NodeHapi
                | Self::PythonAsgi
                | Self::PythonWsgi
                | Self::DockerContainer
        )
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<&str> for ServiceKind {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "node-http" => Self::NodeHttp,
            "node-express" => Self::NodeExpress,
            "node-fastify" => Self::NodeFastify,
            "node-koa" => Self::NodeKoa,
            "node-nest" => Self::NodeNest,
            "node-next" => Self::NodeNext,
            "node-hapi" => Self::NodeHapi,
            "node" => Self::Node,
            "python-asgi" => Self::PythonAsgi,
            "python-wsgi" => Self::PythonWsgi,
            "python" => Self::Python,
            "dockerfile" => Self::Dockerfile,
            "docker-compose" => Self::DockerCompose,
            "docker-container" => Self::DockerContainer,
            "go" => Self::Go,
            "rust" => Self::Rust,
            "procfile" => Self::Procfile,
            "" | "unknown" => Self::Unknown,
            _ => Self::Other(value.trim().to_owned()),
        }
    }
}

impl From<String> for ServiceKind {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ServiceKind> for String {
    fn from(value: ServiceKind) -> Self {
        match value {
            ServiceKind::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}
