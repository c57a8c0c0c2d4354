//! TCP connect probes.

use super::ProbeVerdict;
use crate::health::domain::ProbeOutcome;
use std::time::Duration;
use tokio::net::TcpStream;

/// Checks that something accepts connections on a port.
#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    /// Creates a prober with a connect timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Connects to `host:port`; success is healthy, anything else unreachable.
    pub async fn check(&self, host: &str, port: u16) -> ProbeVerdict {
        match tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => ProbeVerdict::healthy(),
            Ok(Err(err)) => {
                ProbeVerdict::failed(ProbeOutcome::Unreachable, format!("connection failed: {err}"))
            }
            Err(_elapsed) => ProbeVerdict::failed(
                ProbeOutcome::Unreachable,
                format!("connect timed out after {:?}", self.timeout),
            ),
        }
    }
}
