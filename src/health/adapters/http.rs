//! HTTP health checks with retries.

use super::ProbeVerdict;
use crate::health::domain::ProbeOutcome;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Status strings a JSON health body may report while healthy.
const HEALTHY_BODY_STATUSES: &[&str] = &["ok", "healthy", "up", "pass", "passing"];

/// Timing and retry policy for HTTP probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpProbeSettings {
    /// Timeout for one request, body included.
    pub timeout: Duration,
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Delay before the first retry.
    pub backoff_initial: Duration,
    /// Upper bound on the doubled delay.
    pub backoff_max: Duration,
}

impl Default for HttpProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retries: 2,
            backoff_initial: Duration::from_millis(100),
            backoff_max: Duration::from_secs(1),
        }
    }
}

/// Result of a single request, before retry policy is applied.
enum Attempt {
    Healthy,
    Unhealthy { reason: String, retryable: bool },
    Unreachable(String),
}

impl Attempt {
    const fn retryable(&self) -> bool {
        match self {
            Self::Healthy => false,
            Self::Unhealthy { retryable, .. } => *retryable,
            Self::Unreachable(_) => true,
        }
    }

    fn into_verdict(self) -> ProbeVerdict {
        match self {
            Self::Healthy => ProbeVerdict::healthy(),
            Self::Unhealthy { reason, .. } => ProbeVerdict::failed(ProbeOutcome::Unhealthy, reason),
            Self::Unreachable(reason) => ProbeVerdict::failed(ProbeOutcome::Unreachable, reason),
        }
    }
}

/// Issues `GET` requests against health endpoints.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    settings: HttpProbeSettings,
}

impl HttpProber {
    /// Creates a prober with its own client.
    ///
    /// # Errors
    ///
    /// Returns the client construction error when TLS setup fails.
    pub fn new(settings: HttpProbeSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vauban/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    /// Creates a prober around an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, settings: HttpProbeSettings) -> Self {
        Self { client, settings }
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn settings(&self) -> HttpProbeSettings {
        self.settings
    }

    /// Checks `url`, retrying failures with exponential backoff.
    ///
    /// Client errors (4xx) are final and are not retried.
    pub async fn check(&self, url: &str) -> ProbeVerdict {
        let mut backoff = self.settings.backoff_initial;
        let mut retries_used = 0_u32;
        loop {
            let attempt = self.attempt(url).await;
            if !attempt.retryable() || retries_used >= self.settings.retries {
                return attempt.into_verdict();
            }
            retries_used += 1;
            debug!(url, retry = retries_used, ?backoff, "retrying health check");
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2).min(self.settings.backoff_max);
        }
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self
            .client
            .get(url)
            .timeout(self.settings.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Attempt::Unreachable(describe(&err)),
        };

        let status = response.status();
        if !status.is_success() {
            return Attempt::Unhealthy {
                reason: format!("HTTP {status}"),
                retryable: !status.is_client_error(),
            };
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().contains("json"));
        match response.text().await {
            Ok(body) => match check_body(is_json, &body) {
                Ok(()) => Attempt::Healthy,
                Err(reason) => Attempt::Unhealthy {
                    reason,
                    retryable: true,
                },
            },
            Err(err) => Attempt::Unreachable(describe(&err)),
        }
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_owned()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

/// Shape check on a successful response body.
///
/// Non-JSON bodies always pass. A JSON body must parse, and a top-level
/// `status` string must name a healthy state.
fn check_body(is_json: bool, body: &str) -> Result<(), String> {
    if !is_json || body.trim().is_empty() {
        return Ok(());
    }
    let document: Value =
        serde_json::from_str(body).map_err(|err| format!("invalid JSON health body: {err}"))?;
    let Some(reported) = document.get("status").and_then(Value::as_str) else {
        return Ok(());
    };
    if HEALTHY_BODY_STATUSES
        .iter()
        .any(|healthy| reported.trim().eq_ignore_ascii_case(healthy))
    {
        Ok(())
    } else {
        Err(format!("health body reports status {reported:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::closed_port;
    use mockito::Server;
    use rstest::{fixture, rstest};

    #[fixture]
    fn settings() -> HttpProbeSettings {
        HttpProbeSettings {
            timeout: Duration::from_millis(500),
            retries: 2,
            backoff_initial: Duration::from_millis(10),
            backoff_max: Duration::from_millis(20),
        }
    }

    fn prober(settings: HttpProbeSettings) -> HttpProber {
        HttpProber::new(settings).expect("client builds")
    }

    #[rstest]
    #[case(r#"{"status": "UP"}"#, true)]
    #[case(r#"{"status": "degraded"}"#, false)]
    #[case(r#"{"uptime": 12}"#, true)]
    #[case("{broken", false)]
    fn json_bodies_are_shape_checked(#[case] body: &str, #[case] passes: bool) {
        assert_eq!(check_body(true, body).is_ok(), passes);
    }

    #[test]
    fn plain_bodies_always_pass() {
        assert!(check_body(false, "{broken").is_ok());
    }

    #[rstest]
    #[tokio::test]
    async fn ok_response_is_healthy(settings: HttpProbeSettings) {
        let mut server = Server::new_async().await;
        let endpoint = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let verdict = prober(settings)
            .check(&format!("{}/health", server.url()))
            .await;

        assert_eq!(verdict, ProbeVerdict::healthy());
        endpoint.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_limit(settings: HttpProbeSettings) {
        let mut server = Server::new_async().await;
        let endpoint = server
            .mock("GET", "/health")
            .with_status(503)
            .with_body("warming up")
            .expect(3)
            .create_async()
            .await;

        let verdict = prober(settings)
            .check(&format!("{}/health", server.url()))
            .await;

        assert_eq!(verdict.outcome, ProbeOutcome::Unhealthy);
        endpoint.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn client_errors_are_not_retried(settings: HttpProbeSettings) {
        let mut server = Server::new_async().await;
        let endpoint = server
            .mock("GET", "/health")
            .with_status(404)
            .with_body("missing")
            .expect(1)
            .create_async()
            .await;

        let verdict = prober(settings)
            .check(&format!("{}/health", server.url()))
            .await;

        assert_eq!(verdict.outcome, ProbeOutcome::Unhealthy);
        endpoint.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn failed_shape_checks_exhaust_retries(settings: HttpProbeSettings) {
        let mut server = Server::new_async().await;
        let endpoint = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"down"}"#)
            .expect(3)
            .create_async()
            .await;

        let verdict = prober(settings)
            .check(&format!("{}/health", server.url()))
            .await;

        assert_eq!(verdict.outcome, ProbeOutcome::Unhealthy);
        endpoint.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn refused_connection_is_unreachable(settings: HttpProbeSettings) {
        let port = closed_port().await;

        let verdict = prober(settings)
            .check(&format!("http://127.0.0.1:{port}/health"))
            .await;

        assert_eq!(verdict.outcome, ProbeOutcome::Unreachable);
        assert!(verdict.error.is_some());
    }
}
