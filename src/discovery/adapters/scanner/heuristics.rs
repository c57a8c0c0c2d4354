//! Textual heuristics for ports, health routes, and confidence.
//!
//! Everything here is best effort. A pattern that does not compile or does
//! not match yields `None`; nothing in this module reports an error.

use crate::discovery::domain::Confidence;
use regex::Regex;
use std::sync::LazyLock;

static COMMAND_PORT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:--port(?:=|\s+)|(?:^|\s)-p\s+|\bPORT=)(\d{2,5})\b").ok()
});

static JS_PORT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"\.listen\(\s*(\d{2,5})\b",
        r"PORT\s*(?:\|\||\?\?)\s*(\d{2,5})\b",
        r"\bport\s*:\s*(\d{2,5})\b",
    ])
});

static PYTHON_PORT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"\bport\s*=\s*(\d{2,5})\b",
        r"--port(?:=|\s+)(\d{2,5})\b",
        r#"["']PORT["']\s*,\s*["']?(\d{2,5})\b"#,
        r#"["'](?:[\w.]*):(\d{2,5})["']"#,
    ])
});

static ADDRESS_PORT: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_all(&[r#"["'](?:[\w.]*):(\d{2,5})["']"#]));

static DOCKER_EXPOSE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*EXPOSE\s+(\d{2,5})").ok());

static COMPOSE_PORT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*-\s*["']?(?:\d{1,3}(?:\.\d{1,3}){3}:)?(\d{2,5}):\d{2,5}"#).ok()
});

static HEALTH_ROUTE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"["'](/(?:healthz?|readyz?|livez|status))["']"#).ok()
});

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

fn capture_port(pattern: &Regex, text: &str) -> Option<u16> {
    pattern
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .filter_map(|digits| digits.as_str().parse::<u16>().ok())
        .find(|port| *port != 0)
}

fn first_port<'a>(patterns: impl IntoIterator<Item = &'a Regex>, text: &str) -> Option<u16> {
    patterns
        .into_iter()
        .find_map(|pattern| capture_port(pattern, text))
}

/// Port passed on a command line (`--port 8080`, `-p 8080`, `PORT=8080`).
pub(super) fn port_from_command(command: &str) -> Option<u16> {
    first_port(COMMAND_PORT.as_ref(), command)
}

/// Port a JavaScript entry module listens on.
pub(super) fn port_from_js_source(source: &str) -> Option<u16> {
    first_port(JS_PORT.iter(), source)
}

/// Port a Python entry module binds, from `host=..., port=...` style calls.
pub(super) fn port_from_python_source(source: &str) -> Option<u16> {
    first_port(PYTHON_PORT.iter(), source)
}

/// Port in a quoted `host:port` literal, as Go and Rust servers write them.
pub(super) fn port_from_address_literal(source: &str) -> Option<u16> {
    first_port(ADDRESS_PORT.iter(), source)
}

/// First `EXPOSE` directive of a Dockerfile.
pub(super) fn port_from_dockerfile(source: &str) -> Option<u16> {
    first_port(DOCKER_EXPOSE.as_ref(), source)
}

/// First published host port of a compose file.
pub(super) fn port_from_compose(source: &str) -> Option<u16> {
    first_port(COMPOSE_PORT.as_ref(), source)
}

/// Literal health route mentioned in source, such as `"/healthz"`.
pub(super) fn health_route(source: &str) -> Option<String> {
    HEALTH_ROUTE
        .as_ref()?
        .captures(source)
        .and_then(|captures| captures.get(1))
        .map(|route| route.as_str().to_owned())
}

/// Where a candidate's port came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PortEvidence {
    /// Written in the project itself.
    Explicit,
    /// Assumed from the framework's usual default.
    FrameworkDefault,
    /// Not known.
    Missing,
}

/// Confidence for a manifest-backed candidate given the signals present.
pub(super) fn confidence(port: PortEvidence, has_entrypoint: bool) -> Confidence {
    let value = match (port, has_entrypoint) {
        (PortEvidence::Explicit, _) => 1.0,
        (PortEvidence::FrameworkDefault, true) => 0.75,
        (PortEvidence::FrameworkDefault, false) => 0.6,
        (PortEvidence::Missing, true) => 0.4,
        (PortEvidence::Missing, false) => 0.25,
    };
    Confidence::new(value)
}
