//! Per-directory service detectors.
//!
//! Detectors are tried in [`Detector::PRIORITY`] order and the first one
//! whose marker files are present decides the directory's candidate.

use super::heuristics::{self, PortEvidence};
use crate::discovery::domain::{CandidateSource, ScanError, ServiceCandidate, ServiceKind};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const CONTAINER_DESCRIPTORS: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
    "Dockerfile",
];
const NODE_MANIFEST: &str = "package.json";
const PYTHON_MANIFESTS: &[&str] = &[
    "pyproject.toml",
    "requirements.txt",
    "setup.py",
    "setup.cfg",
    "Pipfile",
];
const GENERIC_MANIFESTS: &[&str] = &["go.mod", "Cargo.toml", "Procfile"];

const NODE_ENTRY_FILES: &[&str] = &[
    "server.js",
    "index.js",
    "app.js",
    "main.js",
    "src/server.js",
    "src/index.js",
    "src/main.ts",
    "src/index.ts",
    "server.ts",
    "index.ts",
];
const PYTHON_ENTRY_FILES: &[&str] = &[
    "main.py",
    "app.py",
    "server.py",
    "asgi.py",
    "wsgi.py",
    "manage.py",
    "app/main.py",
    "src/main.py",
];

/// Node frameworks, most specific first: Nest and Next pull in Express.
const NODE_FRAMEWORKS: &[(&str, ServiceKind)] = &[
    ("@nestjs/core", ServiceKind::NodeNest),
    ("next", ServiceKind::NodeNext),
    ("fastify", ServiceKind::NodeFastify),
    ("koa", ServiceKind::NodeKoa),
    ("@hapi/hapi", ServiceKind::NodeHapi),
    ("express", ServiceKind::NodeExpress),
];
const NODE_DEFAULT_PORT: u16 = 3000;

/// Python framework markers with the framework's default port.
const PYTHON_FRAMEWORKS: &[(&str, ServiceKind, u16)] = &[
    ("fastapi", ServiceKind::PythonAsgi, 8000),
    ("starlette", ServiceKind::PythonAsgi, 8000),
    ("litestar", ServiceKind::PythonAsgi, 8000),
    ("quart", ServiceKind::PythonAsgi, 5000),
    ("sanic", ServiceKind::PythonAsgi, 8000),
    ("django", ServiceKind::PythonWsgi, 8000),
    ("flask", ServiceKind::PythonWsgi, 5000),
    ("bottle", ServiceKind::PythonWsgi, 8080),
    ("pyramid", ServiceKind::PythonWsgi, 6543),
    ("falcon", ServiceKind::PythonWsgi, 8000),
    ("uvicorn", ServiceKind::PythonAsgi, 8000),
    ("hypercorn", ServiceKind::PythonAsgi, 8000),
    ("gunicorn", ServiceKind::PythonWsgi, 8000),
];

/// Files present in one directory.
#[derive(Debug)]
pub(super) struct DirectoryListing {
    path: Utf8PathBuf,
    files: BTreeSet<String>,
}

impl DirectoryListing {
    /// Reads the file names of `path`.
    pub(super) fn read(path: &Utf8Path) -> Result<Self, ScanError> {
        let entries = path
            .read_dir_utf8()
            .map_err(|err| ScanError::unreadable(path, err))?;
        let mut files = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|err| ScanError::unreadable(path, err))?;
            if entry.file_type().is_ok_and(|kind| kind.is_file()) {
                files.insert(entry.file_name().to_owned());
            }
        }
        Ok(Self {
            path: path.to_owned(),
            files,
        })
    }

    fn has(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    fn has_any(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has(name))
    }

    fn join(&self, name: &str) -> Utf8PathBuf {
        self.path.join(name)
    }

    fn dir_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.to_string(), ToOwned::to_owned)
    }

    fn read_manifest(&self, name: &str) -> Result<String, ScanError> {
        let path = self.join(name);
        std::fs::read_to_string(&path).map_err(|err| ScanError::unreadable(path, err))
    }

    /// Reads the first existing file among `candidates`, relative to this
    /// directory. Entry sources only feed heuristics, so read failures are
    /// swallowed.
    fn read_first_source(&self, candidates: &[&str]) -> Option<(String, String)> {
        candidates.iter().find_map(|relative| {
            let path = self.join(relative);
            if !path.is_file() {
                return None;
            }
            match std::fs::read_to_string(&path) {
                Ok(source) => Some(((*relative).to_owned(), source)),
                Err(err) => {
                    debug!(path = %path, error = %err, "skipping unreadable entry source");
                    None
                }
            }
        })
    }
}

/// Detection strategies in fixed priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Detector {
    /// Dockerfile or compose file.
    ContainerDescriptor,
    /// `package.json`.
    NodeManifest,
    /// Python dependency list or project file.
    PythonProject,
    /// Go, Rust, or Procfile projects.
    Generic,
}

impl Detector {
    pub(super) const PRIORITY: [Self; 4] = [
        Self::ContainerDescriptor,
        Self::NodeManifest,
        Self::PythonProject,
        Self::Generic,
    ];

    const fn name(self) -> &'static str {
        match self {
            Self::ContainerDescriptor => "container-descriptor",
            Self::NodeManifest => "node-manifest",
            Self::PythonProject => "python-project",
            Self::Generic => "generic",
        }
    }

    pub(super) fn matches(self, listing: &DirectoryListing) -> bool {
        match self {
            Self::ContainerDescriptor => listing.has_any(CONTAINER_DESCRIPTORS),
            Self::NodeManifest => listing.has(NODE_MANIFEST),
            Self::PythonProject => listing.has_any(PYTHON_MANIFESTS),
            Self::Generic => listing.has_any(GENERIC_MANIFESTS),
        }
    }

    /// Builds the directory's candidate. `Ok(None)` means the marker file
    /// exists but does not describe a runnable service.
    pub(super) fn detect(
        self,
        listing: &DirectoryListing,
    ) -> Result<Option<ServiceCandidate>, ScanError> {
        let draft = match self {
            Self::ContainerDescriptor => detect_container_descriptor(listing)?,
            Self::NodeManifest => Some(detect_node(listing)?),
            Self::PythonProject => Some(detect_python(listing)?),
            Self::Generic => detect_generic(listing)?,
        };
        draft
            .map(|draft| draft.finish(listing, self))
            .transpose()
    }
}

/// Signals gathered by a detector before scoring.
#[derive(Debug)]
struct Draft {
    name: String,
    kind: ServiceKind,
    manifest: &'static str,
    entrypoint: Option<String>,
    explicit_port: Option<u16>,
    default_port: Option<u16>,
    health_route: Option<String>,
    metadata: BTreeMap<String, String>,
}

impl Draft {
    fn new(name: String, kind: ServiceKind, manifest: &'static str) -> Self {
        Self {
            name,
            kind,
            manifest,
            entrypoint: None,
            explicit_port: None,
            default_port: None,
            health_route: None,
            metadata: BTreeMap::new(),
        }
    }

    fn metadata(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.metadata.insert(key.to_owned(), value.to_owned());
        }
    }

    fn finish(
        self,
        listing: &DirectoryListing,
        detector: Detector,
    ) -> Result<ServiceCandidate, ScanError> {
        let (port, evidence) = match (self.explicit_port, self.default_port) {
            (Some(port), _) => (Some(port), PortEvidence::Explicit),
            (None, Some(port)) => (Some(port), PortEvidence::FrameworkDefault),
            (None, None) => (None, PortEvidence::Missing),
        };
        let confidence = heuristics::confidence(evidence, self.entrypoint.is_some());

        let manifest_path = listing.join(self.manifest);
        let mut candidate = ServiceCandidate::new(
            CandidateSource::Manifest,
            self.name,
            listing.path.as_str(),
        )
        .map_err(|err| ScanError::malformed(manifest_path.clone(), err))?
        .with_kind(self.kind)
        .with_confidence(confidence)
        .with_metadata("manifest", manifest_path.as_str())
        .with_metadata("detector", detector.name())
        .with_metadata_entries(self.metadata);

        if let Some(entrypoint) = self.entrypoint {
            candidate = candidate.with_entrypoint(entrypoint);
        }
        if let Some(port) = port {
            candidate = candidate.with_port(port);
            if let Some(route) = self.health_route {
                candidate = candidate.with_health_endpoint(format!("http://127.0.0.1:{port}{route}"));
            }
        }
        Ok(candidate)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    main: Option<String>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    fn parse(listing: &DirectoryListing) -> Result<Self, ScanError> {
        let raw = listing.read_manifest(NODE_MANIFEST)?;
        serde_json::from_str(&raw).map_err(|err| ScanError::malformed(listing.join(NODE_MANIFEST), err))
    }

    fn framework(&self) -> Option<(&'static str, ServiceKind)> {
        NODE_FRAMEWORKS
            .iter()
            .find(|(dependency, _)| {
                self.dependencies.contains_key(*dependency)
                    || self.dev_dependencies.contains_key(*dependency)
            })
            .map(|(dependency, kind)| (*dependency, kind.clone()))
    }

    fn start_commands(&self) -> impl Iterator<Item = &str> {
        ["start", "dev", "serve"]
            .into_iter()
            .filter_map(|script| self.scripts.get(script).map(String::as_str))
    }
}

fn detect_node(listing: &DirectoryListing) -> Result<Draft, ScanError> {
    let manifest = PackageManifest::parse(listing)?;
    let framework = manifest.framework();
    let start_script = manifest.scripts.get("start");

    let kind = match (&framework, start_script) {
        (Some((_, kind)), _) => kind.clone(),
        (None, Some(_)) => ServiceKind::NodeHttp,
        (None, None) => ServiceKind::Node,
    };
    let name = manifest
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| listing.dir_name());

    let mut draft = Draft::new(name, kind, NODE_MANIFEST);
    draft.entrypoint = manifest.main.clone().or_else(|| start_script.cloned());
    draft.explicit_port = manifest.start_commands().find_map(heuristics::port_from_command);

    let mut entry_files: Vec<&str> = manifest.main.iter().map(String::as_str).collect();
    entry_files.extend_from_slice(NODE_ENTRY_FILES);
    if let Some((_, source)) = listing.read_first_source(&entry_files) {
        draft.explicit_port = draft
            .explicit_port
            .or_else(|| heuristics::port_from_js_source(&source));
        draft.health_route = heuristics::health_route(&source);
    }

    if framework.is_some() {
        draft.default_port = Some(NODE_DEFAULT_PORT);
    }
    draft.metadata("version", manifest.version.as_deref());
    draft.metadata("description", manifest.description.as_deref());
    draft.metadata("framework", framework.as_ref().map(|(dependency, _)| *dependency));
    Ok(draft)
}

fn detect_python(listing: &DirectoryListing) -> Result<Draft, ScanError> {
    let mut project_name = None;
    let mut project_version = None;
    let mut dependency_text = String::new();

    for manifest in PYTHON_MANIFESTS {
        if !listing.has(manifest) {
            continue;
        }
        let raw = listing.read_manifest(manifest)?;
        if *manifest == "pyproject.toml" {
            let document: toml::Table = raw
                .parse()
                .map_err(|err| ScanError::malformed(listing.join(manifest), err))?;
            project_name = pyproject_field(&document, "name");
            project_version = pyproject_field(&document, "version");
        }
        dependency_text.push_str(&raw);
        dependency_text.push('\n');
    }

    let tokens = dependency_tokens(&dependency_text);
    let framework = PYTHON_FRAMEWORKS
        .iter()
        .find(|(marker, _, _)| tokens.contains(*marker));
    let kind = framework.map_or(ServiceKind::Python, |(_, kind, _)| kind.clone());
    let manifest = PYTHON_MANIFESTS
        .iter()
        .find(|manifest| listing.has(manifest))
        .copied()
        .unwrap_or("pyproject.toml");

    let name = project_name.unwrap_or_else(|| listing.dir_name());
    let mut draft = Draft::new(name, kind, manifest);
    if let Some((entry, source)) = listing.read_first_source(PYTHON_ENTRY_FILES) {
        draft.explicit_port = heuristics::port_from_python_source(&source);
        draft.health_route = heuristics::health_route(&source);
        draft.entrypoint = Some(entry);
    }
    draft.default_port = framework.map(|(_, _, port)| *port);
    draft.metadata("version", project_version.as_deref());
    draft.metadata("framework", framework.map(|(marker, _, _)| *marker));
    Ok(draft)
}

fn pyproject_field(document: &toml::Table, field: &str) -> Option<String> {
    let project = document.get("project").and_then(toml::Value::as_table);
    let poetry = document
        .get("tool")
        .and_then(toml::Value::as_table)
        .and_then(|tool| tool.get("poetry"))
        .and_then(toml::Value::as_table);
    project
        .into_iter()
        .chain(poetry)
        .find_map(|table| table.get(field).and_then(toml::Value::as_str))
        .map(ToOwned::to_owned)
}

/// Lowercased identifier-like tokens, so `fastapi[all]>=0.110` yields
/// `fastapi`.
fn dependency_tokens(text: &str) -> BTreeSet<String> {
    text.to_ascii_lowercase()
        .split(|character: char| {
            !(character.is_ascii_alphanumeric() || character == '_' || character == '-')
        })
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn detect_container_descriptor(listing: &DirectoryListing) -> Result<Option<Draft>, ScanError> {
    let compose = CONTAINER_DESCRIPTORS
        .iter()
        .copied()
        .filter(|name| *name != "Dockerfile")
        .find(|name| listing.has(name));
    let dockerfile = listing.has("Dockerfile").then_some("Dockerfile");
    let Some(manifest) = compose.or(dockerfile) else {
        return Ok(None);
    };

    let kind = if compose.is_some() {
        ServiceKind::DockerCompose
    } else {
        ServiceKind::Dockerfile
    };
    let name = sibling_package_name(listing).unwrap_or_else(|| listing.dir_name());
    let mut draft = Draft::new(name, kind, manifest);

    if let Some(compose) = compose {
        let raw = listing.read_manifest(compose)?;
        draft.explicit_port = heuristics::port_from_compose(&raw);
    }
    if let Some(dockerfile) = dockerfile {
        let raw = listing.read_manifest(dockerfile)?;
        draft.explicit_port = draft
            .explicit_port
            .or_else(|| heuristics::port_from_dockerfile(&raw));
        draft.entrypoint = dockerfile_command(&raw);
    }
    Ok(Some(draft))
}

fn sibling_package_name(listing: &DirectoryListing) -> Option<String> {
    if !listing.has(NODE_MANIFEST) {
        return None;
    }
    PackageManifest::parse(listing)
        .ok()
        .and_then(|manifest| manifest.name)
        .filter(|name| !name.trim().is_empty())
}

fn dockerfile_command(dockerfile: &str) -> Option<String> {
    dockerfile
        .lines()
        .rev()
        .map(str::trim)
        .find_map(|line| {
            let upper = line.to_ascii_uppercase();
            ["ENTRYPOINT ", "CMD "]
                .iter()
                .find(|directive| upper.starts_with(*directive))
                .and_then(|directive| line.get(directive.len()..))
        })
        .map(|command| command.trim().to_owned())
        .filter(|command| !command.is_empty())
}

fn detect_generic(listing: &DirectoryListing) -> Result<Option<Draft>, ScanError> {
    if listing.has("go.mod") {
        return detect_go(listing).map(Some);
    }
    if listing.has("Cargo.toml") {
        return detect_rust(listing);
    }
    if listing.has("Procfile") {
        return detect_procfile(listing);
    }
    Ok(None)
}

fn detect_go(listing: &DirectoryListing) -> Result<Draft, ScanError> {
    let raw = listing.read_manifest("go.mod")?;
    let module = raw
        .lines()
        .find_map(|line| line.trim().strip_prefix("module "))
        .map(str::trim)
        .ok_or_else(|| ScanError::malformed(listing.join("go.mod"), "missing module directive"))?;
    let name = module
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map_or_else(|| listing.dir_name(), ToOwned::to_owned);

    let mut draft = Draft::new(name, ServiceKind::Go, "go.mod");
    draft.metadata("module", Some(module));
    if let Some((entry, source)) = listing.read_first_source(&["main.go", "cmd/server/main.go"]) {
        draft.explicit_port = heuristics::port_from_address_literal(&source);
        draft.health_route = heuristics::health_route(&source);
        draft.entrypoint = Some(entry);
    }
    Ok(draft)
}

fn detect_rust(listing: &DirectoryListing) -> Result<Option<Draft>, ScanError> {
    let raw = listing.read_manifest("Cargo.toml")?;
    let document: toml::Table = raw
        .parse()
        .map_err(|err| ScanError::malformed(listing.join("Cargo.toml"), err))?;
    let Some(package) = document.get("package").and_then(toml::Value::as_table) else {
        debug!(path = %listing.path, "skipping cargo workspace without a package");
        return Ok(None);
    };

    let name = package
        .get("name")
        .and_then(toml::Value::as_str)
        .map_or_else(|| listing.dir_name(), ToOwned::to_owned);
    let mut draft = Draft::new(name, ServiceKind::Rust, "Cargo.toml");
    draft.metadata(
        "version",
        package.get("version").and_then(toml::Value::as_str),
    );
    if let Some((entry, source)) = listing.read_first_source(&["src/main.rs"]) {
        draft.explicit_port = heuristics::port_from_address_literal(&source);
        draft.health_route = heuristics::health_route(&source);
        draft.entrypoint = Some(entry);
    }
    Ok(Some(draft))
}

fn detect_procfile(listing: &DirectoryListing) -> Result<Option<Draft>, ScanError> {
    let raw = listing.read_manifest("Procfile")?;
    let Some(command) = raw
        .lines()
        .find_map(|line| line.trim().strip_prefix("web:"))
        .map(str::trim)
    else {
        return Ok(None);
    };

    let mut draft = Draft::new(listing.dir_name(), ServiceKind::Procfile, "Procfile");
    draft.explicit_port = heuristics::port_from_command(command);
    draft.entrypoint = Some(command.to_owned());
    Ok(Some(draft))
}
