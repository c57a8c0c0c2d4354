//! Filesystem scanner inferring services from project manifests.

mod detectors;
mod heuristics;

use crate::discovery::{
    domain::{CandidateSource, DiscoveryError, DiscoveryResult, ScanError, ServiceCandidate},
    ports::{Discovery, DiscoverySource},
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use detectors::{Detector, DirectoryListing};
use std::collections::BTreeSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory names pruned from every walk: version control metadata,
/// dependency caches, and build output.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
    "dist",
    "build",
    ".next",
    "vendor",
];

/// Default maximum directory depth below each root.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Walks scan roots and classifies directories as service candidates.
#[derive(Debug, Clone)]
pub struct ManifestScanner {
    roots: Vec<Utf8PathBuf>,
    exclude_dirs: BTreeSet<String>,
    max_depth: usize,
}

impl ManifestScanner {
    /// Creates a scanner over `roots` with the default exclusions.
    #[must_use]
    pub fn new<P>(roots: impl IntoIterator<Item = P>) -> Self
    where
        P: Into<Utf8PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            exclude_dirs: DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Replaces the excluded directory names.
    #[must_use]
    pub fn with_exclude_dirs<S>(mut self, names: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        self.exclude_dirs = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the maximum depth below each root.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the configured roots.
    #[must_use]
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    /// Scans every root.
    ///
    /// Never fails as a whole: unreadable directories and malformed
    /// manifests are reported in [`Discovery::issues`] and the walk moves
    /// on. Each directory yields at most one candidate.
    #[must_use]
    pub fn scan(&self) -> Discovery {
        let mut outcome = Discovery::default();
        for root in &self.roots {
            self.scan_root(root, &mut outcome);
        }
        debug!(
            candidates = outcome.candidates.len(),
            issues = outcome.issues.len(),
            "manifest scan finished"
        );
        outcome
    }

    fn scan_root(&self, root: &Utf8Path, outcome: &mut Discovery) {
        if !root.is_dir() {
            warn!(root = %root, "scan root is missing");
            outcome.issues.push(ScanError::MissingRoot {
                path: root.to_owned(),
            });
            return;
        }
        let root = root
            .canonicalize_utf8()
            .unwrap_or_else(|_| root.to_owned());

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .max_depth(self.max_depth)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.exclude_dirs.contains(name))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map_or_else(|| root.to_string(), |path| path.display().to_string());
                    let source = std::io::Error::other(err.to_string());
                    warn!(path = %path, error = %source, "cannot walk directory");
                    outcome.issues.push(ScanError::unreadable(path, source));
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(directory) = Utf8Path::from_path(entry.path()) else {
                outcome
                    .issues
                    .push(ScanError::NonUtf8Path(entry.path().display().to_string()));
                continue;
            };

            match scan_directory(directory) {
                Ok(Some(candidate)) => outcome.candidates.push(candidate),
                Ok(None) => {}
                Err(issue) => {
                    warn!(directory = %directory, error = %issue, "skipping directory");
                    outcome.issues.push(issue);
                }
            }
        }
    }
}

/// Scans `roots`, pruning directories named in `exclude_dirs`.
#[must_use]
pub fn scan(roots: &[Utf8PathBuf], exclude_dirs: &[String]) -> Discovery {
    ManifestScanner::new(roots.iter().cloned())
        .with_exclude_dirs(exclude_dirs.iter().cloned())
        .scan()
}

fn scan_directory(directory: &Utf8Path) -> Result<Option<ServiceCandidate>, ScanError> {
    let listing = DirectoryListing::read(directory)?;
    match Detector::PRIORITY
        .into_iter()
        .find(|detector| detector.matches(&listing))
    {
        Some(detector) => detector.detect(&listing),
        None => Ok(None),
    }
}

#[async_trait]
impl DiscoverySource for ManifestScanner {
    fn source(&self) -> CandidateSource {
        CandidateSource::Manifest
    }

    async fn discover(&self) -> DiscoveryResult<Discovery> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .map_err(DiscoveryError::unavailable)
    }
}
