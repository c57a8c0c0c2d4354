//! Directory of JSON documents, one per registered service.

use crate::registry::{
    domain::{RegisteredService, ServiceId},
    ports::{RegistryPersistence, RegistryPersistenceError, RegistryPersistenceResult},
};
use async_trait::async_trait;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, warn};

const DOCUMENT_SUFFIX: &str = ".json";
const TEMP_SUFFIX: &str = ".json.tmp";

/// Persistence writing `<id>.json` files inside one capability directory.
///
/// Writes go to a temporary file renamed over the target, so a crash never
/// leaves a half-written document behind. Documents that cannot be read or
/// decoded are skipped on load; the service is rediscovered on the next
/// cycle and its document rewritten.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    dir: Arc<Dir>,
}

impl JsonFilePersistence {
    /// Opens `path`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryPersistenceError::Persistence`] when the directory
    /// cannot be created or opened.
    pub fn open(path: &Utf8Path) -> RegistryPersistenceResult<Self> {
        Dir::create_ambient_dir_all(path, ambient_authority())
            .map_err(RegistryPersistenceError::persistence)?;
        let dir = Dir::open_ambient_dir(path, ambient_authority())
            .map_err(RegistryPersistenceError::persistence)?;
        Ok(Self::from_dir(dir))
    }

    /// Wraps an already opened directory.
    #[must_use]
    pub fn from_dir(dir: Dir) -> Self {
        Self { dir: Arc::new(dir) }
    }

    async fn run_blocking<F, T>(&self, operation: F) -> RegistryPersistenceResult<T>
    where
        F: FnOnce(&Dir) -> RegistryPersistenceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || operation(&dir))
            .await
            .map_err(RegistryPersistenceError::persistence)?
    }
}

fn document_name(service_id: &ServiceId) -> String {
    format!("{service_id}{DOCUMENT_SUFFIX}")
}

fn read_all(dir: &Dir) -> RegistryPersistenceResult<Vec<RegisteredService>> {
    let mut services = Vec::new();
    for entry in dir
        .entries()
        .map_err(RegistryPersistenceError::persistence)?
    {
        let file_name = match entry.and_then(|found| found.file_name()) {
            Ok(file_name) => file_name,
            Err(err) => {
                warn!(error = %err, "skipping unreadable registry entry");
                continue;
            }
        };
        if !file_name.ends_with(DOCUMENT_SUFFIX) {
            continue;
        }
        match read_document(dir, &file_name) {
            Ok(service) => services.push(service),
            Err(err) => warn!(document = %file_name, error = %err, "skipping persisted service"),
        }
    }
    Ok(services)
}

fn read_document(dir: &Dir, file_name: &str) -> RegistryPersistenceResult<RegisteredService> {
    let document = dir
        .read_to_string(file_name)
        .map_err(RegistryPersistenceError::persistence)?;
    serde_json::from_str(&document).map_err(RegistryPersistenceError::invalid_persisted_data)
}

#[async_trait]
impl RegistryPersistence for JsonFilePersistence {
    async fn load_all(&self) -> RegistryPersistenceResult<Vec<RegisteredService>> {
        let services = self.run_blocking(read_all).await?;
        debug!(count = services.len(), "loaded persisted services");
        Ok(services)
    }

    async fn save(&self, service: &RegisteredService) -> RegistryPersistenceResult<()> {
        let document =
            serde_json::to_vec_pretty(service).map_err(RegistryPersistenceError::persistence)?;
        let target = document_name(service.id());
        let temporary = format!("{}{TEMP_SUFFIX}", service.id());
        self.run_blocking(move |dir| {
            dir.write(&temporary, &document)
                .and_then(|()| dir.rename(&temporary, dir, &target))
                .map_err(RegistryPersistenceError::persistence)
        })
        .await
    }

    async fn delete(&self, service_id: &ServiceId) -> RegistryPersistenceResult<()> {
        let target = document_name(service_id);
        self.run_blocking(move |dir| match dir.remove_file(&target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RegistryPersistenceError::persistence(err)),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::discovery::domain::{CandidateSource, ServiceCandidate};
    use crate::health::domain::{HealthProbeResult, ProbeMethod, ProbeOutcome};
    use camino::Utf8PathBuf;
    use mockable::Clock;
    use tempfile::TempDir;

    fn service(name: &str) -> RegisteredService {
        let clock = ManualClock::starting_now();
        let candidate = ServiceCandidate::new(CandidateSource::Manifest, name, format!("/srv/{name}"))
            .expect("valid candidate")
            .with_port(8080)
            .with_metadata("version", "1.0");
        let probe = HealthProbeResult::new("127.0.0.1:8080", ProbeMethod::Tcp, ProbeOutcome::Healthy, clock.utc());
        RegisteredService::register(&candidate, &probe, 3, &clock)
    }

    fn open(temp: &TempDir) -> JsonFilePersistence {
        let path = Utf8PathBuf::from_path_buf(temp.path().join("registry")).expect("utf-8 temp path");
        JsonFilePersistence::open(&path).expect("persistence opens")
    }

    #[tokio::test]
    async fn saved_services_load_back() {
        let temp = TempDir::new().expect("temp dir");
        let persistence = open(&temp);
        let billing = service("billing");
        let ledger = service("ledger");

        persistence.save(&billing).await.expect("save billing");
        persistence.save(&ledger).await.expect("save ledger");
        persistence.save(&billing).await.expect("overwrite billing");

        let mut loaded = persistence.load_all().await.expect("load");
        loaded.sort_by(|left, right| left.name().cmp(right.name()));
        assert_eq!(loaded, vec![billing, ledger]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let temp = TempDir::new().expect("temp dir");
        let persistence = open(&temp);
        let billing = service("billing");
        persistence.save(&billing).await.expect("save");

        persistence.delete(billing.id()).await.expect("delete");
        persistence.delete(billing.id()).await.expect("delete again");

        assert!(persistence.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn corrupt_documents_are_skipped_and_the_rest_load() {
        let temp = TempDir::new().expect("temp dir");
        let persistence = open(&temp);
        let billing = service("billing");
        persistence.save(&billing).await.expect("save billing");
        persistence
            .dir
            .write("deadbeef.json", "{ nope")
            .expect("write corrupt document");

        let loaded = persistence.load_all().await.expect("load");

        assert_eq!(loaded, vec![billing]);
    }

    #[test]
    fn corrupt_document_decodes_to_invalid_data() {
        let temp = TempDir::new().expect("temp dir");
        let persistence = open(&temp);
        persistence
            .dir
            .write("deadbeef.json", "{ nope")
            .expect("write corrupt document");

        let result = read_document(&persistence.dir, "deadbeef.json");

        assert!(matches!(
            result,
            Err(RegistryPersistenceError::InvalidPersistedData(_))
        ));
    }
}
