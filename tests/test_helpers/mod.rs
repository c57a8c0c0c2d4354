//! Shared fixtures for integration tests: scratch scan roots and local
//! HTTP endpoints.

use camino::{Utf8Path, Utf8PathBuf};
use mockito::{Mock, Server, ServerGuard, ServerOpts};
use serde_json::json;
use std::io;
use std::ops::{Deref, DerefMut};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A pooled or dedicated mock server.
enum Backend {
    Pooled(ServerGuard),
    Dedicated(Server),
}

impl Deref for Backend {
    type Target = Server;

    fn deref(&self) -> &Server {
        match self {
            Self::Pooled(server) => server,
            Self::Dedicated(server) => server,
        }
    }
}

impl DerefMut for Backend {
    fn deref_mut(&mut self) -> &mut Server {
        match self {
            Self::Pooled(server) => server,
            Self::Dedicated(server) => server,
        }
    }
}

/// A mock HTTP server together with its active route.
pub struct Endpoint {
    server: Backend,
    route: Mock,
    path: &'static str,
}

impl Endpoint {
    /// Serves `status` and `body` for `GET path` on an ephemeral port.
    pub async fn spawn(path: &'static str, status: usize, body: &str) -> Self {
        Self::serve(Backend::Pooled(Server::new_async().await), path, status, body).await
    }

    /// Serves `status` and `body` for `GET path` on `port`.
    pub async fn bind(port: u16, path: &'static str, status: usize, body: &str) -> Self {
        let opts = ServerOpts {
            host: "127.0.0.1",
            port,
            ..ServerOpts::default()
        };
        Self::serve(Backend::Dedicated(Server::new_with_opts_async(opts).await), path, status, body).await
    }

    /// Health endpoint answering `200 ok` on `/health`.
    pub async fn healthy() -> Self {
        Self::spawn("/health", 200, "ok").await
    }

    async fn serve(mut server: Backend, path: &'static str, status: usize, body: &str) -> Self {
        let route = route(&mut server, path, status, body).await;
        Self {
            server,
            route,
            path,
        }
    }

    /// Replaces the response served from now on.
    pub async fn respond(&mut self, status: usize, body: &str) {
        let replacement = route(&mut self.server, self.path, status, body).await;
        std::mem::replace(&mut self.route, replacement)
            .remove_async()
            .await;
    }

    /// Returns the bound port.
    pub fn port(&self) -> u16 {
        self.server.socket_address().port()
    }

    /// Returns the URL of the served route.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.url(), self.path)
    }
}

async fn route(server: &mut Server, path: &str, status: usize, body: &str) -> Mock {
    let content_type = if body.starts_with(['{', '[']) {
        "application/json"
    } else {
        "text/plain"
    };
    server
        .mock("GET", path)
        .with_status(status)
        .with_header("content-type", content_type)
        .with_body(body)
        .create_async()
        .await
}

/// Returns a port with nothing listening on it.
///
/// # Errors
///
/// Returns an error when no ephemeral port can be bound.
pub async fn closed_port() -> io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

/// Binds a listener that never accepts, so requests to it hang until the
/// client gives up. Keep the listener alive while it is needed.
///
/// # Errors
///
/// Returns an error when no ephemeral port can be bound.
pub async fn silent_listener() -> io::Result<(TcpListener, u16)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

/// Temporary scan root.
pub struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    /// Creates an empty scan root.
    ///
    /// The root is canonical, matching the locations the scanner reports
    /// where the temporary directory sits behind a symlink.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created or its path
    /// is not UTF-8.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = Utf8PathBuf::from_path_buf(dir.path().canonicalize()?)
            .map_err(|path| io::Error::other(format!("non UTF-8 path {}", path.display())))?;
        Ok(Self { _dir: dir, root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Writes `contents` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write(&self, relative: &str, contents: &str) -> io::Result<Utf8PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Writes a node service started with an explicit `--port` and returns
    /// its directory, which is the candidate's location.
    ///
    /// # Errors
    ///
    /// Returns an error when the manifest cannot be written.
    pub fn node_service(
        &self,
        directory: &str,
        name: &str,
        version: &str,
        port: u16,
    ) -> io::Result<Utf8PathBuf> {
        self.node_service_with(directory, &json!({ "name": name, "version": version }), port)
    }

    /// Writes a node manifest built from `fields` plus a start script on
    /// `port`, and returns its directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the manifest cannot be written.
    pub fn node_service_with(
        &self,
        directory: &str,
        fields: &serde_json::Value,
        port: u16,
    ) -> io::Result<Utf8PathBuf> {
        let mut manifest = fields.clone();
        if let Some(object) = manifest.as_object_mut() {
            object.insert(
                "scripts".to_owned(),
                json!({ "start": format!("node server.js --port {port}") }),
            );
        }
        self.write(&format!("{directory}/package.json"), &manifest.to_string())?;
        Ok(self.root.join(directory))
    }
}
