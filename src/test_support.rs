//! Local sockets for adapter tests that canned HTTP responses cannot cover.

use tokio::net::TcpListener;

/// Returns a local port with nothing listening on it.
pub(crate) async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    listener.local_addr().expect("listener address").port()
}

/// Binds a listener that never accepts, so requests to it hang until the
/// client gives up. Keep the listener alive for the duration of the test.
pub(crate) async fn silent_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind silent listener");
    let port = listener.local_addr().expect("silent address").port();
    (listener, port)
}
