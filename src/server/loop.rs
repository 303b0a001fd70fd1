// Server loop module
// Accepts connections until shutdown, then drains the ones still open

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use super::connection::accept_connection;
use crate::config;
use crate::logger;

/// Poll interval while waiting for connections to close
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept connections until `shutdown` is notified.
///
/// On shutdown the listener is closed, open connections are asked to finish
/// their current request, and the loop waits up to
/// `server.shutdown_grace` seconds for them before returning.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) {
    let (drain_tx, drain_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            drain_rx.clone(),
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = shutdown.notified() => break,
        }
    }

    drop(listener);
    drain_tx.send_replace(true);

    let open = active_connections.load(Ordering::SeqCst);
    if open > 0 {
        logger::log_info(&format!("Waiting for {open} open connection(s) to finish"));
    }
    let grace = Duration::from_secs(state.config.server.shutdown_grace);
    wait_for_drain(&active_connections, grace).await;
}

/// Wait until no connection is open or the grace period elapses
async fn wait_for_drain(active_connections: &AtomicUsize, grace: Duration) {
    let deadline = Instant::now() + grace;
    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            logger::log_info("All connections closed");
            return;
        }
        if Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutdown grace period elapsed with {remaining} connection(s) still open"
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::create_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_state() -> Arc<config::AppState> {
        let mut config = Config::load_from("does-not-exist/webconsole").unwrap();
        config.logging.access_log = false;
        config.server.shutdown_grace = 1;
        Arc::new(config::AppState::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let connections = Arc::new(AtomicUsize::new(0));

        let server = tokio::spawn(start_server_loop(
            listener,
            test_state(),
            Arc::clone(&connections),
            Arc::clone(&shutdown),
        ));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("ok"));

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let open = AtomicUsize::new(1);
        let started = Instant::now();
        wait_for_drain(&open, Duration::from_millis(120)).await;
        assert!(started.elapsed() >= Duration::from_millis(120));
    }
}
