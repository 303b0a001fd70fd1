// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)
// - SIGUSR1: Toggle the access log

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Signal handler state
pub struct SignalHandler {
    /// Shutdown signal (SIGTERM, SIGINT)
    pub shutdown: Arc<Notify>,
    /// Whether shutdown has been requested
    pub shutdown_requested: AtomicBool,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    /// Ask the server loop to stop; a repeated request is ignored
    pub fn request_shutdown(&self, source: &str) {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        logger::log_info(&format!("[SIGNAL] {source} received, shutting down gracefully"));
        // notify_one stores a permit if the loop is not waiting yet
        self.shutdown.notify_one();
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Flip the access log switch, returning the new setting
pub fn toggle_access_log(access_log: &AtomicBool) -> bool {
    !access_log.fetch_xor(true, Ordering::Relaxed)
}

/// Start signal handlers (Unix only)
///
/// | Signal  | Action              |
/// |---------|---------------------|
/// | SIGTERM | Graceful stop       |
/// | SIGINT  | Graceful stop       |
/// | SIGUSR1 | Toggle access log   |
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>, access_log: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if let Err(e) = listen(&handler, &access_log).await {
            logger::log_error(&format!("[SIGNAL] Failed to register signal handlers: {e}"));
        }
    });
}

#[cfg(unix)]
async fn listen(handler: &SignalHandler, access_log: &AtomicBool) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    logger::log_debug(&format!(
        "[SIGNAL] Handlers registered for pid {}: SIGTERM/SIGINT stop, SIGUSR1 toggles access log",
        std::process::id()
    ));

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                handler.request_shutdown("SIGTERM");
                return Ok(());
            }

            _ = sigint.recv() => {
                handler.request_shutdown("SIGINT");
                return Ok(());
            }

            _ = sigusr1.recv() => {
                let enabled = toggle_access_log(access_log);
                logger::log_info(&format!(
                    "[SIGNAL] SIGUSR1 received, access log {}",
                    if enabled { "enabled" } else { "disabled" }
                ));
            }
        }
    }
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>, _access_log: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            handler.request_shutdown("Ctrl+C");
        }
    });
}
