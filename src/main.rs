use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

mod auth;
mod config;
mod console;
mod handler;
mod http;
mod logger;
mod server;
mod session;

use server::SignalHandler;

/// How often idle sessions are looked for
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config file path (without extension) from the first argument
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = config::Config::load_from(&config_path)?;

    logger::init(&cfg)?;

    // Create the Tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr, cfg.server.backlog)?;

    let state = Arc::new(config::AppState::new(&cfg)?);
    let active_connections = Arc::new(AtomicUsize::new(0));

    logger::log_server_start(&addr, &cfg, state.console.home());

    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals), Arc::clone(&state.cached_access_log));

    spawn_session_purge(Arc::clone(&state));

    server::start_server_loop(
        listener,
        state,
        active_connections,
        Arc::clone(&signals.shutdown),
    )
    .await;

    logger::log_info("Web console stopped");
    Ok(())
}

/// Periodically drop sessions idle longer than the idle timeout
fn spawn_session_purge(state: Arc<config::AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let purged = state.sessions.purge_expired();
            if purged > 0 {
                logger::log_debug(&format!("[Session] Purged {purged} idle session(s)"));
            }
        }
    });
}
