//! SceneLink host entry point.
//!
//! Runs the bridge headless against the in-memory mock scene. A real host
//! integration replaces `MockScene` with an adapter over its engine and
//! drains the queue from the engine's main-thread hook instead of this
//! loop; everything else is identical.
//!
//! # Architecture
//!
//! ```text
//! main()                       -- the mutation context
//!  └─ HostConfig::load_or_default
//!  └─ Server::start            -- network thread (accept + framed I/O)
//!  └─ loop
//!       ├─ MainThreadQueue::drain  -- session lifecycle + command dispatch
//!       └─ sync::sync_pass         -- stream live entries back
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use scenelink_host::application::session::Session;
use scenelink_host::application::{dispatch, sync};
use scenelink_host::infrastructure::network::Server;
use scenelink_host::infrastructure::scene::MockScene;
use scenelink_host::infrastructure::scheduler::{HostEvent, MainThreadQueue};
use scenelink_host::infrastructure::storage::HostConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging. Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("SceneLink host starting");

    let config = HostConfig::load_or_default(Path::new("scenelink.toml"));
    let addr = format!("{}:{}", config.network.bind_address, config.network.port).parse()?;

    let queue = Arc::new(MainThreadQueue::new());
    let mut server = Server::new(MainThreadQueue::callbacks(&queue));
    server.start(addr)?;
    info!("listening for drivers on {addr}");

    // ── Ctrl-C handler ─────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    // ── Mutation context main loop ─────────────────────────────────────────────
    let mut scene = MockScene::new();
    let mut session: Option<Session> = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(config.sync.interval_ms));

    while running.load(Ordering::Relaxed) {
        ticker.tick().await;

        for event in queue.drain() {
            match event {
                HostEvent::ConnectionStarted(connection) => {
                    if let Some(stale) = session.take() {
                        warn!("replacing a session that never saw its connection end");
                        stale.end(&mut scene);
                    }
                    session = Some(Session::new(connection));
                    info!("session started");
                }
                HostEvent::Command(msg) => match session.as_mut() {
                    Some(session) => {
                        if let Err(err) = dispatch::apply(&mut scene, session, msg) {
                            error!("command failed: {err}");
                        }
                    }
                    None => warn!("dropping command received outside a session"),
                },
                HostEvent::ConnectionEnded => {
                    if let Some(session) = session.take() {
                        session.end(&mut scene);
                        info!("session ended");
                    }
                }
            }
        }

        if let Some(session) = session.as_mut() {
            sync::sync_pass(&scene, session);
        }
    }

    if let Some(session) = session.take() {
        session.end(&mut scene);
    }
    server.end();
    info!("SceneLink host stopped");
    Ok(())
}
