//! SceneLink driver demo.
//!
//! Connects to a running host, builds a small scene (a cube, a cylinder,
//! and a live transform), prints the frames the host streams back for a few
//! seconds, then clears the scene and disconnects.
//!
//! ```bash
//! scenelink-driver [host:port]      # default 127.0.0.1:8888
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use scenelink_core::domain::identity::{PathKey, SourceKey};
use scenelink_core::protocol::messages::Axis;
use scenelink_core::shm::BufferBroker;
use scenelink_driver::application::commands;
use scenelink_driver::application::events::EventRouter;
use scenelink_driver::infrastructure::network::DriverConnection;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8888".to_string())
        .parse()?;

    let source = SourceKey::new("demo")?;
    let broker = Arc::new(Mutex::new(BufferBroker::new()));
    let mut connection = DriverConnection::new();
    let handle = connection.handle();

    let router = EventRouter::new(Arc::clone(&broker), handle.clone())
        .on_mesh(|frame| {
            info!(
                "mesh {} ({}): {} vertices, {} indices",
                frame.path,
                frame.file_path,
                frame.positions.len(),
                frame.indices.len()
            );
        })
        .on_xform(|frame| {
            info!(
                "xform {} ({}): t={:?} r={:?} s={:?}",
                frame.path, frame.file_path, frame.translation, frame.rotation, frame.scale
            );
        });

    connection.start(addr, router.callbacks())?;
    info!("connected to host at {addr}");

    commands::create_cube(&handle, 2.0, PathKey::from_wire("demo/cube")?, source.clone());
    commands::create_cylinder(
        &handle,
        0.5,
        3.0,
        Axis::Y,
        PathKey::from_wire("demo/pipe")?,
        source.clone(),
    );
    commands::create_mesh(
        &handle,
        &broker,
        &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        &[[0, 1, 2]],
        PathKey::from_wire("demo/tri")?,
        source.clone(),
        true,
    )?;
    commands::set_xform(
        &handle,
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        PathKey::from_wire("demo/cube")?,
        source.clone(),
        true,
    );

    info!("watching live sync for 5 seconds");
    std::thread::sleep(Duration::from_secs(5));

    commands::clear(&handle);
    std::thread::sleep(Duration::from_millis(200));
    connection.end();
    info!("done");
    Ok(())
}
