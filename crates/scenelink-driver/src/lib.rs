//! scenelink-driver library entry point.
//!
//! The driving side of the bridge: connect to a host, send build commands,
//! and receive live mesh/transform sync.
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use scenelink_core::domain::identity::{PathKey, SourceKey};
//! use scenelink_core::shm::BufferBroker;
//! use scenelink_driver::application::commands;
//! use scenelink_driver::application::events::EventRouter;
//! use scenelink_driver::infrastructure::network::DriverConnection;
//!
//! let broker = Arc::new(Mutex::new(BufferBroker::new()));
//! let mut connection = DriverConnection::new();
//! let handle = connection.handle();
//!
//! let router = EventRouter::new(Arc::clone(&broker), handle.clone())
//!     .on_xform(|frame| println!("{:?} moved to {:?}", frame.path, frame.translation));
//! connection
//!     .start("127.0.0.1:8888".parse().unwrap(), router.callbacks())
//!     .unwrap();
//!
//! commands::create_cube(
//!     &handle,
//!     2.0,
//!     PathKey::from_wire("a").unwrap(),
//!     SourceKey::new("demo").unwrap(),
//! );
//! connection.end();
//! ```

pub mod application;
pub mod infrastructure;
