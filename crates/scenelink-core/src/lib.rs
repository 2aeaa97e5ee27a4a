//! # scenelink-core
//!
//! Shared library for SceneLink containing the wire protocol, the domain
//! identity model, and the shared-memory buffer broker.
//!
//! This crate is used by both the host and driver applications. It has no
//! dependency on any scene engine, UI framework, or listening socket.
//!
//! # Architecture overview (for beginners)
//!
//! SceneLink is a scene-graph bridge: a *driver* process (a DCC tool, a
//! simulation, a build script) constructs and observes a live 3D scene
//! inside a *host* application over a persistent TCP connection. Small JSON
//! control messages travel over the socket; bulk geometry (vertex positions,
//! triangle indices) travels out-of-band through named shared-memory
//! segments so it is never copied through the socket.
//!
//! This crate is the shared foundation. It defines:
//!
//! - **`protocol`** – How bytes travel over the network. Each message is a
//!   JSON document framed by a 4-byte big-endian length prefix. The
//!   `Message` enum covers every command (driver → host) and event
//!   (host → driver).
//!
//! - **`domain`** – The identity model. A scene entity is addressed by a
//!   [`PathKey`] (its position in a logical hierarchy, e.g. `body/arm/hand`)
//!   scoped to a [`SourceKey`] (the originating grouping, e.g. a file).
//!
//! - **`shm`** – Named shared-memory segments and the [`BufferBroker`] that
//!   tracks which segments this side has created and not yet had released by
//!   the peer.

pub mod domain;
pub mod protocol;
pub mod shm;

pub use domain::identity::{EntityKey, IdentityError, PathKey, SourceKey};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::{Axis, Message};
pub use shm::{BufferBroker, ShmSegment};
