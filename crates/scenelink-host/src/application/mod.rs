//! Application layer for the hosting side.
//!
//! Everything in here runs on the host's single authoritative mutation
//! context. The network infrastructure never touches the scene graph; it
//! posts decoded commands into a queue that the mutation context drains and
//! feeds through [`dispatch`].
//!
//! # Sub-modules
//!
//! - **`scene`** – The [`SceneGraph`](scene::SceneGraph) boundary trait:
//!   the handful of create/link/write/evaluate operations the bridge needs
//!   from whatever 3D engine is hosting it.
//!
//! - **`session`** – The per-connection aggregate owning the entity cache,
//!   container cache, sync-tracking tables, and outstanding buffers.
//!
//! - **`hierarchy`** – The memoized path resolver that lazily materializes
//!   an entity and its ancestor chain for a `(source, path)` identity.
//!
//! - **`dispatch`** – Applies one decoded command to the scene and session.
//!
//! - **`sync`** – The sync pass: streams every live mesh/transform entry
//!   back to the driver, staging geometry through shared memory.

pub mod dispatch;
pub mod hierarchy;
pub mod scene;
pub mod session;
pub mod sync;
