//! Scene-graph implementations.
//!
//! Real host adapters (a Blender add-on, an editor plugin) live with their
//! engines, not in this repo. The in-memory [`MockScene`] implements the
//! full [`SceneGraph`](crate::application::scene::SceneGraph) boundary so
//! the bridge is testable and runnable headless.

pub mod mock;

pub use mock::MockScene;
