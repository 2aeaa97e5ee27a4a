//! The scene-graph boundary: what the bridge needs from the hosting engine.
//!
//! The bridge never talks to a 3D engine directly. It speaks to this trait,
//! which a host adapter implements over its real data API (a Blender-style
//! engine, a game editor, ...). The in-memory
//! [`MockScene`](crate::infrastructure::scene::MockScene) implements it for
//! tests and headless runs.
//!
//! All methods are called exclusively from the host's mutation context:
//! scene graphs are generally not safe for concurrent mutation, and many
//! hosts require a designated thread.

use thiserror::Error;

use scenelink_core::protocol::messages::Axis;

/// Opaque handle to one scene entity (a mesh object or empty transform
/// node). Owned by the host; the bridge only ever holds the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

/// Opaque handle to one grouping container (e.g. a collection) owning all
/// entities created for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u64);

/// Host-native quaternion, stored `(w, x, y, z)`.
///
/// The wire convention is `(x, y, z, w)`; the reorder happens here, in both
/// directions, and nowhere else. Getting this wrong silently produces
/// almost-right rotations, so the conversion is pinned by tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// From wire order `(x, y, z, w)`.
    pub fn from_wire([x, y, z, w]: [f32; 4]) -> Self {
        Self { w, x, y, z }
    }

    /// To wire order `(x, y, z, w)`.
    pub fn to_wire(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

/// An entity's local transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: Quaternion,
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: Quaternion::IDENTITY,
            scale: [1.0; 3],
        }
    }
}

/// Authored mesh geometry handed to the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

/// Effective (post-deformation) geometry, flattened for transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluatedMesh {
    /// `vertex_count * 3` floats.
    pub positions: Vec<f32>,
    /// `triangle_count * 3` indices.
    pub indices: Vec<u32>,
}

impl EvaluatedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Errors a host adapter can report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),

    #[error("entity {0:?} has no mesh to evaluate")]
    NoMesh(EntityId),
}

/// The scene-mutation API the bridge drives.
///
/// Creation and linking are infallible (hosts hand back handles); writes and
/// evaluation can fail when a handle has gone stale underneath the bridge.
pub trait SceneGraph: Send {
    /// Creates an empty entity with the given name and returns its handle.
    fn create_entity(&mut self, name: &str) -> EntityId;

    /// Removes an entity. Removing an unknown handle is a no-op.
    fn remove_entity(&mut self, id: EntityId);

    /// Links `child` under `parent` in the hierarchy.
    fn set_parent(&mut self, child: EntityId, parent: EntityId);

    /// Creates a grouping container with the given name.
    fn create_container(&mut self, name: &str) -> ContainerId;

    /// Removes a container. The bridge removes member entities first.
    fn remove_container(&mut self, id: ContainerId);

    /// Places an entity into a container.
    fn attach(&mut self, entity: EntityId, container: ContainerId);

    /// Replaces an entity's mesh.
    fn set_mesh(&mut self, id: EntityId, mesh: MeshData) -> Result<(), SceneError>;

    /// Replaces an entity's mesh with a capped cylinder along `axis`.
    ///
    /// Tessellation is a host geometry kernel; the bridge only forwards the
    /// parameters.
    fn set_cylinder(
        &mut self,
        id: EntityId,
        radius: f32,
        height: f32,
        axis: Axis,
    ) -> Result<(), SceneError>;

    /// Sets an entity's local transform.
    fn set_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), SceneError>;

    /// Evaluates the entity's effective geometry (modifiers applied,
    /// triangulated).
    fn evaluated_mesh(&self, id: EntityId) -> Result<EvaluatedMesh, SceneError>;

    /// Evaluates the entity's effective transform.
    fn evaluated_transform(&self, id: EntityId) -> Result<Transform, SceneError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
