//! All SceneLink protocol message types.
//!
//! Every message is a JSON document of the form
//! `{"id": "<message id>", "params": {...}}`; `clear` carries no params.
//! Commands flow driver → host, events flow host → driver, and
//! `received_buffer` flows in both directions (whichever side consumed a
//! shared buffer acknowledges it back to the creator).
//!
//! Bulk geometry never appears in a message. A mesh payload is referenced by
//! the *names* of two shared-memory segments plus element counts; an empty
//! name string means "zero elements, nothing to open".

use serde::{Deserialize, Serialize};

use crate::domain::identity::{PathKey, SourceKey};

/// Axis a primitive is aligned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// `create_mesh`: build (or rebuild) a mesh entity from shared buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMesh {
    /// Name of the segment holding `vertices_length * 3` f32 positions;
    /// empty for a mesh with no vertices.
    pub positions_name: String,
    /// Name of the segment holding `triangles_length * 3` u32 indices;
    /// empty for a mesh with no triangles.
    pub triangles_name: String,
    /// Number of vertices (rows of three floats).
    pub vertices_length: u32,
    /// Number of triangles (rows of three indices).
    pub triangles_length: u32,
    pub path: PathKey,
    pub file_path: SourceKey,
    /// Whether the entity's mesh is streamed back on every sync pass.
    pub sync: bool,
}

/// `create_cube`: build a cube primitive of edge length `size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCube {
    pub size: f32,
    pub path: PathKey,
    pub file_path: SourceKey,
}

/// `create_cylinder`: build a capped cylinder primitive along `axis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCylinder {
    pub radius: f32,
    pub height: f32,
    pub axis: Axis,
    pub path: PathKey,
    pub file_path: SourceKey,
}

/// `set_xform`: set an entity's local transform.
///
/// `rotation` is a unit quaternion in wire order `(x, y, z, w)`. Hosts whose
/// native convention is `(w, x, y, z)` reorder at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetXform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub path: PathKey,
    pub file_path: SourceKey,
    /// Whether the entity's transform is streamed back on every sync pass.
    pub sync: bool,
}

/// `received_buffer`: the consumer of a shared buffer releases it by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedBuffer {
    pub name: String,
}

/// `sync_mesh`: one live mesh entry's evaluated geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMesh {
    /// Segment of `vertices_length * 3` f32 positions; empty if no vertices.
    pub positions_name: String,
    /// Segment of `indices_length` u32 indices; empty if no triangles.
    pub indices_name: String,
    /// Number of vertices.
    pub vertices_length: u32,
    /// Number of flat index elements (triangles × 3).
    pub indices_length: u32,
    pub path: PathKey,
    pub file_path: SourceKey,
}

/// `sync_xform`: one live transform entry's evaluated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncXform {
    pub translation: [f32; 3],
    /// Unit quaternion in wire order `(x, y, z, w)`.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub path: PathKey,
    pub file_path: SourceKey,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All valid SceneLink messages, discriminated by the `id` field.
///
/// An id outside this set fails deserialization, which the read loops treat
/// as a dropped-and-logged frame, never a closed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id", content = "params", rename_all = "snake_case")]
pub enum Message {
    CreateMesh(CreateMesh),
    CreateCube(CreateCube),
    CreateCylinder(CreateCylinder),
    SetXform(SetXform),
    Clear,
    ReceivedBuffer(ReceivedBuffer),
    SyncMesh(SyncMesh),
    SyncXform(SyncXform),
}

impl Message {
    /// Returns the wire id for this message.
    pub fn id(&self) -> &'static str {
        match self {
            Message::CreateMesh(_) => "create_mesh",
            Message::CreateCube(_) => "create_cube",
            Message::CreateCylinder(_) => "create_cylinder",
            Message::SetXform(_) => "set_xform",
            Message::Clear => "clear",
            Message::ReceivedBuffer(_) => "received_buffer",
            Message::SyncMesh(_) => "sync_mesh",
            Message::SyncXform(_) => "sync_xform",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
