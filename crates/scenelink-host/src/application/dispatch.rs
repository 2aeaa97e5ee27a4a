//! Command dispatch: applies one decoded message to the scene and session.
//!
//! Dispatch runs on the mutation context only. The `match` is exhaustive
//! over [`Message`]; an id the protocol does not know never reaches here
//! (it fails decoding and is dropped by the read loop), and events that
//! belong on the driver side are logged and ignored as a desync.

use thiserror::Error;
use tracing::{debug, warn};

use scenelink_core::domain::identity::EntityKey;
use scenelink_core::protocol::messages::{
    CreateCube, CreateCylinder, CreateMesh, Message, ReceivedBuffer, SetXform,
};
use scenelink_core::shm::{bytes, ShmSegment};

use crate::application::hierarchy;
use crate::application::scene::{MeshData, Quaternion, SceneError, SceneGraph, Transform};
use crate::application::session::{Session, SyncedEntry};

/// Errors from applying a single command.
///
/// A failing command fails alone: the session, other entities, and other
/// outstanding buffers are unaffected.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A shared-memory segment could not be opened or was unusable.
    #[error("shared memory error: {0}")]
    Shm(#[from] std::io::Error),

    /// The named segment is smaller than the element counts require.
    #[error("buffer {name:?} holds {actual} bytes but {expected} are required")]
    BufferTooSmall {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The host scene rejected the operation.
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Applies one command to `scene`/`session`.
///
/// # Errors
///
/// Returns [`CommandError`] when the specific command fails; the caller
/// logs it and the session continues.
pub fn apply(
    scene: &mut dyn SceneGraph,
    session: &mut Session,
    msg: Message,
) -> Result<(), CommandError> {
    debug!(id = msg.id(), "applying command");
    match msg {
        Message::CreateMesh(cmd) => create_mesh(scene, session, cmd),
        Message::CreateCube(cmd) => create_cube(scene, session, cmd),
        Message::CreateCylinder(cmd) => create_cylinder(scene, session, cmd),
        Message::SetXform(cmd) => set_xform(scene, session, cmd),
        Message::Clear => {
            session.clear(scene);
            Ok(())
        }
        Message::ReceivedBuffer(ReceivedBuffer { name }) => {
            session.broker.acknowledge_released(&name);
            Ok(())
        }
        Message::SyncMesh(_) | Message::SyncXform(_) => {
            warn!(id = msg.id(), "ignoring driver-bound event received as a command");
            Ok(())
        }
    }
}

fn create_mesh(
    scene: &mut dyn SceneGraph,
    session: &mut Session,
    cmd: CreateMesh,
) -> Result<(), CommandError> {
    let key = EntityKey::new(cmd.file_path, cmd.path);
    let entity = hierarchy::resolve(scene, session, &key);

    let positions = read_positions(&cmd.positions_name, cmd.vertices_length)?;
    let triangles = read_triangles(&cmd.triangles_name, cmd.triangles_length)?;
    scene.set_mesh(
        entity,
        MeshData {
            positions,
            triangles,
        },
    )?;

    session.meshes.insert(
        key,
        SyncedEntry {
            entity,
            live: cmd.sync,
        },
    );

    // The payload segments are consumed; release them back to the driver.
    for name in [cmd.positions_name, cmd.triangles_name] {
        if !name.is_empty() {
            session.send(Message::ReceivedBuffer(ReceivedBuffer { name }));
        }
    }
    Ok(())
}

fn create_cube(
    scene: &mut dyn SceneGraph,
    session: &mut Session,
    cmd: CreateCube,
) -> Result<(), CommandError> {
    let key = EntityKey::new(cmd.file_path, cmd.path);
    let entity = hierarchy::resolve(scene, session, &key);
    scene.set_mesh(entity, cube_mesh(cmd.size))?;
    session.meshes.insert(
        key,
        SyncedEntry {
            entity,
            live: false,
        },
    );
    Ok(())
}

fn create_cylinder(
    scene: &mut dyn SceneGraph,
    session: &mut Session,
    cmd: CreateCylinder,
) -> Result<(), CommandError> {
    let key = EntityKey::new(cmd.file_path, cmd.path);
    let entity = hierarchy::resolve(scene, session, &key);
    scene.set_cylinder(entity, cmd.radius, cmd.height, cmd.axis)?;
    session.meshes.insert(
        key,
        SyncedEntry {
            entity,
            live: false,
        },
    );
    Ok(())
}

fn set_xform(
    scene: &mut dyn SceneGraph,
    session: &mut Session,
    cmd: SetXform,
) -> Result<(), CommandError> {
    let key = EntityKey::new(cmd.file_path, cmd.path);
    let entity = hierarchy::resolve(scene, session, &key);
    scene.set_transform(
        entity,
        Transform {
            translation: cmd.translation,
            rotation: Quaternion::from_wire(cmd.rotation),
            scale: cmd.scale,
        },
    )?;
    session.xforms.insert(
        key,
        SyncedEntry {
            entity,
            live: cmd.sync,
        },
    );
    Ok(())
}

/// Reads `count` vertices (three f32 each) from the named segment; an empty
/// name means an empty mesh.
fn read_positions(name: &str, count: u32) -> Result<Vec<[f32; 3]>, CommandError> {
    let floats = read_payload(name, count as usize * 3, bytes::read_f32s)?;
    Ok(floats.chunks_exact(3).map(|v| [v[0], v[1], v[2]]).collect())
}

/// Reads `count` triangles (three u32 each) from the named segment.
fn read_triangles(name: &str, count: u32) -> Result<Vec<[u32; 3]>, CommandError> {
    let indices = read_payload(name, count as usize * 3, bytes::read_u32s)?;
    Ok(indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect())
}

fn read_payload<T>(
    name: &str,
    elements: usize,
    read: impl Fn(&[u8]) -> Vec<T>,
) -> Result<Vec<T>, CommandError> {
    if name.is_empty() || elements == 0 {
        return Ok(Vec::new());
    }
    let segment = ShmSegment::open(name)?;
    let expected = elements * 4;
    let data = segment.as_slice();
    if data.len() < expected {
        return Err(CommandError::BufferTooSmall {
            name: name.to_string(),
            expected,
            actual: data.len(),
        });
    }
    Ok(read(&data[..expected]))
}

/// The cube primitive: eight corners at ±`size / 2`, six quads split into
/// twelve triangles.
fn cube_mesh(size: f32) -> MeshData {
    let h = size / 2.0;
    let positions = vec![
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
        [-h, -h, h],
        [h, -h, h],
        [h, h, h],
        [-h, h, h],
    ];
    const QUADS: [[u32; 4]; 6] = [
        [0, 1, 2, 3], // bottom
        [4, 5, 6, 7], // top
        [0, 1, 5, 4], // front
        [2, 3, 7, 6], // back
        [1, 2, 6, 5], // right
        [3, 0, 4, 7], // left
    ];
    let triangles = QUADS
        .iter()
        .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
        .collect();
    MeshData {
        positions,
        triangles,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
