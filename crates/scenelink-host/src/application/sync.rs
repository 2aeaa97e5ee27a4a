//! The sync engine: streams live entity state back to the driver.
//!
//! A pass walks every tracked entry with `live == true`, evaluates the
//! entity's effective state, and emits one self-contained event per entry.
//! Mesh geometry is staged through the session's buffer broker (two
//! segments per mesh, sized exactly to the flattened arrays) and only the
//! segment names cross the socket. The driver releases each segment with
//! `received_buffer` after copying it out.
//!
//! Pass cadence is the embedder's concern (the headless binary runs one per
//! tick); nothing in here owns a timer.
//!
//! Events carry no ordering guarantee relative to each other: every event
//! is keyed by entity identity and can be applied in any order.

use thiserror::Error;
use tracing::error;

use scenelink_core::domain::identity::EntityKey;
use scenelink_core::protocol::messages::{Message, SyncMesh, SyncXform};

use crate::application::scene::{EntityId, SceneError, SceneGraph};
use crate::application::session::Session;

/// Why one sync entry could not be emitted.
#[derive(Debug, Error)]
enum SyncEntryError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("failed to stage geometry: {0}")]
    Stage(#[from] std::io::Error),
}

/// Runs one sync pass. Returns the number of events emitted.
///
/// A failing entry (evaluation error, segment allocation failure) is logged
/// and skipped; it never aborts the pass or disturbs other entries.
pub fn sync_pass(scene: &dyn SceneGraph, session: &mut Session) -> usize {
    let mut emitted = 0;

    let live_meshes: Vec<(EntityKey, EntityId)> = session
        .meshes
        .iter()
        .filter(|(_, entry)| entry.live)
        .map(|(key, entry)| (key.clone(), entry.entity))
        .collect();

    for (key, entity) in live_meshes {
        match sync_mesh(scene, session, &key, entity) {
            Ok(msg) => {
                session.send(msg);
                emitted += 1;
            }
            Err(err) => error!(key = %key, "skipping mesh sync entry: {err}"),
        }
    }

    let live_xforms: Vec<(EntityKey, EntityId)> = session
        .xforms
        .iter()
        .filter(|(_, entry)| entry.live)
        .map(|(key, entry)| (key.clone(), entry.entity))
        .collect();

    for (key, entity) in live_xforms {
        match scene.evaluated_transform(entity) {
            Ok(transform) => {
                session.send(Message::SyncXform(SyncXform {
                    translation: transform.translation,
                    rotation: transform.rotation.to_wire(),
                    scale: transform.scale,
                    path: key.path.clone(),
                    file_path: key.source.clone(),
                }));
                emitted += 1;
            }
            Err(err) => error!(key = %key, "skipping transform sync entry: {err}"),
        }
    }

    emitted
}

/// Evaluates one mesh entry and stages its geometry.
fn sync_mesh(
    scene: &dyn SceneGraph,
    session: &mut Session,
    key: &EntityKey,
    entity: EntityId,
) -> Result<Message, SyncEntryError> {
    let mesh = scene.evaluated_mesh(entity)?;

    let positions_name = session.broker.stage_f32(&mesh.positions)?;
    let indices_name = match session.broker.stage_u32(&mesh.indices) {
        Ok(name) => name,
        Err(err) => {
            // Reclaim the half-staged pair; the driver will never see it.
            if !positions_name.is_empty() {
                session.broker.acknowledge_released(&positions_name);
            }
            return Err(SyncEntryError::Stage(err));
        }
    };

    Ok(Message::SyncMesh(SyncMesh {
        positions_name,
        indices_name,
        vertices_length: mesh.vertex_count() as u32,
        indices_length: mesh.index_count() as u32,
        path: key.path.clone(),
        file_path: key.source.clone(),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
