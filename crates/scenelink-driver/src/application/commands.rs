//! Command constructors: everything a driver can ask the host to do.
//!
//! Small commands are plain message sends. `create_mesh` stages its
//! geometry through the driver's [`BufferBroker`] first, so only segment
//! names and counts cross the socket; the broker keeps the segments alive
//! until the host acknowledges them with `received_buffer`.

use std::io;
use std::sync::Mutex;

use scenelink_core::domain::identity::{PathKey, SourceKey};
use scenelink_core::protocol::messages::{
    Axis, CreateCube, CreateCylinder, CreateMesh, Message, ReceivedBuffer, SetXform,
};
use scenelink_core::shm::BufferBroker;

use crate::infrastructure::network::DriverHandle;

/// Builds (or rebuilds) a mesh entity at `path` from vertex positions and
/// triangles, staging both arrays through shared memory.
///
/// With `sync` set, the host streams the mesh's evaluated geometry back on
/// every sync pass.
///
/// # Errors
///
/// Propagates segment allocation failures; nothing is sent in that case and
/// any half-staged segment is reclaimed.
pub fn create_mesh(
    handle: &DriverHandle,
    broker: &Mutex<BufferBroker>,
    positions: &[[f32; 3]],
    triangles: &[[u32; 3]],
    path: PathKey,
    file_path: SourceKey,
    sync: bool,
) -> io::Result<()> {
    let flat_positions: Vec<f32> = positions.iter().flatten().copied().collect();
    let flat_triangles: Vec<u32> = triangles.iter().flatten().copied().collect();

    let (positions_name, triangles_name) = {
        let mut broker = broker.lock().expect("buffer broker lock poisoned");
        let positions_name = broker.stage_f32(&flat_positions)?;
        let triangles_name = match broker.stage_u32(&flat_triangles) {
            Ok(name) => name,
            Err(err) => {
                if !positions_name.is_empty() {
                    broker.acknowledge_released(&positions_name);
                }
                return Err(err);
            }
        };
        (positions_name, triangles_name)
    };

    handle.send(Message::CreateMesh(CreateMesh {
        positions_name,
        triangles_name,
        vertices_length: positions.len() as u32,
        triangles_length: triangles.len() as u32,
        path,
        file_path,
        sync,
    }));
    Ok(())
}

/// Builds a cube of edge length `size` at `path`.
pub fn create_cube(handle: &DriverHandle, size: f32, path: PathKey, file_path: SourceKey) {
    handle.send(Message::CreateCube(CreateCube {
        size,
        path,
        file_path,
    }));
}

/// Builds a capped cylinder along `axis` at `path`.
pub fn create_cylinder(
    handle: &DriverHandle,
    radius: f32,
    height: f32,
    axis: Axis,
    path: PathKey,
    file_path: SourceKey,
) {
    handle.send(Message::CreateCylinder(CreateCylinder {
        radius,
        height,
        axis,
        path,
        file_path,
    }));
}

/// Sets the transform of the entity at `path`. `rotation` is `(x, y, z, w)`.
pub fn set_xform(
    handle: &DriverHandle,
    translation: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
    path: PathKey,
    file_path: SourceKey,
    sync: bool,
) {
    handle.send(Message::SetXform(SetXform {
        translation,
        rotation,
        scale,
        path,
        file_path,
        sync,
    }));
}

/// Removes everything this session has created on the host.
pub fn clear(handle: &DriverHandle) {
    handle.send(Message::Clear);
}

/// Acknowledges a host-created buffer as consumed and releasable.
///
/// The [`EventRouter`](crate::application::events::EventRouter) does this
/// automatically for buffers it consumes; this is for embedders that route
/// events themselves.
pub fn release_ack(handle: &DriverHandle, name: String) {
    handle.send(Message::ReceivedBuffer(ReceivedBuffer { name }));
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use scenelink_core::shm::{bytes, ShmSegment};
    use tokio::sync::mpsc;

    fn path(wire: &str) -> PathKey {
        PathKey::from_wire(wire).unwrap()
    }

    fn source(wire: &str) -> SourceKey {
        SourceKey::new(wire).unwrap()
    }

    fn bound_handle() -> (DriverHandle, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (DriverHandle::bound(tx), rx)
    }

    #[test]
    fn test_create_cube_sends_the_command() {
        let (handle, mut rx) = bound_handle();
        create_cube(&handle, 2.0, path("a"), source("f1"));

        let msg = rx.try_recv().unwrap();
        let Message::CreateCube(cmd) = msg else {
            panic!("expected create_cube, got {msg:?}");
        };
        assert_eq!(cmd.size, 2.0);
        assert_eq!(cmd.path.wire(), "a");
        assert_eq!(cmd.file_path.as_str(), "f1");
    }

    #[test]
    fn test_create_mesh_stages_geometry_before_sending() {
        let (handle, mut rx) = bound_handle();
        let broker = Mutex::new(BufferBroker::new());

        create_mesh(
            &handle,
            &broker,
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0, 1, 2]],
            path("tri"),
            source("f"),
            true,
        )
        .unwrap();

        let Message::CreateMesh(cmd) = rx.try_recv().unwrap() else {
            panic!("expected create_mesh");
        };
        assert_eq!(cmd.vertices_length, 3);
        assert_eq!(cmd.triangles_length, 1);
        assert!(cmd.sync);

        // The named segments exist, hold the data, and stay outstanding
        // until the host acknowledges them.
        let view = ShmSegment::open(&cmd.positions_name).unwrap();
        assert_eq!(
            bytes::read_f32s(view.as_slice()),
            [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
        let broker = broker.lock().unwrap();
        assert!(broker.is_outstanding(&cmd.positions_name));
        assert!(broker.is_outstanding(&cmd.triangles_name));
    }

    #[test]
    fn test_create_empty_mesh_sends_empty_names() {
        let (handle, mut rx) = bound_handle();
        let broker = Mutex::new(BufferBroker::new());

        create_mesh(&handle, &broker, &[], &[], path("empty"), source("f"), false).unwrap();

        let Message::CreateMesh(cmd) = rx.try_recv().unwrap() else {
            panic!("expected create_mesh");
        };
        assert_eq!(cmd.positions_name, "");
        assert_eq!(cmd.triangles_name, "");
        assert_eq!(cmd.vertices_length, 0);
        assert_eq!(broker.lock().unwrap().outstanding_count(), 0);
    }

    #[test]
    fn test_set_xform_passes_wire_rotation_through() {
        let (handle, mut rx) = bound_handle();
        set_xform(
            &handle,
            [1.0, 2.0, 3.0],
            [0.0, 0.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            path("a"),
            source("f"),
            true,
        );

        let Message::SetXform(cmd) = rx.try_recv().unwrap() else {
            panic!("expected set_xform");
        };
        assert_eq!(cmd.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert!(cmd.sync);
    }

    #[test]
    fn test_clear_and_release_ack() {
        let (handle, mut rx) = bound_handle();
        clear(&handle);
        release_ack(&handle, "sl-x".into());

        assert_eq!(rx.try_recv().unwrap(), Message::Clear);
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::ReceivedBuffer(ReceivedBuffer { name: "sl-x".into() })
        );
    }
}
