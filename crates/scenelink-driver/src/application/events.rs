//! Inbound event routing on the driving side.
//!
//! The [`EventRouter`] is the driver's counterpart to the host's command
//! dispatch. It runs on the network thread, so it does no heavy work: it
//! copies pushed geometry out of shared memory into owned frames,
//! acknowledges the consumed segments immediately, and hands the frames to
//! user callbacks. `received_buffer` events release the driver's own staged
//! segments.
//!
//! Frames own their data. The mapped segments never escape into user code,
//! which keeps the release protocol correct by construction: once a
//! callback sees a frame, the buffers behind it are already on their way
//! back to the host.

use std::sync::{Arc, Mutex};

use tracing::warn;

use scenelink_core::domain::identity::{PathKey, SourceKey};
use scenelink_core::protocol::messages::{
    Message, ReceivedBuffer, SyncMesh, SyncXform,
};
use scenelink_core::shm::{bytes, BufferBroker, ShmSegment};

use crate::infrastructure::network::{DriverCallbacks, DriverHandle};

/// One pushed mesh: owned, decoded, ready to use.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFrame {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub path: PathKey,
    pub file_path: SourceKey,
}

/// One pushed transform.
#[derive(Debug, Clone, PartialEq)]
pub struct XformFrame {
    pub translation: [f32; 3],
    /// Unit quaternion in wire order `(x, y, z, w)`.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub path: PathKey,
    pub file_path: SourceKey,
}

type MeshCallback = Arc<dyn Fn(MeshFrame) + Send + Sync>;
type XformCallback = Arc<dyn Fn(XformFrame) + Send + Sync>;

/// Routes decoded host events to user callbacks.
pub struct EventRouter {
    broker: Arc<Mutex<BufferBroker>>,
    handle: DriverHandle,
    on_mesh: Option<MeshCallback>,
    on_xform: Option<XformCallback>,
}

impl EventRouter {
    /// A router over the driver's broker and outbound handle, with no
    /// callbacks registered yet.
    pub fn new(broker: Arc<Mutex<BufferBroker>>, handle: DriverHandle) -> Self {
        Self {
            broker,
            handle,
            on_mesh: None,
            on_xform: None,
        }
    }

    /// Registers the mesh callback.
    pub fn on_mesh(mut self, callback: impl Fn(MeshFrame) + Send + Sync + 'static) -> Self {
        self.on_mesh = Some(Arc::new(callback));
        self
    }

    /// Registers the transform callback.
    pub fn on_xform(mut self, callback: impl Fn(XformFrame) + Send + Sync + 'static) -> Self {
        self.on_xform = Some(Arc::new(callback));
        self
    }

    /// Wraps this router into the connection's callback triple.
    pub fn callbacks(self) -> DriverCallbacks {
        let router = Arc::new(self);
        DriverCallbacks {
            on_event: Arc::new(move |msg| router.route(msg)),
            on_connected: Arc::new(|| {}),
            on_disconnected: Arc::new(|| {}),
        }
    }

    /// Handles one decoded event.
    pub fn route(&self, msg: Message) {
        match msg {
            Message::SyncMesh(event) => self.route_mesh(event),
            Message::SyncXform(event) => self.route_xform(event),
            Message::ReceivedBuffer(ReceivedBuffer { name }) => {
                self.broker
                    .lock()
                    .expect("buffer broker lock poisoned")
                    .acknowledge_released(&name);
            }
            other => {
                warn!(id = other.id(), "ignoring host-bound command received as an event");
            }
        }
    }

    fn route_mesh(&self, event: SyncMesh) {
        let flat = match consume_payload(
            &event.positions_name,
            event.vertices_length as usize * 3,
            bytes::read_f32s,
        ) {
            Ok(flat) => flat,
            Err(err) => {
                warn!(name = %event.positions_name, "dropping sync_mesh: {err}");
                return;
            }
        };
        let positions: Vec<[f32; 3]> = flat.chunks_exact(3).map(|v| [v[0], v[1], v[2]]).collect();

        let indices = match consume_payload(
            &event.indices_name,
            event.indices_length as usize,
            bytes::read_u32s,
        ) {
            Ok(indices) => indices,
            Err(err) => {
                warn!(name = %event.indices_name, "dropping sync_mesh: {err}");
                // The positions segment was consumed; still hand it back.
                self.ack(&event.positions_name);
                return;
            }
        };

        self.ack(&event.positions_name);
        self.ack(&event.indices_name);

        if let Some(callback) = &self.on_mesh {
            callback(MeshFrame {
                positions,
                indices,
                path: event.path,
                file_path: event.file_path,
            });
        }
    }

    fn route_xform(&self, event: SyncXform) {
        if let Some(callback) = &self.on_xform {
            callback(XformFrame {
                translation: event.translation,
                rotation: event.rotation,
                scale: event.scale,
                path: event.path,
                file_path: event.file_path,
            });
        }
    }

    fn ack(&self, name: &str) {
        if !name.is_empty() {
            self.handle.send(Message::ReceivedBuffer(ReceivedBuffer {
                name: name.to_string(),
            }));
        }
    }
}

/// Opens a named segment and reads `elements` typed values out of it; an
/// empty name yields an empty vector.
fn consume_payload<T>(
    name: &str,
    elements: usize,
    read: impl Fn(&[u8]) -> Vec<T>,
) -> std::io::Result<Vec<T>> {
    if name.is_empty() || elements == 0 {
        return Ok(Vec::new());
    }
    let segment = ShmSegment::open(name)?;
    let expected = elements * 4;
    let data = segment.as_slice();
    if data.len() < expected {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("segment holds {} bytes but {expected} are required", data.len()),
        ));
    }
    Ok(read(&data[..expected]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn path(wire: &str) -> PathKey {
        PathKey::from_wire(wire).unwrap()
    }

    fn source(wire: &str) -> SourceKey {
        SourceKey::new(wire).unwrap()
    }

    fn fixture() -> (
        Arc<Mutex<BufferBroker>>,
        DriverHandle,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Mutex::new(BufferBroker::new())),
            DriverHandle::bound(tx),
            rx,
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_sync_mesh_is_copied_out_and_acknowledged() {
        let (broker, handle, mut rx) = fixture();

        // Stage the pushed geometry the way the host's sync pass would.
        let mut host_broker = BufferBroker::new();
        let positions_name = host_broker
            .stage_f32(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
            .unwrap();
        let indices_name = host_broker.stage_u32(&[0, 1, 2]).unwrap();

        let (frame_tx, frame_rx) = std::sync::mpsc::channel();
        let router = EventRouter::new(broker, handle).on_mesh(move |frame| {
            let _ = frame_tx.send(frame);
        });

        router.route(Message::SyncMesh(SyncMesh {
            positions_name: positions_name.clone(),
            indices_name: indices_name.clone(),
            vertices_length: 3,
            indices_length: 3,
            path: path("tri"),
            file_path: source("f"),
        }));

        let frame = frame_rx.try_recv().expect("mesh frame delivered");
        assert_eq!(
            frame.positions,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        );
        assert_eq!(frame.indices, vec![0, 1, 2]);
        assert_eq!(frame.path.wire(), "tri");

        // Both consumed segments were acknowledged back to the host.
        let acks: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|msg| match msg {
                Message::ReceivedBuffer(ReceivedBuffer { name }) => Some(name),
                _ => None,
            })
            .collect();
        assert!(acks.contains(&positions_name));
        assert!(acks.contains(&indices_name));
    }

    #[test]
    fn test_sync_mesh_with_empty_names_delivers_an_empty_frame() {
        let (broker, handle, mut rx) = fixture();
        let (frame_tx, frame_rx) = std::sync::mpsc::channel();
        let router = EventRouter::new(broker, handle).on_mesh(move |frame| {
            let _ = frame_tx.send(frame);
        });

        router.route(Message::SyncMesh(SyncMesh {
            positions_name: String::new(),
            indices_name: String::new(),
            vertices_length: 0,
            indices_length: 0,
            path: path("empty"),
            file_path: source("f"),
        }));

        let frame = frame_rx.try_recv().unwrap();
        assert!(frame.positions.is_empty());
        assert!(frame.indices.is_empty());
        // Nothing to acknowledge.
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_sync_mesh_with_missing_segment_is_dropped() {
        let (broker, handle, mut rx) = fixture();
        let (frame_tx, frame_rx) = std::sync::mpsc::channel::<MeshFrame>();
        let router = EventRouter::new(broker, handle).on_mesh(move |frame| {
            let _ = frame_tx.send(frame);
        });

        router.route(Message::SyncMesh(SyncMesh {
            positions_name: "sl-vanished".into(),
            indices_name: String::new(),
            vertices_length: 3,
            indices_length: 0,
            path: path("tri"),
            file_path: source("f"),
        }));

        assert!(frame_rx.try_recv().is_err());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_sync_xform_reaches_the_callback() {
        let (broker, handle, _rx) = fixture();
        let (frame_tx, frame_rx) = std::sync::mpsc::channel();
        let router = EventRouter::new(broker, handle).on_xform(move |frame| {
            let _ = frame_tx.send(frame);
        });

        router.route(Message::SyncXform(SyncXform {
            translation: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
            path: path("a/b"),
            file_path: source("f"),
        }));

        let frame = frame_rx.try_recv().unwrap();
        assert_eq!(frame.translation, [1.0, 2.0, 3.0]);
        assert_eq!(frame.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(frame.path.wire(), "a/b");
    }

    #[test]
    fn test_received_buffer_releases_a_staged_segment() {
        let (broker, handle, _rx) = fixture();
        let name = broker
            .lock()
            .unwrap()
            .stage_f32(&[1.0, 2.0, 3.0])
            .unwrap();
        let router = EventRouter::new(Arc::clone(&broker), handle);

        router.route(Message::ReceivedBuffer(ReceivedBuffer { name: name.clone() }));
        assert!(!broker.lock().unwrap().is_outstanding(&name));

        // A duplicate release is a logged no-op.
        router.route(Message::ReceivedBuffer(ReceivedBuffer { name }));
    }

    #[test]
    fn test_host_bound_commands_are_ignored() {
        let (broker, handle, mut rx) = fixture();
        let router = EventRouter::new(broker, handle);
        router.route(Message::Clear);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_events_without_callbacks_still_release_buffers() {
        let (broker, handle, mut rx) = fixture();
        let mut host_broker = BufferBroker::new();
        let positions_name = host_broker.stage_f32(&[0.0, 0.0, 0.0]).unwrap();

        let router = EventRouter::new(broker, handle);
        router.route(Message::SyncMesh(SyncMesh {
            positions_name: positions_name.clone(),
            indices_name: String::new(),
            vertices_length: 1,
            indices_length: 0,
            path: path("p"),
            file_path: source("f"),
        }));

        let acks = drain(&mut rx);
        assert_eq!(acks.len(), 1);
        assert_eq!(
            acks[0],
            Message::ReceivedBuffer(ReceivedBuffer {
                name: positions_name
            })
        );
    }
}
