//! Per-connection session state.
//!
//! A [`Session`] is created when a driver connection starts and torn down
//! when it ends. It owns everything the connection accumulated: the entity
//! and container caches behind the hierarchy resolver, the mesh/transform
//! sync-tracking tables, and the broker holding buffers this side created
//! and the driver has not yet released.

use std::collections::HashMap;

use scenelink_core::domain::identity::{EntityKey, SourceKey};
use scenelink_core::protocol::messages::Message;
use scenelink_core::shm::BufferBroker;
use tracing::debug;

use crate::application::scene::{ContainerId, EntityId, SceneGraph};
use crate::infrastructure::network::ConnectionHandle;

/// One tracked mesh or transform.
#[derive(Debug, Clone, Copy)]
pub struct SyncedEntry {
    pub entity: EntityId,
    /// `true` means the sync engine emits this entry on every pass.
    pub live: bool,
}

/// Everything owned on behalf of one driver connection.
pub struct Session {
    connection: ConnectionHandle,
    pub(crate) entities: HashMap<EntityKey, EntityId>,
    pub(crate) containers: HashMap<SourceKey, ContainerId>,
    pub(crate) meshes: HashMap<EntityKey, SyncedEntry>,
    pub(crate) xforms: HashMap<EntityKey, SyncedEntry>,
    pub(crate) broker: BufferBroker,
}

impl Session {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self {
            connection,
            entities: HashMap::new(),
            containers: HashMap::new(),
            meshes: HashMap::new(),
            xforms: HashMap::new(),
            broker: BufferBroker::new(),
        }
    }

    /// Sends a message to the driver. Non-blocking from any context.
    pub fn send(&self, msg: Message) {
        self.connection.send(msg);
    }

    /// The cached entity for a key, if it has been resolved before.
    pub fn entity(&self, key: &EntityKey) -> Option<EntityId> {
        self.entities.get(key).copied()
    }

    pub fn tracked_mesh(&self, key: &EntityKey) -> Option<SyncedEntry> {
        self.meshes.get(key).copied()
    }

    pub fn tracked_xform(&self, key: &EntityKey) -> Option<SyncedEntry> {
        self.xforms.get(key).copied()
    }

    pub fn broker(&self) -> &BufferBroker {
        &self.broker
    }

    /// Removes every entity, container, and tracked entry this session owns
    /// from the scene.
    ///
    /// Outstanding buffers are untouched: their lifecycle is tied to the
    /// release protocol, not to scene content.
    pub fn clear(&mut self, scene: &mut dyn SceneGraph) {
        self.meshes.clear();
        self.xforms.clear();

        // Children before parents: hosts often refuse to remove an entity
        // that still has children.
        let mut keys: Vec<EntityKey> = self.entities.keys().cloned().collect();
        keys.sort_by_key(|key| std::cmp::Reverse(key.path.depth()));
        for key in keys {
            if let Some(id) = self.entities.remove(&key) {
                scene.remove_entity(id);
            }
        }

        for (_, container) in self.containers.drain() {
            scene.remove_container(container);
        }
        debug!("session scene content cleared");
    }

    /// Tears the session down at connection end: scene content is removed
    /// and every still-outstanding buffer is deallocated.
    pub fn end(mut self, scene: &mut dyn SceneGraph) {
        self.clear(scene);
        let leaked = self.broker.outstanding_count();
        if leaked > 0 {
            debug!(leaked, "releasing buffers never acknowledged by the driver");
        }
        self.broker.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
