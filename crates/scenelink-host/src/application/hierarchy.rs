//! Memoized hierarchy resolution: `(source, path)` → scene entity.
//!
//! Resolution is deterministic and idempotent. The first request for
//! `f:a/b/c` creates entities for `a`, `a/b`, and `a/b/c` (linking each
//! under the previous one and into `f`'s container); every later request
//! for any of those keys returns the cached handle. That idempotence is
//! what lets `set_xform` / `create_mesh` re-target an existing entity
//! instead of spawning duplicates.
//!
//! The walk is iterative and top-down over the path prefixes, from the
//! cached root outward, so deep paths cost no stack.

use scenelink_core::domain::identity::EntityKey;

use crate::application::scene::{EntityId, SceneGraph};
use crate::application::session::Session;

/// Resolves `key` to its scene entity, materializing missing ancestors.
///
/// Entity names are deterministic: path segments joined most-specific-first
/// with `.` (`"c.b.a"` for `a/b/c`), which keeps same-named siblings at
/// different depths from colliding.
pub fn resolve(
    scene: &mut dyn SceneGraph,
    session: &mut Session,
    key: &EntityKey,
) -> EntityId {
    if let Some(id) = session.entities.get(key) {
        return *id;
    }

    let container = match session.containers.get(&key.source) {
        Some(container) => *container,
        None => {
            let container = scene.create_container(key.source.as_str());
            session.containers.insert(key.source.clone(), container);
            container
        }
    };

    let mut parent: Option<EntityId> = None;
    for depth in 1..=key.path.depth() {
        let prefix = key.prefix(depth);
        let id = match session.entities.get(&prefix) {
            Some(id) => *id,
            None => {
                let id = scene.create_entity(&prefix.path.entity_name());
                scene.attach(id, container);
                if let Some(parent) = parent {
                    scene.set_parent(id, parent);
                }
                session.entities.insert(prefix, id);
                id
            }
        };
        parent = Some(id);
    }

    parent.expect("path keys always have at least one segment")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
