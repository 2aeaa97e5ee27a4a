//! In-memory mock scene graph.
//!
//! # Why a mock scene?
//!
//! A real host scene graph lives inside a running 3D application: it cannot
//! be constructed in a unit test, and its effects cannot be observed from
//! Rust test code. `MockScene` replaces the engine with plain hash maps so
//! tests (and headless runs of the host binary) can assert exactly which
//! entities exist, how they are parented and grouped, and what geometry and
//! transforms were written.
//!
//! The mock applies no deformation: `evaluated_mesh` flattens the authored
//! geometry and `evaluated_transform` returns the authored transform. The
//! cylinder kernel generates a 32-segment capped tube, oriented along the
//! requested axis.

use std::collections::HashMap;

use scenelink_core::protocol::messages::Axis;

use crate::application::scene::{
    ContainerId, EntityId, EvaluatedMesh, MeshData, SceneError, SceneGraph, Transform,
};

const CYLINDER_SEGMENTS: u32 = 32;

/// One recorded entity.
#[derive(Debug, Default)]
pub struct MockEntity {
    pub name: String,
    pub parent: Option<EntityId>,
    pub container: Option<ContainerId>,
    pub mesh: Option<MeshData>,
    pub transform: Transform,
}

/// One recorded grouping container.
#[derive(Debug, Default)]
pub struct MockContainer {
    pub name: String,
    pub members: Vec<EntityId>,
}

/// An in-memory [`SceneGraph`] that records every operation.
#[derive(Debug, Default)]
pub struct MockScene {
    next_id: u64,
    entities: HashMap<EntityId, MockEntity>,
    containers: HashMap<ContainerId, MockContainer>,
}

impl MockScene {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Inspection helpers for tests and embedders ────────────────────────

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn name_of(&self, id: EntityId) -> Option<&str> {
        self.entities.get(&id).map(|e| e.name.as_str())
    }

    pub fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.entities.get(&id).and_then(|e| e.parent)
    }

    pub fn container_of(&self, id: EntityId) -> Option<ContainerId> {
        self.entities.get(&id).and_then(|e| e.container)
    }

    pub fn container_name(&self, id: ContainerId) -> Option<&str> {
        self.containers.get(&id).map(|c| c.name.as_str())
    }

    pub fn mesh_of(&self, id: EntityId) -> Option<&MeshData> {
        self.entities.get(&id).and_then(|e| e.mesh.as_ref())
    }

    pub fn transform_of(&self, id: EntityId) -> Option<&Transform> {
        self.entities.get(&id).map(|e| &e.transform)
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl SceneGraph for MockScene {
    fn create_entity(&mut self, name: &str) -> EntityId {
        let id = EntityId(self.next());
        self.entities.insert(
            id,
            MockEntity {
                name: name.to_string(),
                ..MockEntity::default()
            },
        );
        id
    }

    fn remove_entity(&mut self, id: EntityId) {
        if self.entities.remove(&id).is_none() {
            return;
        }
        for entity in self.entities.values_mut() {
            if entity.parent == Some(id) {
                entity.parent = None;
            }
        }
        for container in self.containers.values_mut() {
            container.members.retain(|member| *member != id);
        }
    }

    fn set_parent(&mut self, child: EntityId, parent: EntityId) {
        if let Some(entity) = self.entities.get_mut(&child) {
            entity.parent = Some(parent);
        }
    }

    fn create_container(&mut self, name: &str) -> ContainerId {
        let id = ContainerId(self.next());
        self.containers.insert(
            id,
            MockContainer {
                name: name.to_string(),
                members: Vec::new(),
            },
        );
        id
    }

    fn remove_container(&mut self, id: ContainerId) {
        self.containers.remove(&id);
    }

    fn attach(&mut self, entity: EntityId, container: ContainerId) {
        if let Some(record) = self.entities.get_mut(&entity) {
            record.container = Some(container);
        }
        if let Some(record) = self.containers.get_mut(&container) {
            record.members.push(entity);
        }
    }

    fn set_mesh(&mut self, id: EntityId, mesh: MeshData) -> Result<(), SceneError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SceneError::UnknownEntity(id))?;
        entity.mesh = Some(mesh);
        Ok(())
    }

    fn set_cylinder(
        &mut self,
        id: EntityId,
        radius: f32,
        height: f32,
        axis: Axis,
    ) -> Result<(), SceneError> {
        self.set_mesh(id, cylinder_mesh(radius, height, axis))
    }

    fn set_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), SceneError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SceneError::UnknownEntity(id))?;
        entity.transform = transform;
        Ok(())
    }

    fn evaluated_mesh(&self, id: EntityId) -> Result<EvaluatedMesh, SceneError> {
        let entity = self.entities.get(&id).ok_or(SceneError::UnknownEntity(id))?;
        let mesh = entity.mesh.as_ref().ok_or(SceneError::NoMesh(id))?;
        Ok(EvaluatedMesh {
            positions: mesh.positions.iter().flatten().copied().collect(),
            indices: mesh.triangles.iter().flatten().copied().collect(),
        })
    }

    fn evaluated_transform(&self, id: EntityId) -> Result<Transform, SceneError> {
        self.entities
            .get(&id)
            .map(|e| e.transform)
            .ok_or(SceneError::UnknownEntity(id))
    }
}

/// A capped tube along `axis`: two 32-point rings, two cap centers.
///
/// Generated along Z, then swizzled per axis: X is a +90° turn about Y,
/// Y is a -90° turn about X.
fn cylinder_mesh(radius: f32, height: f32, axis: Axis) -> MeshData {
    let segments = CYLINDER_SEGMENTS;
    let half = height / 2.0;

    let orient = |[x, y, z]: [f32; 3]| -> [f32; 3] {
        match axis {
            Axis::Z => [x, y, z],
            Axis::X => [z, y, -x],
            Axis::Y => [x, z, -y],
        }
    };

    let mut positions = Vec::with_capacity(segments as usize * 2 + 2);
    for ring in [-half, half] {
        for i in 0..segments {
            let theta = std::f32::consts::TAU * i as f32 / segments as f32;
            positions.push(orient([radius * theta.cos(), radius * theta.sin(), ring]));
        }
    }
    let bottom_center = positions.len() as u32;
    positions.push(orient([0.0, 0.0, -half]));
    let top_center = positions.len() as u32;
    positions.push(orient([0.0, 0.0, half]));

    let mut triangles = Vec::with_capacity(segments as usize * 4);
    for i in 0..segments {
        let j = (i + 1) % segments;
        let (b_i, b_j) = (i, j);
        let (t_i, t_j) = (segments + i, segments + j);
        // Side quad split into two triangles.
        triangles.push([b_i, b_j, t_j]);
        triangles.push([b_i, t_j, t_i]);
        // Caps fan out from the centers.
        triangles.push([bottom_center, b_j, b_i]);
        triangles.push([top_center, t_i, t_j]);
    }

    MeshData {
        positions,
        triangles,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scene::Quaternion;

    #[test]
    fn test_create_and_remove_entity() {
        let mut scene = MockScene::new();
        let id = scene.create_entity("node");
        assert_eq!(scene.entity_count(), 1);
        assert_eq!(scene.name_of(id), Some("node"));

        scene.remove_entity(id);
        assert_eq!(scene.entity_count(), 0);
        // Removing again is a no-op.
        scene.remove_entity(id);
    }

    #[test]
    fn test_remove_entity_detaches_children_and_members() {
        let mut scene = MockScene::new();
        let parent = scene.create_entity("p");
        let child = scene.create_entity("c");
        scene.set_parent(child, parent);
        let container = scene.create_container("f");
        scene.attach(parent, container);

        scene.remove_entity(parent);
        assert_eq!(scene.parent_of(child), None);
        assert!(scene.containers[&container].members.is_empty());
    }

    #[test]
    fn test_set_mesh_on_unknown_entity_fails() {
        let mut scene = MockScene::new();
        let err = scene.set_mesh(EntityId(42), MeshData::default()).unwrap_err();
        assert_eq!(err, SceneError::UnknownEntity(EntityId(42)));
    }

    #[test]
    fn test_evaluated_mesh_flattens_authored_geometry() {
        let mut scene = MockScene::new();
        let id = scene.create_entity("tri");
        scene
            .set_mesh(
                id,
                MeshData {
                    positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                    triangles: vec![[0, 1, 2]],
                },
            )
            .unwrap();

        let eval = scene.evaluated_mesh(id).unwrap();
        assert_eq!(eval.positions, [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(eval.indices, [0, 1, 2]);
        assert_eq!(eval.vertex_count(), 3);
    }

    #[test]
    fn test_evaluated_mesh_without_mesh_fails() {
        let mut scene = MockScene::new();
        let id = scene.create_entity("bare");
        assert_eq!(scene.evaluated_mesh(id).unwrap_err(), SceneError::NoMesh(id));
    }

    #[test]
    fn test_transforms_round_trip() {
        let mut scene = MockScene::new();
        let id = scene.create_entity("n");
        let transform = Transform {
            translation: [1.0, 2.0, 3.0],
            rotation: Quaternion::from_wire([0.0, 1.0, 0.0, 0.0]),
            scale: [2.0, 2.0, 2.0],
        };
        scene.set_transform(id, transform).unwrap();
        assert_eq!(scene.evaluated_transform(id).unwrap(), transform);
    }

    #[test]
    fn test_cylinder_has_expected_topology() {
        let mesh = cylinder_mesh(1.0, 2.0, Axis::Z);
        // Two 32-point rings plus two cap centers.
        assert_eq!(mesh.positions.len(), 66);
        // 64 side triangles plus 64 cap triangles.
        assert_eq!(mesh.triangles.len(), 128);
        // Every index is in range.
        assert!(mesh
            .triangles
            .iter()
            .flatten()
            .all(|&i| (i as usize) < mesh.positions.len()));
    }

    #[test]
    fn test_cylinder_axis_orientation() {
        let along = |axis: Axis, pick: fn(&[f32; 3]) -> f32| {
            let mesh = cylinder_mesh(1.0, 4.0, axis);
            mesh.positions
                .iter()
                .map(pick)
                .fold(f32::NEG_INFINITY, f32::max)
        };
        // The tube's long extent (±2) lies on the requested axis.
        assert_eq!(along(Axis::Z, |p| p[2]), 2.0);
        assert_eq!(along(Axis::X, |p| p[0]), 2.0);
        assert_eq!(along(Axis::Y, |p| p[1]), 2.0);
    }

    #[test]
    fn test_cylinder_radius_is_respected() {
        let mesh = cylinder_mesh(0.5, 2.0, Axis::Z);
        let max_radial = mesh
            .positions
            .iter()
            .map(|p| (p[0] * p[0] + p[1] * p[1]).sqrt())
            .fold(f32::NEG_INFINITY, f32::max);
        assert!((max_radial - 0.5).abs() < 1e-5);
    }
}
