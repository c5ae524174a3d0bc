use glam::Vec3;

use super::{AssetHandle, EntityId, Pose};
use crate::viewport::Aabb;

/// Kind of a node in a parsed asset's scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Mesh,
    Light,
    Camera,
    Other,
}

/// A node of a parsed asset, as exposed by the engine for traversal
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: Option<String>,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: &str, children: Vec<SceneNode>) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: NodeKind::Group,
            children,
        }
    }

    pub fn mesh(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: NodeKind::Mesh,
            children: Vec::new(),
        }
    }

    /// Mesh itself, or any descendant is a mesh
    pub fn has_geometry(&self) -> bool {
        match self.kind {
            NodeKind::Mesh => true,
            NodeKind::Light | NodeKind::Camera => false,
            NodeKind::Group | NodeKind::Other => self.children.iter().any(|c| c.has_geometry()),
        }
    }

    /// Named, non-empty name
    pub fn label_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Notifications emitted by the engine once an entity's asset settles
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    AssetLoaded { entity: EntityId },
    AssetError { entity: EntityId, message: String },
}

/// Rendering engine capabilities.
///
/// Attribute writes may be applied lazily by the engine (at the next frame
/// boundary), so readers that depend on them must wait a frame.
pub trait SceneEngine {
    /// Start parsing `asset` into a new, hidden entity.
    /// Completion is reported as an [`EngineEvent`].
    fn create_entity(&mut self, asset: &AssetHandle) -> EntityId;
    fn remove_entity(&mut self, entity: EntityId);

    fn set_position(&mut self, entity: EntityId, position: Vec3);
    /// Euler angles in degrees
    fn set_rotation(&mut self, entity: EntityId, rotation: Vec3);
    fn set_scale(&mut self, entity: EntityId, scale: Vec3);

    fn position(&self, entity: EntityId) -> Option<Vec3>;
    fn rotation(&self, entity: EntityId) -> Option<Vec3>;
    fn scale(&self, entity: EntityId) -> Option<Vec3>;

    fn set_visible(&mut self, entity: EntityId, visible: bool);
    fn is_visible(&self, entity: EntityId) -> bool;

    /// Mesh bounds in the entity's own space with its applied scale,
    /// ignoring its position
    fn local_bounds(&self, entity: EntityId) -> Option<Aabb>;

    /// Top-level nodes of the entity's parsed asset
    fn scene_nodes(&self, entity: EntityId) -> Vec<SceneNode>;

    /// Returns false when no node named `node` exists
    fn set_node_visible(&mut self, entity: EntityId, node: &str, visible: bool) -> bool;

    /// Show the placement reticle at `pose`, or hide it
    fn set_reticle(&mut self, pose: Option<&Pose>);
}
