//! The host-service seam.
//!
//! Everything the rebake core knows about a scene goes through [`SceneHost`]:
//! queries over objects, modifier stacks, shape keys and drivers; the
//! deformation oracle ([`SceneHost::evaluate`]); and the mutation primitives
//! used to build working copies and commit results. Adapters for a real
//! content-creation tool implement it; so does the in-memory reference scene.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::Driver;
use crate::ids::ObjectId;
use crate::mesh::{MeshData, ShapeKey};
use crate::modifier::Modifier;
use crate::rig::Rig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Mesh,
    Armature,
    Empty,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    #[default]
    Object,
    Pose,
    Edit,
}

/// Editor state worth putting back after an operation: mode and active object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorState {
    pub mode: InteractionMode,
    pub active: Option<ObjectId>,
}

/// Errors reported by a host while serving a query or mutation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum HostError {
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
    #[error("object '{name}' is not a {expected:?}")]
    WrongKind { name: String, expected: ObjectKind },
    #[error("object '{object}' has no shape key '{key}'")]
    UnknownShapeKey { object: String, key: String },
    #[error("object '{object}' already has a shape key '{key}'")]
    DuplicateShapeKey { object: String, key: String },
    #[error("object '{object}' has no modifier '{modifier}'")]
    UnknownModifier { object: String, modifier: String },
    #[error("object '{object}': expected {expected} vertices, got {actual}")]
    VertexCount {
        object: String,
        expected: usize,
        actual: usize,
    },
    #[error("evaluation of '{object}' failed: {reason}")]
    Evaluation { object: String, reason: String },
}

/// Scene services the rebake core consumes.
///
/// Calls are synchronous and must be fully applied before they return: a call
/// to [`evaluate`](SceneHost::evaluate) reflects every mutation made before it.
pub trait SceneHost {
    // --- scene query -------------------------------------------------------

    /// All objects in the scene, in a stable order.
    fn objects(&self) -> Vec<ObjectId>;
    fn object_name(&self, id: ObjectId) -> Result<String, HostError>;
    fn object_kind(&self, id: ObjectId) -> Result<ObjectKind, HostError>;
    fn find_object(&self, name: &str) -> Option<ObjectId>;
    /// Modifier stack of a mesh, in evaluation order.
    fn modifiers(&self, id: ObjectId) -> Result<Vec<Modifier>, HostError>;
    /// Vertex buffer, key blocks and vertex groups of a mesh.
    fn mesh_data(&self, id: ObjectId) -> Result<MeshData, HostError>;
    /// Drivers living on a mesh's shape-key datablock.
    fn drivers(&self, id: ObjectId) -> Result<Vec<Driver>, HostError>;
    fn rig(&self, id: ObjectId) -> Result<Rig, HostError>;
    fn editor_state(&self) -> EditorState;
    /// Scene-level rig selection used when the active object is not a rig.
    fn target_armature(&self) -> Option<ObjectId>;

    // --- deformation evaluation --------------------------------------------

    /// Evaluate a mesh's vertex positions under its current shape-key state,
    /// modifier stack and the current pose of any rig it references.
    fn evaluate(&mut self, id: ObjectId) -> Result<Vec<Vec3>, HostError>;

    // --- mutation primitives -----------------------------------------------

    /// Duplicate an object together with its own copy of mesh data.
    fn duplicate_object(&mut self, id: ObjectId, name_suffix: &str) -> Result<ObjectId, HostError>;
    fn delete_object(&mut self, id: ObjectId) -> Result<(), HostError>;
    fn set_shape_key_influence(
        &mut self,
        id: ObjectId,
        key: &str,
        value: f32,
        mute: bool,
    ) -> Result<(), HostError>;
    /// Remove every key block (and any driver bound to one).
    fn clear_shape_keys(&mut self, id: ObjectId) -> Result<(), HostError>;
    /// Append a key block; the first one added becomes the reference key.
    fn add_shape_key(&mut self, id: ObjectId, key: ShapeKey) -> Result<(), HostError>;
    fn set_vertices(&mut self, id: ObjectId, vertices: &[Vec3]) -> Result<(), HostError>;
    fn set_modifiers(&mut self, id: ObjectId, modifiers: Vec<Modifier>) -> Result<(), HostError>;
    fn remove_modifier(&mut self, id: ObjectId, name: &str) -> Result<Modifier, HostError>;
    /// Insert at `index`, clamped to the end of the stack.
    fn insert_modifier(
        &mut self,
        id: ObjectId,
        index: usize,
        modifier: Modifier,
    ) -> Result<(), HostError>;
    /// Make `source`'s mesh data the data of `target` and return the object
    /// that now carries it. Hosts may keep `target` or replace it.
    fn commit_mesh_data(&mut self, target: ObjectId, source: ObjectId) -> Result<ObjectId, HostError>;
    /// Replace the rig's rest pose with its current pose.
    fn apply_pose_as_rest(&mut self, rig: ObjectId) -> Result<(), HostError>;
    fn add_driver(&mut self, id: ObjectId, driver: Driver) -> Result<(), HostError>;
    fn clear_drivers(&mut self, id: ObjectId) -> Result<(), HostError>;
    fn restore_editor_state(&mut self, state: &EditorState) -> Result<(), HostError>;
}
