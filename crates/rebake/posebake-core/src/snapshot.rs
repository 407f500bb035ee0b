//! Snapshot capture: evaluate a throwaway copy of a mesh under a chosen
//! shape-key state and read back its vertex positions.

use glam::Vec3;
use log::{trace, warn};
use posebake_api_core::{HostError, Modifier, ObjectId, SceneHost};

use crate::error::RebakeError;

/// A temporary duplicate that is deleted when dropped, on every exit path.
pub struct WorkingCopy<'h, H: SceneHost + ?Sized> {
    host: &'h mut H,
    id: ObjectId,
}

impl<'h, H: SceneHost + ?Sized> WorkingCopy<'h, H> {
    pub fn new(host: &'h mut H, source: ObjectId, suffix: &str) -> Result<Self, HostError> {
        let id = host.duplicate_object(source, suffix)?;
        Ok(Self { host, id })
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn host(&mut self) -> &mut H {
        self.host
    }
}

impl<H: SceneHost + ?Sized> Drop for WorkingCopy<'_, H> {
    fn drop(&mut self) {
        if let Err(e) = self.host.delete_object(self.id) {
            warn!("failed to delete working copy {}: {e}", self.id);
        }
    }
}

/// Which shape keys contribute to a capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvaluationState {
    /// Every key muted: the basis under the modifier stack.
    Basis,
    /// `key` and its relative-key ancestors at full influence, everything else muted.
    Isolated { key: String, ancestors: Vec<String> },
}

impl EvaluationState {
    pub fn isolated(key: impl Into<String>, ancestors: Vec<String>) -> Self {
        EvaluationState::Isolated {
            key: key.into(),
            ancestors,
        }
    }

    fn activates(&self, name: &str) -> bool {
        match self {
            EvaluationState::Basis => false,
            EvaluationState::Isolated { key, ancestors } => {
                key == name || ancestors.iter().any(|a| a == name)
            }
        }
    }

    fn key(&self) -> Option<&str> {
        match self {
            EvaluationState::Basis => None,
            EvaluationState::Isolated { key, .. } => Some(key),
        }
    }
}

/// What to duplicate and how to evaluate it.
#[derive(Clone, Copy, Debug)]
pub struct CaptureTarget<'a> {
    pub mesh: ObjectId,
    pub mesh_name: &'a str,
    /// Modifier stack installed on the copy before evaluation.
    pub stack: &'a [Modifier],
    /// Every non-reference key on the mesh.
    pub key_names: &'a [String],
    /// Vertex count of the basis; evaluated buffers must match it.
    pub vertex_count: usize,
    pub suffix: &'a str,
}

/// Evaluate a working copy of `target` in `state`.
pub fn capture<H: SceneHost + ?Sized>(
    host: &mut H,
    target: &CaptureTarget<'_>,
    state: &EvaluationState,
) -> Result<Vec<Vec3>, RebakeError> {
    let mut copy = WorkingCopy::new(host, target.mesh, target.suffix)?;
    let id = copy.id();
    copy.host().set_modifiers(id, target.stack.to_vec())?;
    for name in target.key_names {
        let on = state.activates(name);
        copy.host()
            .set_shape_key_influence(id, name, if on { 1.0 } else { 0.0 }, !on)?;
    }

    let positions = copy.host().evaluate(id)?;
    trace!(
        "captured {} ({:?}): {} vertices",
        target.mesh_name,
        state,
        positions.len()
    );
    if positions.len() != target.vertex_count {
        return Err(RebakeError::TopologyMismatch {
            mesh: target.mesh_name.to_string(),
            shape_key: state.key().map(str::to_string),
            expected: target.vertex_count,
            actual: positions.len(),
        });
    }
    Ok(positions)
}
