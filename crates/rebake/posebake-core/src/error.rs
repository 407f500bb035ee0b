//! Error taxonomy for a rebake run.

use posebake_api_core::HostError;
use thiserror::Error;

/// Precondition violations. Raised before anything in the scene changes.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("no armature selected")]
    NoArmature,
    #[error("object '{0}' is not an armature")]
    NotAnArmature(String),
    #[error("object '{mesh}' has multiple Armature modifiers targeting the rig")]
    MultipleArmatureModifiers { mesh: String },
    #[error("deformation modifiers before Armature modifier detected: {}", .meshes.join(", "))]
    DeformersBeforeArmature { meshes: Vec<String> },
    #[error("no meshes found with an Armature modifier targeting the rig")]
    NoAffectedMeshes,
    #[error("shape key '{key}' on '{mesh}' is relative to unknown key '{relative_key}'")]
    UnknownRelativeKey {
        mesh: String,
        key: String,
        relative_key: String,
    },
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum RebakeError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Evaluated (or stored) vertex count differs from the basis.
    #[error(
        "vertex count mismatch on '{mesh}'{}: expected {expected}, got {actual}; check for modifiers that change vertex count (Decimate, Weld, ...)",
        .shape_key.as_deref().map(|k| format!(" (shape key '{k}')")).unwrap_or_default()
    )]
    TopologyMismatch {
        mesh: String,
        shape_key: Option<String>,
        expected: usize,
        actual: usize,
    },

    #[error("relative shape keys on '{mesh}' form a cycle: {}", .cycle.join(" -> "))]
    CyclicShapeKey { mesh: String, cycle: Vec<String> },

    #[error("driver on '{mesh}' targets shape key '{shape_key}', which no longer exists")]
    DriverRelink { mesh: String, shape_key: String },

    #[error("host: {0}")]
    Host(#[from] HostError),
}

impl RebakeError {
    /// Errors that leave geometry correct and only lose some animation wiring.
    pub fn is_warning_level(&self) -> bool {
        matches!(self, RebakeError::DriverRelink { .. })
    }
}
