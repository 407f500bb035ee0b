//! Run configuration.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebakeConfig {
    /// Refuse meshes with deforming modifiers ahead of their armature entry.
    pub reject_deformers_before_armature: bool,
    /// Suffix appended to the names of temporary working copies.
    pub working_copy_suffix: String,
    /// Capture and recreate drivers on shape-key properties.
    pub relink_drivers: bool,
    /// Fail the run on a driver that cannot be relinked instead of warning.
    pub driver_relink_errors_are_fatal: bool,
    /// Put the interaction mode and active object back when done.
    pub restore_editor_state: bool,
}

impl Default for RebakeConfig {
    fn default() -> Self {
        Self {
            reject_deformers_before_armature: true,
            working_copy_suffix: "rebake".to_string(),
            relink_drivers: true,
            driver_relink_errors_are_fatal: false,
            restore_editor_state: true,
        }
    }
}

impl RebakeConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
