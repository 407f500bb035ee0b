use posebake_api_core::ObjectId;
use serde::{Serialize, Serializer};

use crate::error::RebakeError;

/// What happened to one target mesh.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MeshOutcome {
    pub name: String,
    /// Object holding the result; differs from the original when the host recreates objects.
    pub object: ObjectId,
    /// Non-reference keys re-based.
    pub shape_keys: usize,
    pub drivers_relinked: usize,
}

/// Result of a successful run. Warnings are degraded outcomes that left geometry correct.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RebakeReport {
    pub rig: String,
    pub meshes: Vec<MeshOutcome>,
    /// Serialized as their messages.
    #[serde(serialize_with = "messages")]
    pub warnings: Vec<RebakeError>,
}

fn messages<S: Serializer>(errors: &[RebakeError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

impl RebakeReport {
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Applied pose as rest for {} and processed {} meshes",
            self.rig,
            self.meshes.len()
        );
        if !self.warnings.is_empty() {
            s.push_str(&format!(" ({} warnings)", self.warnings.len()));
        }
        s
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn mesh(&self, name: &str) -> Option<&MeshOutcome> {
        self.meshes.iter().find(|m| m.name == name)
    }
}
