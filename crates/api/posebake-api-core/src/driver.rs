//! Drivers: expression bindings that compute a property from other scene data.

use serde::{Deserialize, Serialize};

use crate::data_path::DataPath;
use crate::ids::ObjectId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Reads one property through a data path.
    #[default]
    SingleProp,
    /// Reads a transform channel of an object or bone.
    Transforms,
    RotationDiff,
    LocDiff,
}

/// One input of a driver variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverTarget {
    /// Object the target reads from, if bound.
    pub id: Option<ObjectId>,
    /// Property path on `id` (empty for transform-style variables).
    #[serde(default)]
    pub data_path: String,
    /// Bone name for transform-style variables.
    #[serde(default)]
    pub bone_target: Option<String>,
}

impl DriverTarget {
    pub fn object(id: ObjectId, data_path: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            data_path: data_path.into(),
            bone_target: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverVariable {
    pub name: String,
    #[serde(default)]
    pub kind: VariableKind,
    pub targets: Vec<DriverTarget>,
}

impl DriverVariable {
    pub fn single_prop(name: impl Into<String>, target: DriverTarget) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::SingleProp,
            targets: vec![target],
        }
    }
}

/// A driver animating one property on a mesh's shape-key datablock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Property being driven, e.g. `key_blocks["smile"].value`.
    pub data_path: DataPath,
    pub expression: String,
    #[serde(default)]
    pub variables: Vec<DriverVariable>,
    /// Expression may reference the owning datablock as `self`.
    #[serde(default)]
    pub use_self: bool,
}

impl Driver {
    pub fn new(data_path: DataPath, expression: impl Into<String>) -> Self {
        Self {
            data_path,
            expression: expression.into(),
            variables: Vec::new(),
            use_self: false,
        }
    }

    pub fn with_variable(mut self, variable: DriverVariable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Shape key this driver animates, if it targets a key block.
    pub fn shape_key(&self) -> Option<&str> {
        self.data_path.shape_key()
    }

    /// Every target object referenced by this driver's variables.
    pub fn referenced_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.variables
            .iter()
            .flat_map(|v| v.targets.iter())
            .filter_map(|t| t.id)
    }
}
