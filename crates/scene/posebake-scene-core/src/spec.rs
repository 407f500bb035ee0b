//! Serializable scene descriptions.
//!
//! Scene files refer to objects by name; [`MemoryScene::from_spec`] resolves
//! those names to ids once every object exists.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use posebake_api_core::{
    Bone, DataPath, Driver, DriverTarget, DriverVariable, InteractionMode, MeshData, Modifier,
    ModifierKind, ObjectId, Rig, SceneHost, VariableKind,
};

use crate::memory::MemoryScene;

#[derive(Debug, Error)]
pub enum SceneSpecError {
    #[error("scene json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate object name '{0}'")]
    DuplicateName(String),
    #[error("unknown object '{name}' referenced from '{from}'")]
    UnknownObject { name: String, from: String },
    #[error("modifier '{modifier}' on '{object}' names a rig but is not an armature entry")]
    RigOnNonArmature { object: String, modifier: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneSpec {
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default)]
    pub active: Option<String>,
    #[serde(default)]
    pub mode: InteractionMode,
    #[serde(default)]
    pub target_armature: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub name: String,
    #[serde(flatten)]
    pub body: BodySpec,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodySpec {
    Mesh {
        mesh: MeshData,
        #[serde(default)]
        modifiers: Vec<ModifierSpec>,
        #[serde(default)]
        drivers: Vec<DriverSpec>,
    },
    Armature {
        bones: Vec<Bone>,
    },
    Empty,
}

/// A modifier whose armature target (if any) is given by object name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModifierSpec {
    #[serde(default)]
    pub rig: Option<String>,
    #[serde(flatten)]
    pub modifier: Modifier,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverSpec {
    pub data_path: DataPath,
    pub expression: String,
    #[serde(default)]
    pub use_self: bool,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(default)]
    pub kind: VariableKind,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub data_path: String,
    #[serde(default)]
    pub bone_target: Option<String>,
}

impl MemoryScene {
    pub fn from_json(json: &str) -> Result<Self, SceneSpecError> {
        let spec: SceneSpec = serde_json::from_str(json)?;
        Self::from_spec(&spec)
    }

    /// Build a scene in two passes: create every object, then wire modifier,
    /// driver and selection references by name.
    pub fn from_spec(spec: &SceneSpec) -> Result<Self, SceneSpecError> {
        let mut scene = MemoryScene::new();
        for obj in &spec.objects {
            if scene.find_object(&obj.name).is_some() {
                return Err(SceneSpecError::DuplicateName(obj.name.clone()));
            }
            match &obj.body {
                BodySpec::Mesh { mesh, .. } => scene.add_mesh(&obj.name, mesh.clone()),
                BodySpec::Armature { bones } => scene.add_armature(&obj.name, Rig::new(bones.clone())),
                BodySpec::Empty => scene.add_empty(&obj.name),
            };
        }

        for obj in &spec.objects {
            let BodySpec::Mesh {
                modifiers, drivers, ..
            } = &obj.body
            else {
                continue;
            };
            let resolve = |name: &str| -> Result<ObjectId, SceneSpecError> {
                scene
                    .find_object(name)
                    .ok_or_else(|| SceneSpecError::UnknownObject {
                        name: name.to_string(),
                        from: obj.name.clone(),
                    })
            };

            let mut stack = Vec::with_capacity(modifiers.len());
            for m in modifiers {
                let mut modifier = m.modifier.clone();
                if let Some(rig) = &m.rig {
                    match &mut modifier.kind {
                        ModifierKind::Armature(settings) => settings.object = Some(resolve(rig)?),
                        _ => {
                            return Err(SceneSpecError::RigOnNonArmature {
                                object: obj.name.clone(),
                                modifier: modifier.name.clone(),
                            })
                        }
                    }
                }
                stack.push(modifier);
            }

            let mut bound = Vec::with_capacity(drivers.len());
            for d in drivers {
                let mut driver = Driver::new(d.data_path.clone(), d.expression.clone());
                driver.use_self = d.use_self;
                for v in &d.variables {
                    let mut targets = Vec::with_capacity(v.targets.len());
                    for t in &v.targets {
                        targets.push(DriverTarget {
                            id: t.object.as_deref().map(&resolve).transpose()?,
                            data_path: t.data_path.clone(),
                            bone_target: t.bone_target.clone(),
                        });
                    }
                    driver.variables.push(DriverVariable {
                        name: v.name.clone(),
                        kind: v.kind,
                        targets,
                    });
                }
                bound.push(driver);
            }

            let id = resolve(&obj.name)?;
            if let Some(mesh) = scene.mesh_object_mut(id) {
                mesh.modifiers = stack;
                mesh.drivers = bound;
            }
        }

        let lookup = |name: &Option<String>, from: &str| -> Result<Option<ObjectId>, SceneSpecError> {
            match name {
                Some(n) => scene
                    .find_object(n)
                    .map(Some)
                    .ok_or_else(|| SceneSpecError::UnknownObject {
                        name: n.clone(),
                        from: from.to_string(),
                    }),
                None => Ok(None),
            }
        };
        let active = lookup(&spec.active, "active")?;
        let target = lookup(&spec.target_armature, "target_armature")?;
        scene.set_active(active, spec.mode);
        scene.set_target_armature(target);
        Ok(scene)
    }
}
