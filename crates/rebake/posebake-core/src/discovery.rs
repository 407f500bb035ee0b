//! Rig resolution and discovery of the meshes a rig deforms.

use log::{debug, info};
use posebake_api_core::{Modifier, ObjectId, ObjectKind, SceneHost};

use crate::config::RebakeConfig;
use crate::error::{ConfigurationError, RebakeError};

/// A mesh whose stack carries exactly one armature entry for the rig.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetMesh {
    pub id: ObjectId,
    pub name: String,
    /// Full modifier stack at discovery time.
    pub modifiers: Vec<Modifier>,
    /// Position of the armature entry in `modifiers`.
    pub armature_index: usize,
}

impl TargetMesh {
    /// The armature entry targeting the rig.
    pub fn armature(&self) -> &Modifier {
        &self.modifiers[self.armature_index]
    }

    /// Stack a snapshot deforms through: the armature entry alone. Entries
    /// around it stay on the mesh and keep running after the rebake.
    pub fn bake_stack(&self) -> &[Modifier] {
        std::slice::from_ref(self.armature())
    }

    /// Everything up to and including the armature entry, evaluated once to
    /// catch entries that change the vertex count ahead of the armature.
    pub fn guard_stack(&self) -> &[Modifier] {
        &self.modifiers[..=self.armature_index]
    }

    fn has_deformers_before_armature(&self) -> bool {
        self.modifiers[..self.armature_index]
            .iter()
            .any(Modifier::is_deformer)
    }
}

/// Pick the rig to operate on: the active object when it is an armature,
/// otherwise the scene's target-armature setting.
pub fn resolve_rig<H: SceneHost + ?Sized>(host: &H) -> Result<(ObjectId, String), RebakeError> {
    if let Some(active) = host.editor_state().active {
        if host.object_kind(active)? == ObjectKind::Armature {
            return Ok((active, host.object_name(active)?));
        }
    }
    match host.target_armature() {
        Some(id) => {
            let name = host.object_name(id)?;
            if host.object_kind(id)? != ObjectKind::Armature {
                return Err(ConfigurationError::NotAnArmature(name).into());
            }
            Ok((id, name))
        }
        None => Err(ConfigurationError::NoArmature.into()),
    }
}

/// Scan every mesh for armature entries targeting `rig`. Read-only.
pub fn discover_targets<H: SceneHost + ?Sized>(
    host: &H,
    rig: ObjectId,
    config: &RebakeConfig,
) -> Result<Vec<TargetMesh>, RebakeError> {
    let mut targets = Vec::new();
    let mut misordered = Vec::new();

    for id in host.objects() {
        if host.object_kind(id)? != ObjectKind::Mesh {
            continue;
        }
        let modifiers = host.modifiers(id)?;
        let mut hits = modifiers
            .iter()
            .enumerate()
            .filter(|(_, m)| m.targets_rig(rig))
            .map(|(i, _)| i);
        let Some(armature_index) = hits.next() else {
            continue;
        };
        let name = host.object_name(id)?;
        if hits.next().is_some() {
            return Err(ConfigurationError::MultipleArmatureModifiers { mesh: name }.into());
        }

        let target = TargetMesh {
            id,
            name,
            modifiers,
            armature_index,
        };
        if target.has_deformers_before_armature() {
            misordered.push(target.name.clone());
        }
        debug!(
            "found target mesh {} (armature entry '{}' at {})",
            target.name,
            target.armature().name,
            armature_index
        );
        targets.push(target);
    }

    if config.reject_deformers_before_armature && !misordered.is_empty() {
        return Err(ConfigurationError::DeformersBeforeArmature { meshes: misordered }.into());
    }
    if targets.is_empty() {
        return Err(ConfigurationError::NoAffectedMeshes.into());
    }
    info!("found {} meshes to process", targets.len());
    Ok(targets)
}
