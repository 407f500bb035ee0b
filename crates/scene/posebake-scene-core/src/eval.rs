//! Modifier-stack evaluation for in-memory meshes.

use glam::Vec3;
use posebake_api_core::{HostError, ModifierKind, ObjectId, Rig};

use crate::memory::MeshObject;
use crate::skinning;

/// Evaluate a mesh: blend shape keys, then run enabled modifiers in order.
///
/// `rig_of` resolves an armature entry's target; entries whose rig cannot be
/// resolved have no effect.
pub fn evaluate_mesh<'a>(
    object_name: &str,
    mesh: &MeshObject,
    rig_of: impl Fn(ObjectId) -> Option<&'a Rig>,
) -> Result<Vec<Vec3>, HostError> {
    let data = &mesh.data;
    for key in &data.shape_keys {
        if key.deltas.len() != data.vertex_count() {
            return Err(HostError::Evaluation {
                object: object_name.to_string(),
                reason: format!(
                    "shape key '{}' has {} deltas for {} vertices",
                    key.name,
                    key.deltas.len(),
                    data.vertex_count()
                ),
            });
        }
    }

    let mut positions = data.blended_positions();
    for modifier in mesh.modifiers.iter().filter(|m| m.show_viewport) {
        match &modifier.kind {
            ModifierKind::Armature(settings) => {
                if let Some(rig) = settings.object.and_then(&rig_of) {
                    skinning::deform(&mut positions, data, rig, settings);
                }
            }
            ModifierKind::Displace { offset } => {
                for p in positions.iter_mut() {
                    *p += *offset;
                }
            }
            ModifierKind::Decimate { ratio } => {
                if !ratio.is_finite() || *ratio < 0.0 {
                    return Err(HostError::Evaluation {
                        object: object_name.to_string(),
                        reason: format!("invalid decimate ratio {ratio}"),
                    });
                }
                let keep = ((positions.len() as f32) * ratio.min(1.0)).ceil() as usize;
                positions.truncate(keep);
            }
            ModifierKind::Other { .. } => {}
        }
    }
    Ok(positions)
}
