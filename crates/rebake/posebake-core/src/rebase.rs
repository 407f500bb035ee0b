//! Shape-key re-basing.
//!
//! Every capture deforms the mesh through its armature entry alone under the
//! current pose. The basis capture `B0` becomes the new vertex buffer; each
//! key's capture `B_K` minus its parent's capture becomes the key's new delta,
//! so replaying the key against the new basis reproduces the posed result once
//! the pose is folded into the rest pose. Other entries are not baked; they
//! keep running on the new basis.

use glam::Vec3;
use log::{debug, info};
use posebake_api_core::{MeshData, ObjectId, SceneHost, ShapeKey};

use crate::discovery::TargetMesh;
use crate::error::RebakeError;
use crate::snapshot::{capture, CaptureTarget, EvaluationState, WorkingCopy};
use crate::topo::RelativeKeyGraph;

/// New geometry for one mesh, ready to be written back.
#[derive(Clone, Debug, PartialEq)]
pub struct RebasedMesh {
    /// Posed basis, the new vertex buffer.
    pub basis: Vec<Vec3>,
    /// Key blocks in declared order (reference key first), metadata untouched.
    pub shape_keys: Vec<ShapeKey>,
}

/// Every key block must carry one delta per basis vertex.
pub fn validate_key_lengths(mesh: &str, data: &MeshData) -> Result<(), RebakeError> {
    for key in &data.shape_keys {
        if key.deltas.len() != data.vertex_count() {
            return Err(RebakeError::TopologyMismatch {
                mesh: mesh.to_string(),
                shape_key: Some(key.name.clone()),
                expected: data.vertex_count(),
                actual: key.deltas.len(),
            });
        }
    }
    Ok(())
}

/// Capture the posed basis and every key, and derive the new deltas.
pub fn rebase_mesh<H: SceneHost + ?Sized>(
    host: &mut H,
    target: &TargetMesh,
    data: &MeshData,
    graph: &RelativeKeyGraph,
    suffix: &str,
) -> Result<RebasedMesh, RebakeError> {
    let keys = data.relative_keys();
    let key_names: Vec<String> = keys.iter().map(|k| k.name.clone()).collect();
    let ctx = CaptureTarget {
        mesh: target.id,
        mesh_name: &target.name,
        stack: target.bake_stack(),
        key_names: &key_names,
        vertex_count: data.vertex_count(),
        suffix,
    };

    if target.armature_index > 0 {
        let guard = CaptureTarget {
            stack: target.guard_stack(),
            ..ctx
        };
        capture(host, &guard, &EvaluationState::Basis)?;
    }
    let b0 = capture(host, &ctx, &EvaluationState::Basis)?;
    if keys.is_empty() {
        info!("no shape keys on {}, folding pose into basis", target.name);
    } else {
        info!("processing {} shape keys: {}", keys.len(), target.name);
    }

    let mut captured: Vec<Option<Vec<Vec3>>> = vec![None; keys.len()];
    let mut rebased: Vec<Option<ShapeKey>> = vec![None; keys.len()];
    for &i in &graph.order {
        let key = &keys[i];
        let ancestors = graph
            .ancestors(i)
            .into_iter()
            .map(|a| key_names[a].clone())
            .collect();
        let posed = capture(host, &ctx, &EvaluationState::isolated(&key.name, ancestors))?;

        let parent = match graph.parent[i] {
            None => &b0,
            Some(p) => captured[p].as_ref().ok_or_else(|| RebakeError::CyclicShapeKey {
                mesh: target.name.clone(),
                cycle: vec![key.name.clone(), key_names[p].clone()],
            })?,
        };
        let deltas: Vec<Vec3> = posed.iter().zip(parent).map(|(k, b)| *k - *b).collect();
        debug!("re-based shape key {} on {}", key.name, target.name);

        rebased[i] = Some(key.with_deltas(deltas));
        captured[i] = Some(posed);
    }

    let mut shape_keys = Vec::with_capacity(data.shape_keys.len());
    if let Some(reference) = data.reference_key() {
        shape_keys.push(reference.with_deltas(vec![Vec3::ZERO; b0.len()]));
    }
    shape_keys.extend(rebased.into_iter().flatten());

    Ok(RebasedMesh {
        basis: b0,
        shape_keys,
    })
}

/// Build the final data on a receiver copy and commit it to the target.
///
/// Once the data is committed the armature entry is taken off the final object
/// so the new basis is not deformed a second time; it is reinstated after the
/// rest pose changes. A failed commit leaves the target's data and stack as
/// they were.
pub fn write_back<H: SceneHost + ?Sized>(
    host: &mut H,
    target: &TargetMesh,
    rebased: RebasedMesh,
    suffix: &str,
) -> Result<ObjectId, RebakeError> {
    let mut receiver = WorkingCopy::new(host, target.id, &format!("{suffix}_receiver"))?;
    let id = receiver.id();
    let h = receiver.host();
    h.clear_shape_keys(id)?;
    h.clear_drivers(id)?;
    h.set_vertices(id, &rebased.basis)?;
    let count = rebased.shape_keys.len();
    for key in rebased.shape_keys {
        h.add_shape_key(id, key)?;
    }

    let final_id = h.commit_mesh_data(target.id, id)?;
    h.remove_modifier(final_id, &target.armature().name)?;
    debug!(
        "committed {} key blocks to {} ({})",
        count, target.name, final_id
    );
    Ok(final_id)
}
