//! Linear-blend skinning for armature entries.

use glam::{Mat4, Vec3};
use posebake_api_core::{ArmatureSettings, MeshData, Rig};

/// Bone influences of one vertex, resolved against the rig's bone order.
fn bone_weights<'a>(
    mesh: &'a MeshData,
    rig: &'a Rig,
    vertex: usize,
) -> impl Iterator<Item = (usize, f32)> + 'a {
    rig.bones.iter().enumerate().filter_map(move |(b, bone)| {
        let w = mesh.vertex_group(&bone.name)?.weight(vertex);
        (w > 0.0).then_some((b, w))
    })
}

/// Deform `positions` in place with the rig's current pose.
///
/// Vertices without bone weights stay where they are. The armature's own
/// vertex-group mask blends between the input and the skinned result.
/// Envelope and volume-preserving deformation are not modelled.
pub fn deform(positions: &mut [Vec3], mesh: &MeshData, rig: &Rig, settings: &ArmatureSettings) {
    if !settings.use_vertex_groups {
        return;
    }
    let matrices: Vec<Mat4> = rig.skinning_matrices();
    let mask = settings.vertex_group.as_deref().and_then(|g| mesh.vertex_group(g));

    for (i, p) in positions.iter_mut().enumerate() {
        let mut skinned = Vec3::ZERO;
        let mut total = 0.0;
        for (b, w) in bone_weights(mesh, rig, i) {
            skinned += matrices[b].transform_point3(*p) * w;
            total += w;
        }
        if total <= 0.0 {
            continue;
        }
        skinned /= total;

        let factor = match mask {
            Some(group) if settings.invert_vertex_group => 1.0 - group.weight(i),
            Some(group) => group.weight(i),
            None => 1.0,
        };
        *p = p.lerp(skinned, factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posebake_api_core::{Bone, ObjectId, Transform, VertexGroup};
    use glam::Quat;
    use std::f32::consts::FRAC_PI_2;

    fn rig() -> Rig {
        let mut rig = Rig::new(vec![Bone::new("b", None, Transform::IDENTITY)]);
        rig.bones[0].pose = Transform::from_rotation(Quat::from_rotation_z(FRAC_PI_2));
        rig
    }

    fn mesh(weights: Vec<f32>) -> MeshData {
        MeshData {
            name: "m".into(),
            vertices: vec![Vec3::X, Vec3::Y],
            shape_keys: vec![],
            vertex_groups: vec![VertexGroup {
                name: "b".into(),
                weights,
            }],
        }
    }

    #[test]
    fn weighted_vertices_follow_bone() {
        let mesh = mesh(vec![1.0, 0.0]);
        let mut pos = mesh.vertices.clone();
        deform(&mut pos, &mesh, &rig(), &ArmatureSettings::new(ObjectId(0)));
        assert!(pos[0].abs_diff_eq(Vec3::Y, 1e-5), "{:?}", pos[0]);
        assert_eq!(pos[1], Vec3::Y);
    }

    #[test]
    fn inverted_mask_blocks_influence() {
        let mut mesh = mesh(vec![1.0, 1.0]);
        mesh.vertex_groups.push(VertexGroup {
            name: "mask".into(),
            weights: vec![1.0, 0.0],
        });
        let mut settings = ArmatureSettings::new(ObjectId(0));
        settings.vertex_group = Some("mask".into());
        settings.invert_vertex_group = true;
        let mut pos = mesh.vertices.clone();
        deform(&mut pos, &mesh, &rig(), &settings);
        assert_eq!(pos[0], Vec3::X);
        assert!(pos[1].abs_diff_eq(-Vec3::X, 1e-5), "{:?}", pos[1]);
    }

    #[test]
    fn bone_weights_follow_rig_order_and_skip_zero() {
        let rig = Rig::new(vec![
            Bone::new("a", None, Transform::IDENTITY),
            Bone::new("b", Some("a"), Transform::IDENTITY),
        ]);
        let mut mesh = mesh(vec![0.25, 0.0]);
        mesh.vertex_groups.push(VertexGroup {
            name: "a".into(),
            weights: vec![0.75, 0.0],
        });
        let w0: Vec<_> = bone_weights(&mesh, &rig, 0).collect();
        assert_eq!(w0, vec![(0, 0.75), (1, 0.25)]);
        assert_eq!(bone_weights(&mesh, &rig, 1).count(), 0);
    }
}
