//! Rigs: bone hierarchies with a rest pose and a current pose.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::math::Transform;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Rest transform relative to the parent's rest frame.
    #[serde(default)]
    pub rest: Transform,
    /// Pose override relative to `rest`.
    #[serde(default)]
    pub pose: Transform,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<&str>, rest: Transform) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_string),
            rest,
            pose: Transform::IDENTITY,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rig {
    pub bones: Vec<Bone>,
}

impl Rig {
    pub fn new(bones: Vec<Bone>) -> Self {
        Self { bones }
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.bones.iter_mut().find(|b| b.name == name)
    }

    /// Armature-space rest matrices, one per bone.
    pub fn rest_matrices(&self) -> Vec<Mat4> {
        self.world_matrices(|b| b.rest.to_mat4())
    }

    /// Armature-space matrices under the current pose.
    pub fn posed_matrices(&self) -> Vec<Mat4> {
        self.world_matrices(|b| b.rest.to_mat4() * b.pose.to_mat4())
    }

    /// Per-bone matrices mapping rest-space positions to posed positions.
    pub fn skinning_matrices(&self) -> Vec<Mat4> {
        self.posed_matrices()
            .into_iter()
            .zip(self.rest_matrices())
            .map(|(posed, rest)| posed * rest.inverse())
            .collect()
    }

    /// True when every bone sits at its rest transform.
    pub fn is_at_rest(&self, eps: f32) -> bool {
        self.bones.iter().all(|b| b.pose.is_identity(eps))
    }

    /// Fold the current pose into the rest pose and reset every pose to identity.
    pub fn apply_pose_as_rest(&mut self) {
        for bone in &mut self.bones {
            bone.rest = bone.rest.compose(&bone.pose);
            bone.pose = Transform::IDENTITY;
        }
    }

    fn world_matrices(&self, local: impl Fn(&Bone) -> Mat4) -> Vec<Mat4> {
        let mut resolved: Vec<Option<Mat4>> = vec![None; self.bones.len()];
        for i in 0..self.bones.len() {
            self.resolve(i, &local, &mut resolved, 0);
        }
        resolved
            .into_iter()
            .map(|m| m.unwrap_or(Mat4::IDENTITY))
            .collect()
    }

    fn resolve(
        &self,
        i: usize,
        local: &impl Fn(&Bone) -> Mat4,
        resolved: &mut [Option<Mat4>],
        depth: usize,
    ) -> Mat4 {
        if let Some(m) = resolved[i] {
            return m;
        }
        let bone = &self.bones[i];
        // A broken hierarchy (missing or looping parent) is treated as a root.
        let parent = match bone.parent.as_deref().and_then(|p| self.bone_index(p)) {
            Some(p) if depth < self.bones.len() => self.resolve(p, local, resolved, depth + 1),
            _ => Mat4::IDENTITY,
        };
        let m = parent * local(bone);
        resolved[i] = Some(m);
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use std::f32::consts::FRAC_PI_2;

    fn two_bones() -> Rig {
        Rig::new(vec![
            Bone::new("root", None, Transform::IDENTITY),
            Bone::new(
                "tip",
                Some("root"),
                Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            ),
        ])
    }

    #[test]
    fn skinning_is_identity_at_rest() {
        let rig = two_bones();
        for m in rig.skinning_matrices() {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        }
        assert!(rig.is_at_rest(1e-6));
    }

    #[test]
    fn child_follows_parent_pose() {
        let mut rig = two_bones();
        rig.bones[0].pose = Transform::from_rotation(Quat::from_rotation_z(FRAC_PI_2));
        let posed = rig.posed_matrices();
        let head = posed[1].transform_point3(Vec3::ZERO);
        assert!(head.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5), "{head:?}");
    }

    #[test]
    fn apply_pose_moves_rest_to_posed_frames() {
        let mut rig = two_bones();
        rig.bones[1].pose = Transform::from_rotation(Quat::from_rotation_x(0.4));
        let before = rig.posed_matrices();
        rig.apply_pose_as_rest();
        let after = rig.rest_matrices();
        for (a, b) in before.iter().zip(&after) {
            assert!(a.abs_diff_eq(*b, 1e-5));
        }
        assert!(rig.is_at_rest(1e-6));
    }
}
