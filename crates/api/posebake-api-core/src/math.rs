//! TRS transforms used for bone rest and pose data.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Translation, rotation (unit quaternion) and scale.
///
/// Bone transforms are stored in TRS form so that they stay readable in scene
/// files; composition goes through 4x4 matrices and is decomposed again.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    #[inline]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation.normalize(), self.translation)
    }

    /// Decompose an affine matrix. Shear is dropped.
    pub fn from_mat4(m: &Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    /// `self` followed by `child` in the local frame of `self`.
    pub fn compose(&self, child: &Transform) -> Transform {
        Transform::from_mat4(&(self.to_mat4() * child.to_mat4()))
    }

    pub fn is_identity(&self, eps: f32) -> bool {
        self.approx_eq(&Transform::IDENTITY, eps)
    }

    /// Component-wise comparison. Rotations compare up to sign (q and -q are the same rotation).
    pub fn approx_eq(&self, other: &Transform, eps: f32) -> bool {
        let rot_close = self.rotation.abs_diff_eq(other.rotation, eps)
            || self.rotation.abs_diff_eq(-other.rotation, eps);
        self.translation.abs_diff_eq(other.translation, eps)
            && self.scale.abs_diff_eq(other.scale, eps)
            && rot_close
    }
}
