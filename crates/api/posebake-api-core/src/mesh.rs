//! Mesh data and shape keys.
//!
//! Shape keys are stored as per-vertex deltas. The first key block on a mesh is
//! the reference ("basis") key; its deltas are all zero and its geometry is the
//! mesh's own vertex buffer. Every other key is a delta relative to either the
//! basis or, for relative keys, another key.

use glam::Vec3;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name the host gives the reference key when a mesh first gains shape keys.
pub const BASIS_KEY_NAME: &str = "Basis";

/// Interpolation mode used when a key takes part in absolute (time-based) blending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    Cardinal,
    CatmullRom,
    BSpline,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeKey {
    pub name: String,
    pub deltas: Vec<Vec3>,
    /// Parent key this one is relative to; `None` means the basis.
    #[serde(default)]
    pub relative_key: Option<String>,
    #[serde(default)]
    pub value: f32,
    #[serde(default)]
    pub slider_min: f32,
    #[serde(default = "default_slider_max")]
    pub slider_max: f32,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub interpolation: Interpolation,
    /// Optional vertex group masking this key's influence.
    #[serde(default)]
    pub vertex_group: Option<String>,
    #[serde(default)]
    pub custom_properties: IndexMap<String, serde_json::Value>,
}

fn default_slider_max() -> f32 {
    1.0
}

impl ShapeKey {
    pub fn new(name: impl Into<String>, deltas: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            deltas,
            relative_key: None,
            value: 0.0,
            slider_min: 0.0,
            slider_max: 1.0,
            mute: false,
            interpolation: Interpolation::Linear,
            vertex_group: None,
            custom_properties: IndexMap::new(),
        }
    }

    /// A reference key with zero deltas for `vertex_count` vertices.
    pub fn basis(name: impl Into<String>, vertex_count: usize) -> Self {
        Self::new(name, vec![Vec3::ZERO; vertex_count])
    }

    pub fn with_relative_key(mut self, parent: impl Into<String>) -> Self {
        self.relative_key = Some(parent.into());
        self
    }

    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value;
        self
    }

    pub fn metadata(&self) -> ShapeKeyMetadata {
        ShapeKeyMetadata {
            value: self.value,
            slider_min: self.slider_min,
            slider_max: self.slider_max,
            mute: self.mute,
            interpolation: self.interpolation,
            vertex_group: self.vertex_group.clone(),
            relative_key: self.relative_key.clone(),
            custom_properties: self.custom_properties.clone(),
        }
    }

    /// Replace the delta buffer, keeping every piece of metadata.
    pub fn with_deltas(&self, deltas: Vec<Vec3>) -> Self {
        Self {
            deltas,
            ..self.clone()
        }
    }
}

/// Scalar metadata carried by a shape key, independent of its geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeKeyMetadata {
    pub value: f32,
    pub slider_min: f32,
    pub slider_max: f32,
    pub mute: bool,
    pub interpolation: Interpolation,
    pub vertex_group: Option<String>,
    pub relative_key: Option<String>,
    pub custom_properties: IndexMap<String, serde_json::Value>,
}

/// Dense per-vertex weights for a named group (bone groups share the bone's name).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexGroup {
    pub name: String,
    pub weights: Vec<f32>,
}

impl VertexGroup {
    #[inline]
    pub fn weight(&self, vertex: usize) -> f32 {
        self.weights.get(vertex).copied().unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    #[serde(default)]
    pub name: String,
    pub vertices: Vec<Vec3>,
    /// Key blocks in declared order. When non-empty, index 0 is the reference key.
    #[serde(default)]
    pub shape_keys: Vec<ShapeKey>,
    #[serde(default)]
    pub vertex_groups: Vec<VertexGroup>,
}

impl MeshData {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn has_shape_keys(&self) -> bool {
        !self.shape_keys.is_empty()
    }

    /// The reference key, if the mesh has any key blocks.
    pub fn reference_key(&self) -> Option<&ShapeKey> {
        self.shape_keys.first()
    }

    /// Whether `name` refers to the reference key.
    pub fn is_reference_key(&self, name: &str) -> bool {
        self.reference_key().is_some_and(|k| k.name == name)
    }

    /// Key blocks other than the reference key.
    pub fn relative_keys(&self) -> &[ShapeKey] {
        if self.shape_keys.is_empty() {
            &[]
        } else {
            &self.shape_keys[1..]
        }
    }

    pub fn shape_key(&self, name: &str) -> Option<&ShapeKey> {
        self.shape_keys.iter().find(|k| k.name == name)
    }

    pub fn shape_key_mut(&mut self, name: &str) -> Option<&mut ShapeKey> {
        self.shape_keys.iter_mut().find(|k| k.name == name)
    }

    pub fn vertex_group(&self, name: &str) -> Option<&VertexGroup> {
        self.vertex_groups.iter().find(|g| g.name == name)
    }

    /// Parent of `key`, with references to the basis folded into `None`.
    pub fn parent_of<'a>(&'a self, key: &'a ShapeKey) -> Option<&'a str> {
        match key.relative_key.as_deref() {
            Some(parent) if !self.is_reference_key(parent) => Some(parent),
            _ => None,
        }
    }

    /// Blend all unmuted keys at their stored values on top of the basis.
    ///
    /// Deltas are already relative to each key's parent, so relative keys blend
    /// additively just like basis-relative ones.
    pub fn blended_positions(&self) -> Vec<Vec3> {
        let mut out = self.vertices.clone();
        for key in self.relative_keys() {
            if key.mute || key.value == 0.0 {
                continue;
            }
            let mask = key.vertex_group.as_deref().and_then(|g| self.vertex_group(g));
            for (i, (p, d)) in out.iter_mut().zip(&key.deltas).enumerate() {
                let w = mask.map_or(1.0, |g| g.weight(i));
                *p += *d * (key.value * w);
            }
        }
        out
    }
}
