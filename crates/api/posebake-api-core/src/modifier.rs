//! Modifier stack entries.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;

/// Host type names of modifiers that move vertices. When one of these sits in
/// front of an armature entry, the armature no longer sees the rest geometry and
/// a rebake would fold the wrong shape into the basis.
pub const DEFORMING_MODIFIER_TYPES: &[&str] = &[
    "MESH_DEFORM",
    "LATTICE",
    "CLOTH",
    "SOFT_BODY",
    "MESH_CACHE",
    "SURFACE_DEFORM",
    "VOLUME_DEFORM",
    "NODES",
    "DISPLACE",
    "WAVE",
    "SHRINKWRAP",
    "SIMPLE_DEFORM",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArmatureSettings {
    /// Rig driving this entry.
    pub object: Option<ObjectId>,
    #[serde(default)]
    pub use_deform_preserve_volume: bool,
    #[serde(default = "yes")]
    pub use_vertex_groups: bool,
    #[serde(default)]
    pub use_bone_envelopes: bool,
    /// Optional group limiting the armature's influence.
    #[serde(default)]
    pub vertex_group: Option<String>,
    #[serde(default)]
    pub invert_vertex_group: bool,
}

impl ArmatureSettings {
    pub fn new(object: ObjectId) -> Self {
        Self {
            object: Some(object),
            use_deform_preserve_volume: false,
            use_vertex_groups: true,
            use_bone_envelopes: false,
            vertex_group: None,
            invert_vertex_group: false,
        }
    }
}

fn yes() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModifierKind {
    Armature(ArmatureSettings),
    /// Uniform offset of every vertex.
    Displace { offset: Vec3 },
    /// Keeps the first `ratio` share of vertices; changes topology.
    Decimate { ratio: f32 },
    /// Anything else the host knows about, identified by its host type name.
    Other { type_name: String },
}

impl ModifierKind {
    /// Host-style type name (`ARMATURE`, `DISPLACE`, ...).
    pub fn type_name(&self) -> &str {
        match self {
            ModifierKind::Armature(_) => "ARMATURE",
            ModifierKind::Displace { .. } => "DISPLACE",
            ModifierKind::Decimate { .. } => "DECIMATE",
            ModifierKind::Other { type_name } => type_name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(flatten)]
    pub kind: ModifierKind,
    #[serde(default = "yes")]
    pub show_viewport: bool,
    #[serde(default = "yes")]
    pub show_render: bool,
    #[serde(default)]
    pub show_in_editmode: bool,
    #[serde(default)]
    pub show_on_cage: bool,
}

impl Modifier {
    pub fn new(name: impl Into<String>, kind: ModifierKind) -> Self {
        Self {
            name: name.into(),
            kind,
            show_viewport: true,
            show_render: true,
            show_in_editmode: false,
            show_on_cage: false,
        }
    }

    pub fn armature(name: impl Into<String>, rig: ObjectId) -> Self {
        Self::new(name, ModifierKind::Armature(ArmatureSettings::new(rig)))
    }

    pub fn armature_settings(&self) -> Option<&ArmatureSettings> {
        match &self.kind {
            ModifierKind::Armature(s) => Some(s),
            _ => None,
        }
    }

    /// True for an armature entry whose target is `rig`.
    pub fn targets_rig(&self, rig: ObjectId) -> bool {
        self.armature_settings()
            .is_some_and(|s| s.object == Some(rig))
    }

    pub fn is_deformer(&self) -> bool {
        DEFORMING_MODIFIER_TYPES.contains(&self.kind.type_name())
    }
}
