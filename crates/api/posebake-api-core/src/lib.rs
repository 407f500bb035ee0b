//! posebake-api-core: scene model and host-service seam (engine-agnostic)
//!
//! The types here describe what the rebake core reads from and writes back to a
//! host tool: meshes with shape keys, modifier stacks, rigs and drivers. The
//! [`SceneHost`] trait is the only way the core touches a scene; adapters for a
//! real content-creation tool (or the in-memory reference scene) implement it.

pub mod data_path;
pub mod driver;
pub mod host;
pub mod ids;
pub mod math;
pub mod mesh;
pub mod modifier;
pub mod rig;

pub use data_path::DataPath;
pub use driver::{Driver, DriverTarget, DriverVariable, VariableKind};
pub use host::{EditorState, HostError, InteractionMode, ObjectKind, SceneHost};
pub use ids::{IdAllocator, ObjectId};
pub use math::Transform;
pub use mesh::{Interpolation, MeshData, ShapeKey, ShapeKeyMetadata, VertexGroup, BASIS_KEY_NAME};
pub use modifier::{ArmatureSettings, Modifier, ModifierKind, DEFORMING_MODIFIER_TYPES};
pub use rig::{Bone, Rig};

pub use glam::{Mat4, Quat, Vec3};
