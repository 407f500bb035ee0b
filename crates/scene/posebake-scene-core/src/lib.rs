//! posebake-scene-core
//!
//! An in-memory scene that implements [`SceneHost`](posebake_api_core::SceneHost).
//! It evaluates meshes with linear-blend skinning plus a handful of simple
//! modifiers, which is enough to drive the rebake core headlessly and to test it
//! against a deterministic deformation oracle.

pub mod eval;
pub mod memory;
pub mod skinning;
pub mod spec;

pub use memory::{CommitPolicy, MemoryScene, MeshObject, ObjectBody, SceneObject, SceneStats};
pub use spec::{SceneSpec, SceneSpecError};
