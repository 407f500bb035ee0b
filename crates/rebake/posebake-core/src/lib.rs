//! posebake-core: apply a rig's current pose as its rest pose without losing
//! the shape keys and drivers of the meshes it deforms.
//!
//! The entry point is [`apply_pose_as_rest`] (or [`Rebaker`] for access to the
//! state history). All scene access goes through
//! [`SceneHost`](posebake_api_core::SceneHost).

pub mod config;
pub mod discovery;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod rebase;
pub mod report;
pub mod snapshot;
pub mod topo;

pub use config::RebakeConfig;
pub use discovery::{discover_targets, resolve_rig, TargetMesh};
pub use drivers::{capture_drivers, relink_drivers, CapturedDriver, MeshIdentity, RelinkOutcome};
pub use error::{ConfigurationError, RebakeError};
pub use orchestrator::{apply_pose_as_rest, RebakeFailure, RebakeState, RebakeStep, Rebaker};
pub use rebase::{rebase_mesh, validate_key_lengths, write_back, RebasedMesh};
pub use report::{MeshOutcome, RebakeReport};
pub use snapshot::{capture, CaptureTarget, EvaluationState, WorkingCopy};
pub use topo::RelativeKeyGraph;
