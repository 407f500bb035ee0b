//! End-to-end driver of a rebake run.
//!
//! ```text
//! Idle -> Validating -> CapturingBaselines -> Rebaking(mesh)* -> ApplyingRestPose
//!      -> RelinkingDrivers(mesh)* -> RestoringModifiers -> Done
//! ```
//! Any step may end in `Failed`. Nothing in the scene changes before
//! `Rebaking`; the rig's rest pose changes only once every mesh has been
//! committed. Already-committed meshes are not rolled back on failure.

use std::fmt;

use log::{debug, error, info, warn};
use posebake_api_core::{EditorState, MeshData, ObjectId, SceneHost};
use thiserror::Error;

use crate::config::RebakeConfig;
use crate::discovery::{discover_targets, resolve_rig, TargetMesh};
use crate::drivers::{capture_drivers, relink_drivers, CapturedDriver, MeshIdentity};
use crate::error::RebakeError;
use crate::rebase::{rebase_mesh, validate_key_lengths, write_back};
use crate::report::{MeshOutcome, RebakeReport};
use crate::topo::RelativeKeyGraph;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RebakeStep {
    Validating,
    CapturingBaselines,
    Rebaking { mesh: String },
    ApplyingRestPose,
    RelinkingDrivers { mesh: String },
    RestoringModifiers,
}

impl RebakeStep {
    pub fn mesh(&self) -> Option<&str> {
        match self {
            RebakeStep::Rebaking { mesh } | RebakeStep::RelinkingDrivers { mesh } => Some(mesh),
            _ => None,
        }
    }
}

impl fmt::Display for RebakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RebakeStep::Validating => "validating",
            RebakeStep::CapturingBaselines => "capturing baselines",
            RebakeStep::Rebaking { .. } => "rebaking",
            RebakeStep::ApplyingRestPose => "applying rest pose",
            RebakeStep::RelinkingDrivers { .. } => "relinking drivers",
            RebakeStep::RestoringModifiers => "restoring modifiers",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RebakeState {
    #[default]
    Idle,
    Running(RebakeStep),
    Done,
    Failed(String),
}

/// A run that stopped early, with where it stopped.
#[derive(Clone, Debug, PartialEq, Error)]
#[error(
    "rebake failed{} while {step}: {error}",
    .mesh.as_deref().map(|m| format!(" on '{m}'")).unwrap_or_default()
)]
pub struct RebakeFailure {
    pub step: RebakeStep,
    pub mesh: Option<String>,
    #[source]
    pub error: RebakeError,
}

/// Everything read about one mesh before the scene is touched.
struct MeshPlan {
    target: TargetMesh,
    data: MeshData,
    graph: RelativeKeyGraph,
    drivers: Vec<CapturedDriver>,
}

struct Committed {
    plan: MeshPlan,
    final_id: ObjectId,
}

pub struct Rebaker<'h, H: SceneHost + ?Sized> {
    host: &'h mut H,
    config: RebakeConfig,
    state: RebakeState,
    history: Vec<RebakeState>,
}

impl<'h, H: SceneHost + ?Sized> Rebaker<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self::with_config(host, RebakeConfig::default())
    }

    pub fn with_config(host: &'h mut H, config: RebakeConfig) -> Self {
        Self {
            host,
            config,
            state: RebakeState::Idle,
            history: vec![RebakeState::Idle],
        }
    }

    pub fn state(&self) -> &RebakeState {
        &self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[RebakeState] {
        &self.history
    }

    fn transition(&mut self, next: RebakeState) {
        debug!("rebake: {:?} -> {:?}", self.state, next);
        self.state = next.clone();
        self.history.push(next);
    }

    fn enter(&mut self, step: RebakeStep) -> RebakeStep {
        self.transition(RebakeState::Running(step.clone()));
        step
    }

    /// Run the whole sequence once.
    pub fn run(&mut self) -> Result<RebakeReport, RebakeFailure> {
        let editor = self.host.editor_state();
        let mut replaced = Vec::new();
        let result = self.run_steps(&mut replaced);

        if self.config.restore_editor_state {
            self.restore_editor(&editor, &replaced);
        }

        match result {
            Ok(report) => {
                self.transition(RebakeState::Done);
                info!("{}", report.summary());
                Ok(report)
            }
            Err(failure) => {
                error!("{failure}");
                self.transition(RebakeState::Failed(failure.to_string()));
                Err(failure)
            }
        }
    }

    fn run_steps(
        &mut self,
        replaced: &mut Vec<(ObjectId, ObjectId)>,
    ) -> Result<RebakeReport, RebakeFailure> {
        let step = self.enter(RebakeStep::Validating);
        info!("STEP 1: validating rig and target meshes");
        let fail = |step: &RebakeStep, mesh: Option<&str>| {
            let step = step.clone();
            let mesh = mesh.map(str::to_string).or_else(|| step.mesh().map(str::to_string));
            move |error: RebakeError| RebakeFailure { step, mesh, error }
        };
        let (rig, rig_name) = resolve_rig(&*self.host).map_err(fail(&step, None))?;
        let targets =
            discover_targets(&*self.host, rig, &self.config).map_err(fail(&step, None))?;

        let step = self.enter(RebakeStep::CapturingBaselines);
        let mut plans = Vec::with_capacity(targets.len());
        for target in targets {
            let plan = self
                .plan(target)
                .map_err(|(mesh, e)| fail(&step, Some(mesh.as_str()))(e))?;
            plans.push(plan);
        }

        let mut committed = Vec::with_capacity(plans.len());
        for (n, plan) in plans.into_iter().enumerate() {
            let step = self.enter(RebakeStep::Rebaking {
                mesh: plan.target.name.clone(),
            });
            info!("STEP 2.{}: rebaking {}", n + 1, plan.target.name);
            let suffix = self.config.working_copy_suffix.clone();
            let rebased =
                rebase_mesh(&mut *self.host, &plan.target, &plan.data, &plan.graph, &suffix)
                    .map_err(fail(&step, None))?;
            let final_id = write_back(&mut *self.host, &plan.target, rebased, &suffix)
                .map_err(fail(&step, None))?;
            if final_id != plan.target.id {
                replaced.push((plan.target.id, final_id));
            }
            committed.push(Committed { plan, final_id });
        }

        let step = self.enter(RebakeStep::ApplyingRestPose);
        info!("STEP 3: applying pose as rest for {rig_name}");
        self.host
            .apply_pose_as_rest(rig)
            .map_err(|e| fail(&step, None)(e.into()))?;

        let mut warnings = Vec::new();
        let mut outcomes = Vec::with_capacity(committed.len());
        for c in &committed {
            let mut relinked = 0;
            if self.config.relink_drivers && !c.plan.drivers.is_empty() {
                let step = self.enter(RebakeStep::RelinkingDrivers {
                    mesh: c.plan.target.name.clone(),
                });
                info!("STEP 4: relinking drivers on {}", c.plan.target.name);
                let original = MeshIdentity {
                    id: c.plan.target.id,
                    name: c.plan.target.name.clone(),
                };
                let outcome =
                    relink_drivers(&mut *self.host, &original, c.final_id, &c.plan.drivers)
                        .map_err(fail(&step, None))?;
                if self.config.driver_relink_errors_are_fatal {
                    if let Some(e) = outcome.failures.into_iter().next() {
                        return Err(fail(&step, None)(e));
                    }
                } else {
                    warnings.extend(outcome.failures);
                }
                relinked = outcome.relinked;
            }
            outcomes.push(MeshOutcome {
                name: c.plan.target.name.clone(),
                object: c.final_id,
                shape_keys: c.plan.data.relative_keys().len(),
                drivers_relinked: relinked,
            });
        }

        let step = self.enter(RebakeStep::RestoringModifiers);
        info!("STEP 5: restoring armature modifiers");
        for c in &committed {
            let target = &c.plan.target;
            self.host
                .insert_modifier(c.final_id, target.armature_index, target.armature().clone())
                .map_err(|e| fail(&step, Some(target.name.as_str()))(e.into()))?;
            debug!(
                "restored '{}' on {} at index {}",
                target.armature().name,
                target.name,
                target.armature_index
            );
        }

        Ok(RebakeReport {
            rig: rig_name,
            meshes: outcomes,
            warnings,
        })
    }

    /// Read and check one mesh. Errors carry the mesh name.
    fn plan(&self, target: TargetMesh) -> Result<MeshPlan, (String, RebakeError)> {
        let read = || -> Result<(MeshData, RelativeKeyGraph, Vec<CapturedDriver>), RebakeError> {
            let data = self.host.mesh_data(target.id)?;
            validate_key_lengths(&target.name, &data)?;
            let graph = RelativeKeyGraph::build(&target.name, &data)?;
            let drivers = capture_drivers(&*self.host, target.id)?;
            Ok((data, graph, drivers))
        };
        match read() {
            Ok((data, graph, drivers)) => Ok(MeshPlan {
                target,
                data,
                graph,
                drivers,
            }),
            Err(e) => Err((target.name, e)),
        }
    }

    fn restore_editor(&mut self, saved: &EditorState, replaced: &[(ObjectId, ObjectId)]) {
        let mut state = saved.clone();
        if let Some(active) = state.active {
            if let Some((_, new)) = replaced.iter().find(|(old, _)| *old == active) {
                state.active = Some(*new);
            }
        }
        if let Err(e) = self.host.restore_editor_state(&state) {
            warn!("could not restore editor state: {e}");
        }
    }
}

/// Apply the current pose of the selected rig as its rest pose, re-basing
/// the shape keys of every mesh it deforms.
pub fn apply_pose_as_rest<H: SceneHost + ?Sized>(
    host: &mut H,
    config: &RebakeConfig,
) -> Result<RebakeReport, RebakeFailure> {
    Rebaker::with_config(host, config.clone()).run()
}
