//! Driver capture and relinking across mesh replacement.

use log::{debug, warn};
use posebake_api_core::{
    DataPath, Driver, DriverTarget, DriverVariable, HostError, ObjectId, SceneHost, VariableKind,
};

use crate::error::RebakeError;

/// A variable input, with the target object recorded by id and by name.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedTarget {
    pub object: Option<ObjectId>,
    pub object_name: Option<String>,
    pub data_path: String,
    pub bone_target: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CapturedVariable {
    pub name: String,
    pub kind: VariableKind,
    pub targets: Vec<CapturedTarget>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CapturedDriver {
    pub data_path: DataPath,
    pub expression: String,
    pub use_self: bool,
    pub variables: Vec<CapturedVariable>,
}

impl CapturedDriver {
    pub fn shape_key(&self) -> Option<&str> {
        self.data_path.shape_key()
    }
}

/// The mesh being re-baked, as seen before it was replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshIdentity {
    pub id: ObjectId,
    pub name: String,
}

impl MeshIdentity {
    /// Whether `target` resolves to this mesh, by name or by id.
    pub fn is_referenced_by(&self, target: &CapturedTarget) -> bool {
        match (&target.object_name, target.object) {
            (Some(name), _) if *name == self.name => true,
            (_, Some(id)) => id == self.id,
            _ => false,
        }
    }
}

/// Outcome of relinking one mesh's drivers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelinkOutcome {
    pub relinked: usize,
    pub rewritten_self_references: usize,
    /// Drivers that could not be recreated; warning level.
    pub failures: Vec<RebakeError>,
}

/// Read every driver on `mesh` and resolve target names up front.
pub fn capture_drivers<H: SceneHost + ?Sized>(
    host: &H,
    mesh: ObjectId,
) -> Result<Vec<CapturedDriver>, RebakeError> {
    let drivers = host.drivers(mesh)?;
    let captured: Vec<CapturedDriver> = drivers
        .into_iter()
        .map(|d| CapturedDriver {
            data_path: d.data_path,
            expression: d.expression,
            use_self: d.use_self,
            variables: d
                .variables
                .into_iter()
                .map(|v| CapturedVariable {
                    name: v.name,
                    kind: v.kind,
                    targets: v
                        .targets
                        .into_iter()
                        .map(|t| CapturedTarget {
                            object_name: t.id.and_then(|id| target_name(host, id)),
                            object: t.id,
                            data_path: t.data_path,
                            bone_target: t.bone_target,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    debug!("captured {} drivers on {}", captured.len(), mesh);
    Ok(captured)
}

/// Name of a driver target, if the host still knows the object. A dangling
/// target is kept by id only and never counts as a self-reference by name.
fn target_name<H: SceneHost + ?Sized>(host: &H, id: ObjectId) -> Option<String> {
    match host.object_name(id) {
        Ok(name) => Some(name),
        Err(e) => {
            warn!("driver target {id} cannot be resolved by name: {e}");
            None
        }
    }
}

fn rebuild(driver: &CapturedDriver, original: &MeshIdentity, final_id: ObjectId) -> (Driver, usize) {
    let mut rewritten = 0;
    let variables = driver
        .variables
        .iter()
        .map(|v| DriverVariable {
            name: v.name.clone(),
            kind: v.kind,
            targets: v
                .targets
                .iter()
                .map(|t| {
                    let id = if original.is_referenced_by(t) {
                        rewritten += 1;
                        Some(final_id)
                    } else {
                        t.object
                    };
                    DriverTarget {
                        id,
                        data_path: t.data_path.clone(),
                        bone_target: t.bone_target.clone(),
                    }
                })
                .collect(),
        })
        .collect();
    let out = Driver {
        data_path: driver.data_path.clone(),
        expression: driver.expression.clone(),
        variables,
        use_self: driver.use_self,
    };
    (out, rewritten)
}

/// Recreate `drivers` on the final object, pointing self-references at it.
///
/// A driver whose shape key is gone is reported in the outcome and skipped.
/// Host failures other than a missing key abort the relink.
pub fn relink_drivers<H: SceneHost + ?Sized>(
    host: &mut H,
    original: &MeshIdentity,
    final_id: ObjectId,
    drivers: &[CapturedDriver],
) -> Result<RelinkOutcome, RebakeError> {
    host.clear_drivers(final_id)?;
    let data = host.mesh_data(final_id)?;
    let mut outcome = RelinkOutcome::default();

    for captured in drivers {
        if let Some(key) = captured.shape_key() {
            if data.shape_key(key).is_none() {
                let err = RebakeError::DriverRelink {
                    mesh: original.name.clone(),
                    shape_key: key.to_string(),
                };
                warn!("{err}");
                outcome.failures.push(err);
                continue;
            }
        }

        let (driver, rewritten) = rebuild(captured, original, final_id);
        match host.add_driver(final_id, driver) {
            Ok(()) => {
                outcome.relinked += 1;
                outcome.rewritten_self_references += rewritten;
            }
            Err(HostError::UnknownShapeKey { key, .. }) => {
                let err = RebakeError::DriverRelink {
                    mesh: original.name.clone(),
                    shape_key: key,
                };
                warn!("{err}");
                outcome.failures.push(err);
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(
        "relinked {} drivers on {} ({} self-references rewritten)",
        outcome.relinked, original.name, outcome.rewritten_self_references
    );
    Ok(outcome)
}
