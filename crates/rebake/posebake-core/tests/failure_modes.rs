use posebake_api_core::{
    DataPath, Driver, EditorState, HostError, InteractionMode, MeshData, Modifier, ObjectId,
    ObjectKind, Rig, SceneHost, ShapeKey, Vec3,
};
use posebake_core::{
    apply_pose_as_rest, ConfigurationError, RebakeConfig, RebakeError, RebakeState, RebakeStep,
    Rebaker,
};
use posebake_scene_core::{MemoryScene, SceneStats};

fn load(name: &str) -> MemoryScene {
    let json = posebake_test_fixtures::scenes::json(name).expect("load scene fixture");
    MemoryScene::from_json(&json).expect("build scene from fixture")
}

/// Everything a failed validation must leave alone.
fn snapshot(scene: &MemoryScene) -> Vec<(String, Option<MeshData>, Vec<Modifier>)> {
    scene
        .objects()
        .into_iter()
        .map(|id| {
            (
                scene.object_name(id).unwrap(),
                scene.mesh_data(id).ok(),
                scene.modifiers(id).unwrap_or_default(),
            )
        })
        .collect()
}

fn configuration_error(scene: &mut MemoryScene) -> ConfigurationError {
    let before = snapshot(scene);
    let failure = apply_pose_as_rest(scene, &RebakeConfig::default()).expect_err("validation fails");
    assert_eq!(failure.step, RebakeStep::Validating);
    assert_eq!(snapshot(scene), before, "validation must not touch the scene");
    assert_eq!(scene.stats(), SceneStats::default());
    match failure.error {
        RebakeError::Configuration(e) => e,
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn two_armature_entries_on_one_mesh() {
    let mut scene = load("two-bone-smile");
    let rig = scene.find_object("Rig").unwrap();
    let face = scene.find_object("Face").unwrap();
    scene
        .push_modifier(face, Modifier::armature("Armature.001", rig))
        .unwrap();

    assert_eq!(
        configuration_error(&mut scene),
        ConfigurationError::MultipleArmatureModifiers {
            mesh: "Face".into()
        }
    );
}

#[test]
fn deformers_ahead_of_armature_are_listed() {
    let mut scene = load("deformer-before-armature");
    assert_eq!(
        configuration_error(&mut scene),
        ConfigurationError::DeformersBeforeArmature {
            meshes: vec!["Cloak".into(), "Boots".into()]
        }
    );
}

#[test]
fn nothing_selected() {
    let mut scene = load("two-bone-smile");
    let face = scene.find_object("Face").unwrap();
    scene.set_active(Some(face), InteractionMode::Object);
    assert_eq!(
        configuration_error(&mut scene),
        ConfigurationError::NoArmature
    );
}

#[test]
fn target_setting_must_be_an_armature() {
    let mut scene = load("two-bone-smile");
    let ctrl = scene.find_object("Ctrl").unwrap();
    scene.set_active(None, InteractionMode::Object);
    scene.set_target_armature(Some(ctrl));
    assert_eq!(
        configuration_error(&mut scene),
        ConfigurationError::NotAnArmature("Ctrl".into())
    );
}

#[test]
fn rig_without_meshes() {
    let mut scene = load("two-bone-smile");
    for name in ["Face", "Hat"] {
        let id = scene.find_object(name).unwrap();
        scene.set_modifiers(id, vec![]).unwrap();
    }
    assert_eq!(
        configuration_error(&mut scene),
        ConfigurationError::NoAffectedMeshes
    );
}

#[test]
fn cyclic_keys_fail_before_any_capture() {
    let mut scene = load("cyclic-keys");
    let rig = scene.find_object("Rig").unwrap();
    let rig_before = scene.rig(rig).unwrap();

    let failure = apply_pose_as_rest(&mut scene, &RebakeConfig::default()).expect_err("cycle");
    assert_eq!(failure.step, RebakeStep::CapturingBaselines);
    assert_eq!(failure.mesh.as_deref(), Some("Loop"));
    assert_eq!(
        failure.error,
        RebakeError::CyclicShapeKey {
            mesh: "Loop".into(),
            cycle: vec!["A".into(), "B".into(), "A".into()],
        }
    );
    assert_eq!(scene.stats().evaluations, 0);
    assert_eq!(scene.stats().duplicates, 0);
    assert_eq!(scene.rig(rig).unwrap(), rig_before);
    assert!(failure.to_string().contains("A -> B -> A"));
}

#[test]
fn vertex_count_change_leaves_rest_pose_alone() {
    let mut scene = load("decimate-before-armature");
    let rig = scene.find_object("Rig").unwrap();
    let blob = scene.find_object("Blob").unwrap();
    let rig_before = scene.rig(rig).unwrap();
    let data_before = scene.mesh_data(blob).unwrap();
    let mods_before = scene.modifiers(blob).unwrap();

    let mut rebaker = Rebaker::new(&mut scene);
    let failure = rebaker.run().expect_err("topology changes");
    assert!(matches!(rebaker.state(), RebakeState::Failed(_)));
    assert_eq!(
        failure.step,
        RebakeStep::Rebaking {
            mesh: "Blob".into()
        }
    );
    assert_eq!(
        failure.error,
        RebakeError::TopologyMismatch {
            mesh: "Blob".into(),
            shape_key: None,
            expected: 4,
            actual: 2,
        }
    );

    assert_eq!(scene.rig(rig).unwrap(), rig_before);
    assert_eq!(scene.mesh_data(blob).unwrap(), data_before);
    assert_eq!(scene.modifiers(blob).unwrap(), mods_before);
    assert_eq!(scene.stats().live_copies(), 0);
}

#[test]
fn mismatched_key_length_is_caught_up_front() {
    let mut scene = load("two-bone-smile");
    let face = scene.find_object("Face").unwrap();
    scene
        .mesh_object_mut(face)
        .unwrap()
        .data
        .shape_key_mut("smile")
        .unwrap()
        .deltas
        .push(Vec3::ZERO);

    let failure = apply_pose_as_rest(&mut scene, &RebakeConfig::default()).expect_err("bad key");
    assert_eq!(failure.step, RebakeStep::CapturingBaselines);
    assert!(matches!(
        failure.error,
        RebakeError::TopologyMismatch { ref shape_key, expected: 6, actual: 7, .. }
            if shape_key.as_deref() == Some("smile")
    ));
    assert_eq!(scene.stats().evaluations, 0);
}

fn with_stale_driver() -> MemoryScene {
    let mut scene = load("two-bone-smile");
    let face = scene.find_object("Face").unwrap();
    scene
        .mesh_object_mut(face)
        .unwrap()
        .drivers
        .push(Driver::new(DataPath::shape_key_value("frown"), "0.0"));
    scene
}

#[test]
fn missing_driver_key_is_a_warning() {
    let mut scene = with_stale_driver();
    let report = apply_pose_as_rest(&mut scene, &RebakeConfig::default()).expect("partial success");

    assert!(!report.is_clean());
    assert_eq!(
        report.warnings,
        vec![RebakeError::DriverRelink {
            mesh: "Face".into(),
            shape_key: "frown".into(),
        }]
    );
    assert!(report.warnings[0].is_warning_level());
    assert_eq!(report.mesh("Face").map(|m| m.drivers_relinked), Some(1));
    assert!(report.summary().ends_with("(1 warnings)"));
}

#[test]
fn missing_driver_key_can_be_fatal() {
    let mut scene = with_stale_driver();
    let rig = scene.find_object("Rig").unwrap();
    let config: RebakeConfig =
        posebake_test_fixtures::configs::load("strict-drivers").expect("load config fixture");

    let failure = apply_pose_as_rest(&mut scene, &config).expect_err("strict relink");
    assert_eq!(
        failure.step,
        RebakeStep::RelinkingDrivers {
            mesh: "Face".into()
        }
    );
    assert!(matches!(failure.error, RebakeError::DriverRelink { .. }));
    // Past the irreversible step: the rest pose has already moved.
    assert!(scene.rig(rig).unwrap().is_at_rest(1e-6));
    assert_eq!(scene.stats().live_copies(), 0);
}

#[test]
fn driver_relinking_can_be_skipped() {
    let mut scene = load("two-bone-smile");
    let face = scene.find_object("Face").unwrap();
    let config = RebakeConfig {
        relink_drivers: false,
        ..RebakeConfig::default()
    };
    let mut rebaker = Rebaker::with_config(&mut scene, config);
    let report = rebaker.run().expect("rebake succeeds");
    assert!(!rebaker
        .history()
        .iter()
        .any(|s| matches!(s, RebakeState::Running(RebakeStep::RelinkingDrivers { .. }))));
    assert_eq!(report.mesh("Face").map(|m| m.drivers_relinked), Some(0));
    assert!(scene.drivers(face).unwrap().is_empty());
}

/// A host whose commits always fail; everything else goes to the wrapped scene.
struct RejectingCommit(MemoryScene);

impl SceneHost for RejectingCommit {
    fn objects(&self) -> Vec<ObjectId> {
        self.0.objects()
    }
    fn object_name(&self, id: ObjectId) -> Result<String, HostError> {
        self.0.object_name(id)
    }
    fn object_kind(&self, id: ObjectId) -> Result<ObjectKind, HostError> {
        self.0.object_kind(id)
    }
    fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.0.find_object(name)
    }
    fn modifiers(&self, id: ObjectId) -> Result<Vec<Modifier>, HostError> {
        self.0.modifiers(id)
    }
    fn mesh_data(&self, id: ObjectId) -> Result<MeshData, HostError> {
        self.0.mesh_data(id)
    }
    fn drivers(&self, id: ObjectId) -> Result<Vec<Driver>, HostError> {
        self.0.drivers(id)
    }
    fn rig(&self, id: ObjectId) -> Result<Rig, HostError> {
        self.0.rig(id)
    }
    fn editor_state(&self) -> EditorState {
        self.0.editor_state()
    }
    fn target_armature(&self) -> Option<ObjectId> {
        self.0.target_armature()
    }
    fn evaluate(&mut self, id: ObjectId) -> Result<Vec<Vec3>, HostError> {
        self.0.evaluate(id)
    }
    fn duplicate_object(&mut self, id: ObjectId, name_suffix: &str) -> Result<ObjectId, HostError> {
        self.0.duplicate_object(id, name_suffix)
    }
    fn delete_object(&mut self, id: ObjectId) -> Result<(), HostError> {
        self.0.delete_object(id)
    }
    fn set_shape_key_influence(
        &mut self,
        id: ObjectId,
        key: &str,
        value: f32,
        mute: bool,
    ) -> Result<(), HostError> {
        self.0.set_shape_key_influence(id, key, value, mute)
    }
    fn clear_shape_keys(&mut self, id: ObjectId) -> Result<(), HostError> {
        self.0.clear_shape_keys(id)
    }
    fn add_shape_key(&mut self, id: ObjectId, key: ShapeKey) -> Result<(), HostError> {
        self.0.add_shape_key(id, key)
    }
    fn set_vertices(&mut self, id: ObjectId, vertices: &[Vec3]) -> Result<(), HostError> {
        self.0.set_vertices(id, vertices)
    }
    fn set_modifiers(&mut self, id: ObjectId, modifiers: Vec<Modifier>) -> Result<(), HostError> {
        self.0.set_modifiers(id, modifiers)
    }
    fn remove_modifier(&mut self, id: ObjectId, name: &str) -> Result<Modifier, HostError> {
        self.0.remove_modifier(id, name)
    }
    fn insert_modifier(
        &mut self,
        id: ObjectId,
        index: usize,
        modifier: Modifier,
    ) -> Result<(), HostError> {
        self.0.insert_modifier(id, index, modifier)
    }
    fn commit_mesh_data(&mut self, target: ObjectId, _source: ObjectId) -> Result<ObjectId, HostError> {
        Err(HostError::Evaluation {
            object: self.0.object_name(target)?,
            reason: "commit rejected".into(),
        })
    }
    fn apply_pose_as_rest(&mut self, rig: ObjectId) -> Result<(), HostError> {
        self.0.apply_pose_as_rest(rig)
    }
    fn add_driver(&mut self, id: ObjectId, driver: Driver) -> Result<(), HostError> {
        self.0.add_driver(id, driver)
    }
    fn clear_drivers(&mut self, id: ObjectId) -> Result<(), HostError> {
        self.0.clear_drivers(id)
    }
    fn restore_editor_state(&mut self, state: &EditorState) -> Result<(), HostError> {
        self.0.restore_editor_state(state)
    }
}

#[test]
fn failed_commit_keeps_target_intact() {
    let scene = load("two-bone-smile");
    let face = scene.find_object("Face").unwrap();
    let rig = scene.find_object("Rig").unwrap();
    let mods_before = scene.modifiers(face).unwrap();
    let data_before = scene.mesh_data(face).unwrap();
    let drivers_before = scene.drivers(face).unwrap();
    let rig_before = scene.rig(rig).unwrap();

    let mut host = RejectingCommit(scene);
    let failure = apply_pose_as_rest(&mut host, &RebakeConfig::default()).expect_err("commit fails");
    assert_eq!(
        failure.step,
        RebakeStep::Rebaking {
            mesh: "Face".into()
        }
    );
    assert!(matches!(failure.error, RebakeError::Host(HostError::Evaluation { .. })));

    let scene = host.0;
    assert_eq!(scene.modifiers(face).unwrap(), mods_before);
    assert_eq!(scene.mesh_data(face).unwrap(), data_before);
    assert_eq!(scene.drivers(face).unwrap(), drivers_before);
    assert_eq!(scene.rig(rig).unwrap(), rig_before);
    assert_eq!(scene.stats().live_copies(), 0);
}
