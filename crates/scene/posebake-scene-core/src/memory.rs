//! MemoryScene: a self-contained scene graph implementing the host seam.

use glam::Vec3;
use indexmap::IndexMap;
use log::debug;
use posebake_api_core::{
    Driver, EditorState, HostError, IdAllocator, MeshData, Modifier, ObjectId, ObjectKind, Rig,
    SceneHost, ShapeKey, Transform,
};

use crate::eval::evaluate_mesh;

/// How [`MemoryScene::commit_mesh_data`](SceneHost::commit_mesh_data) hands data to the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommitPolicy {
    /// Swap data blocks; the target keeps its identity.
    #[default]
    SwapData,
    /// Build a new object with the target's name and stack, then delete the
    /// target. References to the old id held elsewhere are not rewritten.
    Recreate,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshObject {
    pub data: MeshData,
    pub modifiers: Vec<Modifier>,
    pub drivers: Vec<Driver>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectBody {
    Mesh(MeshObject),
    Armature(Rig),
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub body: ObjectBody,
}

/// Counters tests use to check side effects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub evaluations: usize,
    pub duplicates: usize,
    pub deletions: usize,
}

impl SceneStats {
    /// Duplicates that have not been deleted again.
    pub fn live_copies(&self) -> isize {
        self.duplicates as isize - self.deletions as isize
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryScene {
    objects: IndexMap<ObjectId, SceneObject>,
    ids: IdAllocator,
    editor: EditorState,
    target_armature: Option<ObjectId>,
    commit_policy: CommitPolicy,
    stats: SceneStats,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    pub fn add_mesh(&mut self, name: &str, mut data: MeshData) -> ObjectId {
        if data.name.is_empty() {
            data.name = name.to_string();
        }
        self.insert(
            name,
            ObjectBody::Mesh(MeshObject {
                data,
                ..Default::default()
            }),
        )
    }

    pub fn add_armature(&mut self, name: &str, rig: Rig) -> ObjectId {
        self.insert(name, ObjectBody::Armature(rig))
    }

    pub fn add_empty(&mut self, name: &str) -> ObjectId {
        self.insert(name, ObjectBody::Empty)
    }

    fn insert(&mut self, name: &str, body: ObjectBody) -> ObjectId {
        let id = self.ids.alloc_object();
        let name = self.unique_name(name);
        self.objects.insert(id, SceneObject { name, body });
        id
    }

    fn unique_name(&self, base: &str) -> String {
        let taken = |n: &str| self.objects.values().any(|o| o.name == n);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base}.{i:03}"))
            .find(|n| !taken(n))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    pub fn set_active(&mut self, id: Option<ObjectId>, mode: posebake_api_core::InteractionMode) {
        self.editor = EditorState { mode, active: id };
    }

    pub fn set_target_armature(&mut self, id: Option<ObjectId>) {
        self.target_armature = id;
    }

    pub fn mesh_object(&self, id: ObjectId) -> Option<&MeshObject> {
        match &self.objects.get(&id)?.body {
            ObjectBody::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn mesh_object_mut(&mut self, id: ObjectId) -> Option<&mut MeshObject> {
        match &mut self.objects.get_mut(&id)?.body {
            ObjectBody::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn rig_ref(&self, id: ObjectId) -> Option<&Rig> {
        match &self.objects.get(&id)?.body {
            ObjectBody::Armature(r) => Some(r),
            _ => None,
        }
    }

    pub fn rig_mut(&mut self, id: ObjectId) -> Option<&mut Rig> {
        match &mut self.objects.get_mut(&id)?.body {
            ObjectBody::Armature(r) => Some(r),
            _ => None,
        }
    }

    /// Set a bone's pose override. Returns false if the rig or bone is unknown.
    pub fn pose_bone(&mut self, rig: ObjectId, bone: &str, pose: Transform) -> bool {
        match self.rig_mut(rig).and_then(|r| r.bone_mut(bone)) {
            Some(b) => {
                b.pose = pose;
                true
            }
            None => false,
        }
    }

    pub fn push_modifier(&mut self, id: ObjectId, modifier: Modifier) -> Result<(), HostError> {
        self.mesh_mut(id)?.modifiers.push(modifier);
        Ok(())
    }

    fn mesh(&self, id: ObjectId) -> Result<&MeshObject, HostError> {
        let obj = self.objects.get(&id).ok_or(HostError::UnknownObject(id))?;
        match &obj.body {
            ObjectBody::Mesh(m) => Ok(m),
            _ => Err(HostError::WrongKind {
                name: obj.name.clone(),
                expected: ObjectKind::Mesh,
            }),
        }
    }

    fn mesh_mut(&mut self, id: ObjectId) -> Result<&mut MeshObject, HostError> {
        let obj = self.objects.get_mut(&id).ok_or(HostError::UnknownObject(id))?;
        match &mut obj.body {
            ObjectBody::Mesh(m) => Ok(m),
            _ => Err(HostError::WrongKind {
                name: obj.name.clone(),
                expected: ObjectKind::Mesh,
            }),
        }
    }

    fn name_of(&self, id: ObjectId) -> String {
        self.objects
            .get(&id)
            .map(|o| o.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl SceneHost for MemoryScene {
    fn objects(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    fn object_name(&self, id: ObjectId) -> Result<String, HostError> {
        self.objects
            .get(&id)
            .map(|o| o.name.clone())
            .ok_or(HostError::UnknownObject(id))
    }

    fn object_kind(&self, id: ObjectId) -> Result<ObjectKind, HostError> {
        let obj = self.objects.get(&id).ok_or(HostError::UnknownObject(id))?;
        Ok(match obj.body {
            ObjectBody::Mesh(_) => ObjectKind::Mesh,
            ObjectBody::Armature(_) => ObjectKind::Armature,
            ObjectBody::Empty => ObjectKind::Empty,
        })
    }

    fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, o)| o.name == name)
            .map(|(id, _)| *id)
    }

    fn modifiers(&self, id: ObjectId) -> Result<Vec<Modifier>, HostError> {
        Ok(self.mesh(id)?.modifiers.clone())
    }

    fn mesh_data(&self, id: ObjectId) -> Result<MeshData, HostError> {
        Ok(self.mesh(id)?.data.clone())
    }

    fn drivers(&self, id: ObjectId) -> Result<Vec<Driver>, HostError> {
        Ok(self.mesh(id)?.drivers.clone())
    }

    fn rig(&self, id: ObjectId) -> Result<Rig, HostError> {
        self.rig_ref(id).cloned().ok_or_else(|| match self.objects.get(&id) {
            Some(o) => HostError::WrongKind {
                name: o.name.clone(),
                expected: ObjectKind::Armature,
            },
            None => HostError::UnknownObject(id),
        })
    }

    fn editor_state(&self) -> EditorState {
        self.editor.clone()
    }

    fn target_armature(&self) -> Option<ObjectId> {
        self.target_armature
    }

    fn evaluate(&mut self, id: ObjectId) -> Result<Vec<Vec3>, HostError> {
        self.stats.evaluations += 1;
        let name = self.name_of(id);
        let mesh = self.mesh(id)?;
        evaluate_mesh(&name, mesh, |rig| self.rig_ref(rig))
    }

    fn duplicate_object(&mut self, id: ObjectId, name_suffix: &str) -> Result<ObjectId, HostError> {
        let source = self.objects.get(&id).ok_or(HostError::UnknownObject(id))?;
        let mut body = source.body.clone();
        let name = format!("{}_{}", source.name, name_suffix);
        if let ObjectBody::Mesh(m) = &mut body {
            m.data.name = format!("{}_{}", m.data.name, name_suffix);
        }
        let copy = self.insert(&name, body);
        self.stats.duplicates += 1;
        debug!("duplicated {} as {}", self.name_of(id), self.name_of(copy));
        Ok(copy)
    }

    fn delete_object(&mut self, id: ObjectId) -> Result<(), HostError> {
        let removed = self
            .objects
            .shift_remove(&id)
            .ok_or(HostError::UnknownObject(id))?;
        if self.editor.active == Some(id) {
            self.editor.active = None;
        }
        if self.target_armature == Some(id) {
            self.target_armature = None;
        }
        self.stats.deletions += 1;
        debug!("deleted {}", removed.name);
        Ok(())
    }

    fn set_shape_key_influence(
        &mut self,
        id: ObjectId,
        key: &str,
        value: f32,
        mute: bool,
    ) -> Result<(), HostError> {
        let name = self.name_of(id);
        let block = self
            .mesh_mut(id)?
            .data
            .shape_key_mut(key)
            .ok_or_else(|| HostError::UnknownShapeKey {
                object: name,
                key: key.to_string(),
            })?;
        block.value = value;
        block.mute = mute;
        Ok(())
    }

    fn clear_shape_keys(&mut self, id: ObjectId) -> Result<(), HostError> {
        let mesh = self.mesh_mut(id)?;
        mesh.data.shape_keys.clear();
        mesh.drivers.retain(|d| d.shape_key().is_none());
        Ok(())
    }

    fn add_shape_key(&mut self, id: ObjectId, key: ShapeKey) -> Result<(), HostError> {
        let name = self.name_of(id);
        let mesh = self.mesh_mut(id)?;
        if key.deltas.len() != mesh.data.vertex_count() {
            return Err(HostError::VertexCount {
                object: name,
                expected: mesh.data.vertex_count(),
                actual: key.deltas.len(),
            });
        }
        if mesh.data.shape_key(&key.name).is_some() {
            return Err(HostError::DuplicateShapeKey {
                object: name,
                key: key.name,
            });
        }
        mesh.data.shape_keys.push(key);
        Ok(())
    }

    fn set_vertices(&mut self, id: ObjectId, vertices: &[Vec3]) -> Result<(), HostError> {
        let name = self.name_of(id);
        let mesh = self.mesh_mut(id)?;
        if mesh.data.has_shape_keys() && vertices.len() != mesh.data.vertex_count() {
            return Err(HostError::VertexCount {
                object: name,
                expected: mesh.data.vertex_count(),
                actual: vertices.len(),
            });
        }
        mesh.data.vertices = vertices.to_vec();
        Ok(())
    }

    fn set_modifiers(&mut self, id: ObjectId, modifiers: Vec<Modifier>) -> Result<(), HostError> {
        self.mesh_mut(id)?.modifiers = modifiers;
        Ok(())
    }

    fn remove_modifier(&mut self, id: ObjectId, name: &str) -> Result<Modifier, HostError> {
        let object = self.name_of(id);
        let mesh = self.mesh_mut(id)?;
        let index = mesh
            .modifiers
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| HostError::UnknownModifier {
                object,
                modifier: name.to_string(),
            })?;
        Ok(mesh.modifiers.remove(index))
    }

    fn insert_modifier(
        &mut self,
        id: ObjectId,
        index: usize,
        modifier: Modifier,
    ) -> Result<(), HostError> {
        let mesh = self.mesh_mut(id)?;
        let index = index.min(mesh.modifiers.len());
        mesh.modifiers.insert(index, modifier);
        Ok(())
    }

    fn commit_mesh_data(&mut self, target: ObjectId, source: ObjectId) -> Result<ObjectId, HostError> {
        // Validate both ends before touching anything.
        self.mesh(target)?;
        self.mesh(source)?;

        let src = self.mesh_mut(source)?;
        let mut data = std::mem::take(&mut src.data);
        let drivers = std::mem::take(&mut src.drivers);

        match self.commit_policy {
            CommitPolicy::SwapData => {
                let dst = self.mesh_mut(target)?;
                data.name = dst.data.name.clone();
                let old_data = std::mem::replace(&mut dst.data, data);
                let old_drivers = std::mem::replace(&mut dst.drivers, drivers);
                let src = self.mesh_mut(source)?;
                src.data = old_data;
                src.drivers = old_drivers;
                debug!("swapped mesh data into {}", self.name_of(target));
                Ok(target)
            }
            CommitPolicy::Recreate => {
                let old = self
                    .objects
                    .shift_remove(&target)
                    .ok_or(HostError::UnknownObject(target))?;
                let modifiers = match old.body {
                    ObjectBody::Mesh(m) => {
                        data.name = m.data.name;
                        m.modifiers
                    }
                    _ => Vec::new(),
                };
                let id = self.ids.alloc_object();
                self.objects.insert(
                    id,
                    SceneObject {
                        name: old.name,
                        body: ObjectBody::Mesh(MeshObject {
                            data,
                            modifiers,
                            drivers,
                        }),
                    },
                );
                if self.editor.active == Some(target) {
                    self.editor.active = Some(id);
                }
                debug!("recreated {} as {}", self.name_of(id), id);
                Ok(id)
            }
        }
    }

    fn apply_pose_as_rest(&mut self, rig: ObjectId) -> Result<(), HostError> {
        let name = self.name_of(rig);
        let r = self.rig_mut(rig).ok_or(HostError::WrongKind {
            name,
            expected: ObjectKind::Armature,
        })?;
        r.apply_pose_as_rest();
        Ok(())
    }

    fn add_driver(&mut self, id: ObjectId, driver: Driver) -> Result<(), HostError> {
        let name = self.name_of(id);
        let mesh = self.mesh_mut(id)?;
        if let Some(key) = driver.shape_key() {
            if mesh.data.shape_key(key).is_none() {
                return Err(HostError::UnknownShapeKey {
                    object: name,
                    key: key.to_string(),
                });
            }
        }
        mesh.drivers.push(driver);
        Ok(())
    }

    fn clear_drivers(&mut self, id: ObjectId) -> Result<(), HostError> {
        self.mesh_mut(id)?.drivers.clear();
        Ok(())
    }

    fn restore_editor_state(&mut self, state: &EditorState) -> Result<(), HostError> {
        if let Some(active) = state.active {
            if !self.objects.contains_key(&active) {
                return Err(HostError::UnknownObject(active));
            }
        }
        self.editor = state.clone();
        Ok(())
    }
}
