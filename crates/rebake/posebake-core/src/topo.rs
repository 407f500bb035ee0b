use hashbrown::HashMap;
use posebake_api_core::MeshData;
use std::collections::VecDeque;

use crate::error::{ConfigurationError, RebakeError};

/// Relative-key links among a mesh's non-reference keys.
///
/// Indices are positions in [`MeshData::relative_keys`]. `order` lists every key
/// after its parent, so a parent's capture is always available when a child is
/// re-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelativeKeyGraph {
    pub parent: Vec<Option<usize>>,
    pub order: Vec<usize>,
}

impl RelativeKeyGraph {
    pub fn build(mesh: &str, data: &MeshData) -> Result<Self, RebakeError> {
        let keys = data.relative_keys();
        let index: HashMap<&str, usize> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.name.as_str(), i))
            .collect();

        let mut parent = Vec::with_capacity(keys.len());
        for key in keys {
            let p = match data.parent_of(key) {
                None => None,
                Some(name) => Some(*index.get(name).ok_or_else(|| {
                    ConfigurationError::UnknownRelativeKey {
                        mesh: mesh.to_string(),
                        key: key.name.clone(),
                        relative_key: name.to_string(),
                    }
                })?),
            };
            parent.push(p);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
        for (i, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(i);
            }
        }

        let mut q: VecDeque<usize> = (0..keys.len()).filter(|i| parent[*i].is_none()).collect();
        let mut order = Vec::with_capacity(keys.len());
        while let Some(u) = q.pop_front() {
            order.push(u);
            q.extend(children[u].iter().copied());
        }

        if order.len() != keys.len() {
            let placed: Vec<bool> = (0..keys.len()).map(|i| order.contains(&i)).collect();
            let start = placed.iter().position(|p| !p).unwrap_or(0);
            let cycle = find_cycle(&parent, start)
                .into_iter()
                .map(|i| keys[i].name.clone())
                .collect();
            return Err(RebakeError::CyclicShapeKey {
                mesh: mesh.to_string(),
                cycle,
            });
        }

        Ok(Self { parent, order })
    }

    /// Parents of `i` from nearest to furthest.
    pub fn ancestors(&self, i: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = self.parent[i];
        while let Some(p) = cur {
            if out.contains(&p) || out.len() > self.parent.len() {
                break;
            }
            out.push(p);
            cur = self.parent[p];
        }
        out
    }
}

/// Follow parent links from `start` until a key repeats; return the loop,
/// closed with its first key.
fn find_cycle(parent: &[Option<usize>], start: usize) -> Vec<usize> {
    let mut path = vec![start];
    let mut cur = start;
    while let Some(p) = parent[cur] {
        if let Some(pos) = path.iter().position(|&n| n == p) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(p);
            return cycle;
        }
        path.push(p);
        cur = p;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use posebake_api_core::{ShapeKey, BASIS_KEY_NAME};

    fn mesh(keys: Vec<ShapeKey>) -> MeshData {
        let mut shape_keys = vec![ShapeKey::basis(BASIS_KEY_NAME, 1)];
        shape_keys.extend(keys);
        MeshData {
            name: "m".into(),
            vertices: vec![Vec3::ZERO],
            shape_keys,
            vertex_groups: vec![],
        }
    }

    fn key(name: &str, parent: Option<&str>) -> ShapeKey {
        let k = ShapeKey::new(name, vec![Vec3::ZERO]);
        match parent {
            Some(p) => k.with_relative_key(p),
            None => k,
        }
    }

    #[test]
    fn parents_come_first() {
        let data = mesh(vec![
            key("wide", Some("smile")),
            key("smile", Some(BASIS_KEY_NAME)),
            key("blink", None),
        ]);
        let g = RelativeKeyGraph::build("m", &data).unwrap();
        let pos = |i: usize| g.order.iter().position(|&n| n == i).unwrap();
        assert!(pos(1) < pos(0));
        assert_eq!(g.order.len(), 3);
        assert_eq!(g.ancestors(0), vec![1]);
        assert!(g.ancestors(2).is_empty());
    }

    #[test]
    fn two_key_cycle_is_reported() {
        let data = mesh(vec![key("A", Some("B")), key("B", Some("A"))]);
        let err = RelativeKeyGraph::build("m", &data).unwrap_err();
        assert_eq!(
            err,
            RebakeError::CyclicShapeKey {
                mesh: "m".into(),
                cycle: vec!["A".into(), "B".into(), "A".into()],
            }
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let data = mesh(vec![key("loop", Some("loop"))]);
        assert!(matches!(
            RelativeKeyGraph::build("m", &data),
            Err(RebakeError::CyclicShapeKey { cycle, .. }) if cycle == ["loop", "loop"]
        ));
    }

    #[test]
    fn unknown_parent_is_configuration_error() {
        let data = mesh(vec![key("A", Some("ghost"))]);
        assert!(matches!(
            RelativeKeyGraph::build("m", &data),
            Err(RebakeError::Configuration(ConfigurationError::UnknownRelativeKey { .. }))
        ));
    }
}
