//! Cache of factorized gradient-domain systems.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use super::GradientSystem;
use crate::error::Result;
use crate::mesh::MeshSnapshot;

/// Factorized systems keyed by a caller-chosen mesh identity.
///
/// The cache never inspects meshes: the caller must pick keys that change
/// whenever the connectivity or rest shape changes (for instance an object id
/// plus an edit counter), or call [`invalidate`](Self::invalidate). It is not
/// synchronized; share it behind a lock if several threads stroke at once.
#[derive(Debug)]
pub struct MatrixCache<K> {
    systems: HashMap<K, Arc<GradientSystem>>,
}

impl<K> Default for MatrixCache<K> {
    fn default() -> Self {
        Self {
            systems: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> MatrixCache<K> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// True if a system is cached under `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.systems.contains_key(key)
    }

    /// The system cached under `key`, if any.
    pub fn get(&self, key: &K) -> Option<Arc<GradientSystem>> {
        self.systems.get(key).cloned()
    }

    /// The system under `key`, building it from `mesh` on a miss.
    ///
    /// A failed build leaves the cache unchanged.
    pub fn get_or_build(&mut self, key: K, mesh: &MeshSnapshot) -> Result<Arc<GradientSystem>> {
        if let Some(system) = self.systems.get(&key) {
            return Ok(Arc::clone(system));
        }
        log::debug!("building gradient-domain system for {} vertices", mesh.num_vertices());
        let system = Arc::new(GradientSystem::new(mesh)?);
        self.systems.insert(key, Arc::clone(&system));
        Ok(system)
    }

    /// Drop the system under `key`. Returns whether one was cached.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.systems.remove(key).is_some()
    }

    /// Drop every cached system.
    pub fn clear(&mut self) {
        self.systems.clear();
    }
}
