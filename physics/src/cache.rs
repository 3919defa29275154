/*!
Shape cache: amortizes native shape construction across entities sharing geometry.

Two tables live here:
- `shared`: canonical cache key -> shape. Construction happens at most once per key for the
  lifetime of the cache and entries are never evicted; hundreds of identical bodies
  (e.g. every `box_0.5_1_0.5` character) share one native shape.
- `instances`: owner tag -> shape, for concave/convex/heightfield geometry that is unique
  to one entity. These are released explicitly when the owner goes away.

Bodies keep their own reference to the shape they were built with, so releasing an instance
entry never invalidates a live collider.
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rapier3d::prelude::SharedShape;

use crate::owner::Owner;
use crate::types::Vec3;

/// Opaque, cheaply clonable reference to a native collision shape.
///
/// Two handles are "the same shape" when they point at the same native allocation,
/// see [`ShapeHandle::ptr_eq`].
#[derive(Clone)]
pub struct ShapeHandle {
    shape: SharedShape,
    local_scale: Option<Vec3>,
}

impl ShapeHandle {
    pub(crate) fn new(shape: SharedShape) -> Self {
        Self {
            shape,
            local_scale: None,
        }
    }

    pub(crate) fn with_local_scale(mut self, scale: Vec3) -> Self {
        self.local_scale = Some(scale);
        self
    }

    pub fn shared_shape(&self) -> &SharedShape {
        &self.shape
    }

    /// Per-axis sample spacing, for grid shapes (heightfields).
    pub fn local_scale(&self) -> Option<Vec3> {
        self.local_scale
    }

    pub fn ptr_eq(&self, other: &ShapeHandle) -> bool {
        Arc::ptr_eq(&self.shape.0, &other.shape.0)
    }

    /// Number of live references (cache entries plus colliders built from it).
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.shape.0)
    }
}

impl fmt::Debug for ShapeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShapeHandle({:?})", self.shape.shape_type())
    }
}

/// Hit/miss counters for diagnostics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
pub struct ShapeCache {
    shared: HashMap<String, ShapeHandle>,
    instances: HashMap<Owner, ShapeHandle>,
    stats: CacheStats,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a shared shape, counting the hit or miss.
    pub fn get(&mut self, key: &str) -> Option<ShapeHandle> {
        match self.shared.get(key) {
            Some(handle) => {
                self.stats.hits += 1;
                Some(handle.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store a shared shape. An existing entry for `key` wins and is returned, so
    /// callers always end up holding the canonical handle.
    pub fn insert(&mut self, key: String, handle: ShapeHandle) -> ShapeHandle {
        self.shared.entry(key).or_insert(handle).clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.shared.contains_key(key)
    }

    /// Record the per-instance shape for `owner`, replacing (and returning) any previous one.
    pub fn insert_instance(&mut self, owner: Owner, handle: ShapeHandle) -> Option<ShapeHandle> {
        self.instances.insert(owner, handle)
    }

    pub fn instance(&self, owner: Owner) -> Option<&ShapeHandle> {
        self.instances.get(&owner)
    }

    /// Drop the per-instance shape for `owner`. Shared entries are untouched.
    pub fn release_instance(&mut self, owner: Owner) -> Option<ShapeHandle> {
        self.instances.remove(&owner)
    }

    pub fn shared_len(&self) -> usize {
        self.shared.len()
    }

    pub fn instance_len(&self) -> usize {
        self.instances.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
