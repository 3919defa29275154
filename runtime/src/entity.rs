//! Entities and the generational storage that owns them.
//!
//! An entity is an id, a name, a transform, and a bag of typed components (at most one per
//! [`ComponentKind`]). Ids are generational: once an entity is removed, its old id never
//! resolves again, even after the slot is reused.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::{UnitQuaternion, Vector3};
use physics::{Owner, pack_owner, unpack_owner};

use crate::component::{
    CollisionReporterComponent, Component, ComponentKind, QuadComponent, RigidBodyComponent,
    SceneComponent, ScriptComponent,
};

/// Generational entity id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Id of an entity that hasn't been added to a world yet.
    pub const DETACHED: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Back-reference tag stored on native bodies.
    pub fn owner(&self) -> Owner {
        pack_owner(self.index, self.generation)
    }

    pub fn from_owner(owner: Owner) -> Option<Self> {
        let (index, generation) = unpack_owner(owner)?;
        Some(Self { index, generation })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}, gen: {})", self.index, self.generation)
    }
}

pub struct Entity {
    id: EntityId,
    name: String,
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
    components: BTreeMap<ComponentKind, Component>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("position", &self.position)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::DETACHED,
            name: name.into(),
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            components: BTreeMap::new(),
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.insert_component(component);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Vector3::new(x, y, z);
    }

    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.components.contains_key(&kind)
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.get(&kind)
    }

    pub fn component_mut(&mut self, kind: ComponentKind) -> Option<&mut Component> {
        self.components.get_mut(&kind)
    }

    /// Kinds attached to this entity, in ascending kind order.
    pub fn component_kinds(&self) -> Vec<ComponentKind> {
        self.components.keys().copied().collect()
    }

    /// Attach a component, returning the one of the same kind it replaced.
    pub(crate) fn insert_component(&mut self, component: Component) -> Option<Component> {
        self.components.insert(component.kind(), component)
    }

    pub(crate) fn remove_component(&mut self, kind: ComponentKind) -> Option<Component> {
        self.components.remove(&kind)
    }

    pub fn rigid_body(&self) -> Option<&RigidBodyComponent> {
        match self.components.get(&ComponentKind::RigidBody)? {
            Component::RigidBody(c) => Some(c),
            _ => None,
        }
    }

    pub fn rigid_body_mut(&mut self) -> Option<&mut RigidBodyComponent> {
        match self.components.get_mut(&ComponentKind::RigidBody)? {
            Component::RigidBody(c) => Some(c),
            _ => None,
        }
    }

    pub fn scene(&self) -> Option<&SceneComponent> {
        match self.components.get(&ComponentKind::Scene)? {
            Component::Scene(c) => Some(c),
            _ => None,
        }
    }

    pub fn quad(&self) -> Option<&QuadComponent> {
        match self.components.get(&ComponentKind::Quad)? {
            Component::Quad(c) => Some(c),
            _ => None,
        }
    }

    pub fn quad_mut(&mut self) -> Option<&mut QuadComponent> {
        match self.components.get_mut(&ComponentKind::Quad)? {
            Component::Quad(c) => Some(c),
            _ => None,
        }
    }

    pub fn scripts(&self) -> Option<&ScriptComponent> {
        match self.components.get(&ComponentKind::Script)? {
            Component::Script(c) => Some(c),
            _ => None,
        }
    }

    pub fn collision_reporter(&self) -> Option<&CollisionReporterComponent> {
        match self.components.get(&ComponentKind::CollisionReporter)? {
            Component::CollisionReporter(c) => Some(c),
            _ => None,
        }
    }

    pub fn collision_reporter_mut(&mut self) -> Option<&mut CollisionReporterComponent> {
        match self.components.get_mut(&ComponentKind::CollisionReporter)? {
            Component::CollisionReporter(c) => Some(c),
            _ => None,
        }
    }

    /// Whether a script with this path is attached.
    pub fn has_script(&self, path: &str) -> bool {
        self.scripts().is_some_and(|s| s.get(path).is_some())
    }
}

struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Generational slot storage for entities.
///
/// Iteration is in ascending slot index order, which is also creation order until slots
/// start being reused.
#[derive(Default)]
pub struct Entities {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store `entity`, assigning it a fresh id.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entity: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = EntityId {
            index,
            generation: slot.generation,
        };
        entity.id = id;
        slot.entity = Some(entity);
        self.len += 1;
        id
    }

    /// Take an entity out, invalidating its id.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entity = slot.entity.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(entity)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entity.as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entity.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter_map(|s| s.entity.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.slots.iter_mut().filter_map(|s| s.entity.as_mut())
    }

    /// Entities carrying a component of `kind`, in ascending index order.
    pub fn with_component(&self, kind: ComponentKind) -> impl Iterator<Item = &Entity> {
        self.iter().filter(move |e| e.has_component(kind))
    }
}
