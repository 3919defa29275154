//! World management
//!
//! The World owns all entities and systems. It hands out entity ids, answers "which
//! entities carry kind K", dispatches component notifications and drives the per-frame
//! update loop.
//!
//! Notification order for a component of kind K:
//! 1. systems watching K, in registration order
//! 2. `on_component_added(K, ..)` callbacks, in subscription order
//!
//! Both run synchronously inside `add_entity`/`add_component`.

use crate::component::{Component, ComponentKind};
use crate::entity::{Entities, Entity, EntityId};
use crate::system::System;

/// Handle returned by [`World::on_component_added`]; pass it to [`World::unsubscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Observer {
    subscription: Subscription,
    kind: ComponentKind,
    callback: Box<dyn FnMut(&mut Entity)>,
}

struct SystemEntry {
    name: String,
    system: Box<dyn System>,
}

#[derive(Default)]
pub struct World {
    entities: Entities,
    systems: Vec<SystemEntry>,
    observers: Vec<Observer>,
    next_subscription: u64,
    elapsed: f64,
    frame: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity and announce each of its components.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let kinds = entity.component_kinds();
        let id = self.entities.insert(entity);
        for kind in kinds {
            self.notify_added(kind, id);
        }
        id
    }

    /// Remove an entity. Watching systems see each component removed first.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let kinds = self.entities.get(id)?.component_kinds();
        for kind in kinds {
            self.notify_removed(kind, id);
        }
        self.entities.remove(id)
    }

    /// Attach `component` to `id`, replacing (and announcing the removal of) any component
    /// of the same kind. Returns false if the entity doesn't exist.
    pub fn add_component(&mut self, id: EntityId, component: Component) -> bool {
        let kind = component.kind();
        let Some(entity) = self.entities.get(id) else {
            return false;
        };
        if entity.has_component(kind) {
            self.notify_removed(kind, id);
        }
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        entity.insert_component(component);
        self.notify_added(kind, id);
        true
    }

    pub fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> Option<Component> {
        if !self.entities.get(id)?.has_component(kind) {
            return None;
        }
        self.notify_removed(kind, id);
        self.entities.get_mut(id)?.remove_component(kind)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    /// Entities carrying `kind`, in ascending index order.
    pub fn entities_with(&self, kind: ComponentKind) -> impl Iterator<Item = &Entity> {
        self.entities.with_component(kind)
    }

    /// Call `callback` every time a component of `kind` is attached.
    pub fn on_component_added(
        &mut self,
        kind: ComponentKind,
        callback: impl FnMut(&mut Entity) + 'static,
    ) -> Subscription {
        let subscription = Subscription(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push(Observer {
            subscription,
            kind,
            callback: Box::new(callback),
        });
        subscription
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o.subscription != subscription);
        before != self.observers.len()
    }

    pub fn add_system<S: System>(&mut self, system: S) {
        let name = system.name().to_string();
        self.add_system_named(system, &name);
    }

    pub fn add_system_named<S: System>(&mut self, system: S, name: &str) {
        log::debug!("registered system {name}");
        self.systems.push(SystemEntry {
            name: name.to_string(),
            system: Box::new(system),
        });
    }

    /// First registered system of type `T`.
    pub fn system<T: System>(&self) -> Option<&T> {
        self.systems
            .iter()
            .find_map(|s| s.system.as_any().downcast_ref::<T>())
    }

    pub fn system_mut<T: System>(&mut self) -> Option<&mut T> {
        self.systems
            .iter_mut()
            .find_map(|s| s.system.as_any_mut().downcast_mut::<T>())
    }

    pub fn system_named<T: System>(&self, name: &str) -> Option<&T> {
        self.systems
            .iter()
            .filter(|s| s.name == name)
            .find_map(|s| s.system.as_any().downcast_ref::<T>())
    }

    pub fn system_names(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().map(|s| s.name.as_str())
    }

    /// Run every system once, in registration order.
    pub fn update(&mut self, dt: f32) {
        for entry in &mut self.systems {
            entry.system.update(&mut self.entities, dt);
        }
        self.elapsed += f64::from(dt);
        self.frame += 1;
        log::trace!("frame {} done ({} entities)", self.frame, self.entities.len());
    }

    /// Seconds simulated so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of completed `update` calls.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn notify_added(&mut self, kind: ComponentKind, id: EntityId) {
        for entry in &mut self.systems {
            if entry.system.watches().contains(&kind) {
                entry.system.component_added(kind, id, &mut self.entities);
            }
        }
        for observer in &mut self.observers {
            if observer.kind != kind {
                continue;
            }
            // A system may have removed the component while handling it.
            match self.entities.get_mut(id) {
                Some(entity) if entity.has_component(kind) => (observer.callback)(entity),
                _ => break,
            }
        }
    }

    fn notify_removed(&mut self, kind: ComponentKind, id: EntityId) {
        for entry in &mut self.systems {
            if entry.system.watches().contains(&kind) {
                entry.system.component_removed(kind, id, &mut self.entities);
            }
        }
    }
}
