//! System execution contract
//!
//! Systems contain the per-frame logic that operates on entities and components.
//! The [`World`](crate::World) runs them in registration order and forwards
//! component-added/removed notifications for the kinds they watch.

use std::any::Any;

use crate::component::ComponentKind;
use crate::entity::{Entities, EntityId};

pub trait System: Any {
    /// Name of this system for debugging
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Component kinds this system wants added/removed notifications for.
    fn watches(&self) -> &[ComponentKind] {
        &[]
    }

    /// A watched component was attached to `id`. Runs synchronously inside the call that
    /// attached it, so the component is visible in the same frame.
    fn component_added(&mut self, _kind: ComponentKind, _id: EntityId, _entities: &mut Entities) {}

    /// A watched component is about to be detached from `id` (or `id` is being removed).
    /// The entity and the component are still present.
    fn component_removed(&mut self, _kind: ComponentKind, _id: EntityId, _entities: &mut Entities) {}

    /// Per-frame work. `dt` is the elapsed time in seconds.
    fn update(&mut self, entities: &mut Entities, dt: f32);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
