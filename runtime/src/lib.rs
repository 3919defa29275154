pub mod component;
pub mod entity;
pub mod registry;
pub mod rigid_body;
pub mod system;
pub mod task;
pub mod world;

pub use component::{
    BodyState, CollisionReporterComponent, Component, ComponentKind, QuadComponent,
    RigidBodyComponent, SceneComponent, ScriptComponent, ScriptRef,
};
pub use entity::{Entities, Entity, EntityId};
pub use registry::{BuildError, ComponentRegistry, EntityBuilder, EntityDef, euler_xyz, merge};
pub use rigid_body::{LOOK_AT_CAMERA_SCRIPT, RigidBodySystem};
pub use system::System;
pub use task::{Continuation, Task, TaskError};
pub use world::{Subscription, World};

// Re-export the physics bridge so callers only need this crate.
pub use physics;
