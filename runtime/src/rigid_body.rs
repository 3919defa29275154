/*!
Rigid body system: bridges `rigidBody` components to the physics world.

Per component the lifecycle is `Pending -> ShapeReady -> Active`:
- A concave shape on an entity with a `scene` component waits for the scene's mesh task.
  The continuation only queues the extracted triangles; bodies are built on the simulation
  thread, at the end of the notification that attached the component or at the start of
  the next update.
- Every other shape is built synchronously, inside the component-added notification.
- A shape or body that can't be built leaves the component `Skipped` with the reason. The
  entity itself stays valid.

Per frame: step the physics world, copy each active body's pose onto its entity, fix up
camera-facing quads, then apply contact changes to `collisionReporter` components.

Removing the component (or its entity) cancels a pending mesh continuation, removes the
native body and releases the entity's per-instance shape. Shared shapes stay cached.
*/

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use physics::{
    BodyConfig, BodyError, ContactEvent, PhysicsSettings, PhysicsWorld, ShapeBuilder,
    ShapeDescription, Transform, Triangle, triangles_from_mesh,
};

use crate::component::{BodyState, ComponentKind};
use crate::entity::{Entities, EntityId};
use crate::system::System;
use crate::task::Continuation;

/// Script that makes a quad face the camera.
pub const LOOK_AT_CAMERA_SCRIPT: &str = "/scripts/built-in/look-at-camera.js";

type ReadyQueue = Rc<RefCell<Vec<(EntityId, Vec<Triangle>)>>>;

pub struct RigidBodySystem {
    physics: PhysicsWorld,
    shapes: ShapeBuilder,
    /// Mesh continuations of bodies still waiting for geometry.
    waiting: HashMap<EntityId, Continuation>,
    /// Triangles delivered by resolved mesh tasks, not yet turned into bodies.
    ready: ReadyQueue,
}

impl Default for RigidBodySystem {
    fn default() -> Self {
        Self::new(PhysicsSettings::default())
    }
}

impl RigidBodySystem {
    pub fn new(settings: PhysicsSettings) -> Self {
        Self {
            physics: PhysicsWorld::new(settings),
            shapes: ShapeBuilder::new(),
            waiting: HashMap::new(),
            ready: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    pub fn shapes(&self) -> &ShapeBuilder {
        &self.shapes
    }

    /// Bodies still waiting on a mesh.
    pub fn waiting_for_mesh(&self) -> usize {
        self.waiting.len()
    }

    fn body_added(&mut self, id: EntityId, entities: &mut Entities) {
        // A component copied from another entity still carries that entity's body.
        let Some(rb) = entities.get_mut(id).and_then(|e| e.rigid_body_mut()) else {
            return;
        };
        if !rb.is_pending() {
            log::debug!("{id} attached a rigid body in state {:?}, rebuilding", rb.state);
            rb.state = BodyState::Pending;
        }
        let Some(entity) = entities.get(id) else {
            return;
        };
        let Some(rb) = entity.rigid_body() else {
            return;
        };

        let mesh = match (rb.shape.needs_mesh(), entity.scene()) {
            (true, Some(scene)) => Some((scene.id.clone(), scene.mesh_task.clone())),
            _ => None,
        };

        match mesh {
            Some((scene_id, mesh_task)) => {
                let ready = Rc::clone(&self.ready);
                let continuation = mesh_task.then(move |mesh| {
                    ready.borrow_mut().push((id, triangles_from_mesh(mesh)));
                });
                // Already-loaded meshes queue their triangles right away.
                if !self.ready.borrow().iter().any(|(ready_id, _)| *ready_id == id) {
                    log::debug!("{id} waiting for mesh of scene `{scene_id}`");
                    self.waiting.insert(id, continuation);
                }
            }
            None => self.activate(id, entities),
        }
        self.build_ready(entities);
    }

    /// Turn queued mesh triangles into bodies.
    fn build_ready(&mut self, entities: &mut Entities) {
        let ready = std::mem::take(&mut *self.ready.borrow_mut());
        for (id, triangles) in ready {
            self.waiting.remove(&id);
            let Some(rb) = entities.get_mut(id).and_then(|e| e.rigid_body_mut()) else {
                log::warn!("mesh loaded for {id}, which no longer has a rigid body");
                continue;
            };
            if !rb.is_pending() {
                continue;
            }
            rb.shape = ShapeDescription::Concave { triangles };
            self.activate(id, entities);
        }
    }

    /// `ShapeReady -> Active` (or `Skipped`).
    fn activate(&mut self, id: EntityId, entities: &mut Entities) {
        let Some(entity) = entities.get_mut(id) else {
            return;
        };
        let transform = Transform::new(entity.position, entity.orientation);
        let Some(rb) = entity.rigid_body_mut() else {
            return;
        };
        rb.state = BodyState::ShapeReady;

        let config = BodyConfig {
            mass: rb.mass,
            friction: rb.friction,
            restitution: rb.restitution,
            allow_sleep: rb.allow_sleep,
            lock: rb.lock,
            transform,
            owner: id.owner(),
        };
        let result = self
            .shapes
            .build(&rb.shape, config.owner)
            .map_err(BodyError::from)
            .and_then(|shape| self.physics.add_body(&shape, &config));

        rb.state = match result {
            Ok(handle) => {
                log::debug!("{id} body active ({})", rb.shape.kind().name());
                BodyState::Active(handle)
            }
            Err(e) => {
                log::warn!("{id} left without a body: {e}");
                self.shapes.release(config.owner);
                BodyState::Skipped(e)
            }
        };
    }

    fn body_removed(&mut self, id: EntityId, entities: &mut Entities) {
        if let Some(continuation) = self.waiting.remove(&id) {
            continuation.cancel();
        }
        self.ready.borrow_mut().retain(|(ready_id, _)| *ready_id != id);

        if let Some(handle) = entities.get(id).and_then(|e| e.rigid_body()).and_then(|rb| rb.body()) {
            if let Err(e) = self.physics.remove_body(handle) {
                log::warn!("{id} body already gone: {e}");
            }
        }
        if let Some(rb) = entities.get_mut(id).and_then(|e| e.rigid_body_mut()) {
            rb.state = BodyState::Pending;
        }
        self.shapes.release(id.owner());

        // Stop events can't be resolved once the collider is gone.
        for entity in entities.iter_mut() {
            let own = entity.id() == id;
            if let Some(reporter) = entity.collision_reporter_mut() {
                if own {
                    reporter.contacts.clear();
                } else {
                    reporter.contacts.remove(&id);
                }
            }
        }
        log::debug!("{id} body released");
    }

    /// Physics is the position authority for every entity with an active body.
    fn sync_entities(&self, entities: &mut Entities) {
        for entity in entities.iter_mut() {
            let Some(handle) = entity.rigid_body().and_then(|rb| rb.body()) else {
                continue;
            };
            let Some(transform) = self.physics.body_transform(handle) else {
                continue;
            };
            entity.position = transform.translation;
            entity.orientation = transform.rotation;

            // Billboards were positioned earlier this frame; keep them on the body.
            if entity.has_script(LOOK_AT_CAMERA_SCRIPT) {
                let position = entity.position;
                if let Some(quad) = entity.quad_mut() {
                    quad.position = position;
                }
            }
        }
    }

    fn report_contacts(&mut self, entities: &mut Entities) {
        for event in self.physics.drain_contacts() {
            let (a, b, started) = match event {
                ContactEvent::Started(a, b) => (a, b, true),
                ContactEvent::Stopped(a, b) => (a, b, false),
            };
            let (Some(a), Some(b)) = (EntityId::from_owner(a), EntityId::from_owner(b)) else {
                continue;
            };
            for (me, other) in [(a, b), (b, a)] {
                let Some(reporter) = entities.get_mut(me).and_then(|e| e.collision_reporter_mut()) else {
                    continue;
                };
                if started {
                    reporter.contacts.insert(other);
                } else {
                    reporter.contacts.remove(&other);
                }
            }
        }
    }
}

impl System for RigidBodySystem {
    fn name(&self) -> &str {
        "rigid-body"
    }

    fn watches(&self) -> &[ComponentKind] {
        &[ComponentKind::RigidBody]
    }

    fn component_added(&mut self, _kind: ComponentKind, id: EntityId, entities: &mut Entities) {
        self.body_added(id, entities);
    }

    fn component_removed(&mut self, _kind: ComponentKind, id: EntityId, entities: &mut Entities) {
        self.body_removed(id, entities);
    }

    fn update(&mut self, entities: &mut Entities, dt: f32) {
        self.build_ready(entities);
        self.physics.step(dt);
        self.sync_entities(entities);
        self.report_contacts(entities);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{
        CollisionReporterComponent, Component, QuadComponent, RigidBodyComponent, SceneComponent,
        ScriptComponent, ScriptRef,
    };
    use crate::entity::Entity;
    use crate::task::Task;
    use crate::world::World;
    use nalgebra::Vector3;
    use physics::{Activation, AxisLock, Face, Lock, MeshGeometry, Point3, Quat, ShapeError, Vec3, Vec3Def};
    use std::collections::BTreeSet;

    const DT: f32 = 1.0 / 60.0;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn world() -> World {
        init_logger();
        let mut world = World::new();
        world.add_system(RigidBodySystem::new(PhysicsSettings::zero_gravity()));
        world
    }

    fn rigid_body(shape: ShapeDescription, mass: f32) -> Component {
        Component::RigidBody(RigidBodyComponent {
            shape,
            mass,
            ..RigidBodyComponent::default()
        })
    }

    fn unit_box() -> ShapeDescription {
        ShapeDescription::Cuboid {
            width: 0.5,
            height: 1.0,
            depth: 0.5,
        }
    }

    fn quad_mesh() -> MeshGeometry {
        MeshGeometry::new(
            vec![
                Point3::new(-1.0, 0.0, -1.0),
                Point3::new(1.0, 0.0, -1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(-1.0, 0.0, 1.0),
            ],
            vec![Face::Quad([0, 1, 2, 3])],
        )
    }

    fn concave_entity(task: &Task<MeshGeometry>) -> Entity {
        Entity::new("terrain")
            .with_component(rigid_body(ShapeDescription::Concave { triangles: vec![] }, 0.0))
            .with_component(Component::Scene(SceneComponent {
                id: "terrain.obj".into(),
                mesh_task: task.clone(),
            }))
    }

    fn system(world: &World) -> &RigidBodySystem {
        world.system::<RigidBodySystem>().unwrap()
    }

    fn body_of(world: &World, id: EntityId) -> Option<physics::BodyHandle> {
        world.entity(id)?.rigid_body()?.body()
    }

    fn contacts(world: &World, id: EntityId) -> BTreeSet<EntityId> {
        world
            .entity(id)
            .and_then(|e| e.collision_reporter())
            .map(|r| r.contacts.clone())
            .unwrap_or_default()
    }

    #[test]
    fn concave_body_waits_for_its_mesh() {
        let mut world = world();
        let task = Task::new();
        let id = world.add_entity(concave_entity(&task));

        for _ in 0..5 {
            world.update(DT);
            assert!(body_of(&world, id).is_none());
            assert_eq!(system(&world).physics().body_count(), 0);
        }
        assert_eq!(system(&world).waiting_for_mesh(), 1);

        task.resolve(quad_mesh()).unwrap();
        world.update(DT);

        let handle = body_of(&world, id).expect("body after mesh load");
        assert!(system(&world).physics().contains(handle));
        assert_eq!(system(&world).waiting_for_mesh(), 0);
        match &world.entity(id).unwrap().rigid_body().unwrap().shape {
            ShapeDescription::Concave { triangles } => assert_eq!(triangles.len(), 2),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn already_loaded_mesh_builds_immediately() {
        let mut world = world();
        let task = Task::resolved(quad_mesh());
        let id = world.add_entity(concave_entity(&task));

        assert!(body_of(&world, id).is_some());
        assert_eq!(system(&world).waiting_for_mesh(), 0);
    }

    #[test]
    fn concave_without_scene_uses_its_own_triangles() {
        let mut world = world();
        let empty = world.add_entity(
            Entity::new("empty").with_component(rigid_body(ShapeDescription::Concave { triangles: vec![] }, 0.0)),
        );
        let rb = world.entity(empty).unwrap().rigid_body().unwrap();
        assert_eq!(
            rb.state,
            BodyState::Skipped(BodyError::Shape(ShapeError::EmptyTriangles))
        );

        let tri = [
            Vec3Def::new(0.0, 0.0, 0.0),
            Vec3Def::new(1.0, 0.0, 0.0),
            Vec3Def::new(0.0, 0.0, 1.0),
        ];
        let given = world.add_entity(
            Entity::new("given")
                .with_component(rigid_body(ShapeDescription::Concave { triangles: vec![tri] }, 0.0)),
        );
        assert!(body_of(&world, given).is_some());
    }

    #[test]
    fn physics_is_the_position_authority() {
        let mut world = world();
        let mut entity = Entity::new("crate").with_component(rigid_body(unit_box(), 0.0));
        entity.set_position(1.0, 2.0, 3.0);
        let id = world.add_entity(entity);

        // Something else moves the entity; the body wins on the next frame.
        world.entity_mut(id).unwrap().set_position(9.0, 9.0, 9.0);
        world.update(DT);

        let entity = world.entity(id).unwrap();
        assert!((entity.position - Vector3::new(1.0, 2.0, 3.0)).norm() < 1.0e-6);
        assert!(entity.orientation.angle().abs() < 1.0e-6);
    }

    #[test]
    fn teleported_body_is_copied_back() {
        let mut world = world();
        let id = world.add_entity(Entity::new("ball").with_component(rigid_body(
            ShapeDescription::Sphere { radius: 0.5 },
            1.0,
        )));
        let handle = body_of(&world, id).unwrap();
        let target = Transform::new(Vec3::new(1.0, 2.0, 3.0), Quat::identity());
        world
            .system_mut::<RigidBodySystem>()
            .unwrap()
            .physics_mut()
            .set_body_transform(handle, &target)
            .unwrap();

        world.update(DT);
        let p = world.entity(id).unwrap().position;
        assert!((p - Vector3::new(1.0, 2.0, 3.0)).norm() < 1.0e-4);
    }

    #[test]
    fn billboard_follows_the_body() {
        let mut world = world();
        let mut entity = Entity::new("sign")
            .with_component(rigid_body(unit_box(), 0.0))
            .with_component(Component::Quad(QuadComponent::default()))
            .with_component(Component::Script(ScriptComponent {
                scripts: vec![ScriptRef::Path(LOOK_AT_CAMERA_SCRIPT.into())],
            }));
        entity.set_position(4.0, 5.0, 6.0);
        let plain = world.add_entity(
            Entity::new("plain")
                .with_component(rigid_body(unit_box(), 0.0))
                .with_component(Component::Quad(QuadComponent::default())),
        );
        let id = world.add_entity(entity);

        world.update(DT);
        let quad = world.entity(id).unwrap().quad().unwrap();
        assert!((quad.position - Vector3::new(4.0, 5.0, 6.0)).norm() < 1.0e-6);
        assert_eq!(world.entity(plain).unwrap().quad().unwrap().position, Vector3::zeros());
    }

    #[test]
    fn locks_and_material_reach_the_body() {
        let mut world = world();
        let id = world.add_entity(Entity::new("player").with_component(Component::RigidBody(
            RigidBodyComponent {
                shape: ShapeDescription::Capsule {
                    radius: 0.5,
                    height: 2.0,
                },
                friction: 0.9,
                allow_sleep: false,
                lock: Lock {
                    position: AxisLock::new(true, false, false),
                    rotation: AxisLock::ALL,
                },
                ..RigidBodyComponent::default()
            },
        )));

        let handle = body_of(&world, id).unwrap();
        let physics = system(&world).physics();
        assert_eq!(physics.linear_factor(handle), Some(Vector3::new(0.0, 1.0, 1.0)));
        assert_eq!(physics.angular_factor(handle), Some(Vector3::zeros()));
        assert_eq!(physics.activation(handle), Some(Activation::NeverSleep));
        assert!((physics.material(handle).unwrap().0 - 0.9).abs() < 1.0e-6);
        assert_eq!(physics.owner_of(handle), Some(id.owner()));
    }

    #[test]
    fn identical_primitives_share_a_shape() {
        let mut world = world();
        let a = world.add_entity(Entity::new("a").with_component(rigid_body(unit_box(), 1.0)));
        let b = world.add_entity(Entity::new("b").with_component(rigid_body(unit_box(), 1.0)));

        let physics = system(&world).physics();
        let sa = physics.shape_of(body_of(&world, a).unwrap()).unwrap();
        let sb = physics.shape_of(body_of(&world, b).unwrap()).unwrap();
        assert!(sa.ptr_eq(sb));
        assert_eq!(system(&world).shapes().cache().shared_len(), 1);
    }

    #[test]
    fn unknown_shape_leaves_entity_without_body() {
        let mut world = world();
        let id = world.add_entity(
            Entity::new("odd").with_component(rigid_body(ShapeDescription::Unrecognized, 1.0)),
        );
        world.update(DT);

        assert!(world.entity(id).is_some());
        assert!(body_of(&world, id).is_none());
        assert_eq!(system(&world).shapes().cache().shared_len(), 0);
        assert_eq!(system(&world).physics().body_count(), 0);
    }

    #[test]
    fn removing_entity_releases_body_and_instance_shape() {
        let mut world = world();
        let keep = world.add_entity(Entity::new("keep").with_component(rigid_body(unit_box(), 0.0)));
        let gone = world.add_entity(Entity::new("gone").with_component(rigid_body(unit_box(), 0.0)));
        let hull = world.add_entity(Entity::new("hull").with_component(rigid_body(
            ShapeDescription::Convex {
                points: vec![
                    Vec3Def::new(0.0, 0.0, 0.0),
                    Vec3Def::new(1.0, 0.0, 0.0),
                    Vec3Def::new(0.0, 1.0, 0.0),
                    Vec3Def::new(0.0, 0.0, 1.0),
                ],
            },
            1.0,
        )));
        assert_eq!(system(&world).physics().body_count(), 3);
        assert_eq!(system(&world).shapes().cache().instance_len(), 1);

        let gone_body = body_of(&world, gone).unwrap();
        world.remove_entity(gone);
        world.remove_entity(hull);

        let sys = system(&world);
        assert_eq!(sys.physics().body_count(), 1);
        assert!(!sys.physics().contains(gone_body));
        assert_eq!(sys.shapes().cache().instance_len(), 0);
        assert!(sys.shapes().cache().contains("box_0.5_1_0.5"));
        assert!(body_of(&world, keep).is_some());
    }

    #[test]
    fn removal_before_mesh_load_cancels_the_continuation() {
        let mut world = world();
        let task = Task::new();
        let id = world.add_entity(concave_entity(&task));
        assert_eq!(task.waiting(), 1);

        world.remove_entity(id);
        assert_eq!(task.waiting(), 0);
        assert_eq!(system(&world).waiting_for_mesh(), 0);

        task.resolve(quad_mesh()).unwrap();
        world.update(DT);
        assert_eq!(system(&world).physics().body_count(), 0);
    }

    #[test]
    fn removing_the_component_keeps_the_entity() {
        let mut world = world();
        let id = world.add_entity(Entity::new("crate").with_component(rigid_body(unit_box(), 1.0)));
        assert!(world.remove_component(id, ComponentKind::RigidBody).is_some());

        assert!(world.entity(id).is_some());
        assert_eq!(system(&world).physics().body_count(), 0);
    }

    #[test]
    fn contacts_are_reported_both_ways() {
        init_logger();
        let mut world = World::new();
        world.add_system(RigidBodySystem::default());

        let ground = world.add_entity(
            Entity::new("ground")
                .with_component(rigid_body(ShapeDescription::Plane { normal: Vec3Def::UP }, 0.0))
                .with_component(Component::CollisionReporter(CollisionReporterComponent::default())),
        );
        let mut ball = Entity::new("ball")
            .with_component(rigid_body(ShapeDescription::Sphere { radius: 0.5 }, 1.0))
            .with_component(Component::CollisionReporter(CollisionReporterComponent::default()));
        ball.set_position(0.0, 0.6, 0.0);
        let ball = world.add_entity(ball);

        for _ in 0..60 {
            world.update(DT);
        }
        assert!(contacts(&world, ground).contains(&ball));
        assert!(contacts(&world, ball).contains(&ground));

        world.remove_entity(ball);
        assert!(contacts(&world, ground).is_empty());
    }

    #[test]
    fn losing_the_body_clears_own_contacts() {
        init_logger();
        let mut world = World::new();
        world.add_system(RigidBodySystem::default());

        let ground = world.add_entity(
            Entity::new("ground")
                .with_component(rigid_body(ShapeDescription::Plane { normal: Vec3Def::UP }, 0.0))
                .with_component(Component::CollisionReporter(CollisionReporterComponent::default())),
        );
        let mut ball = Entity::new("ball")
            .with_component(rigid_body(ShapeDescription::Sphere { radius: 0.5 }, 1.0))
            .with_component(Component::CollisionReporter(CollisionReporterComponent::default()));
        ball.set_position(0.0, 0.6, 0.0);
        let ball = world.add_entity(ball);

        for _ in 0..60 {
            world.update(DT);
        }
        assert!(contacts(&world, ball).contains(&ground));

        world.remove_component(ball, ComponentKind::RigidBody);
        for _ in 0..10 {
            world.update(DT);
        }
        assert!(world.entity(ball).unwrap().collision_reporter().is_some());
        assert!(contacts(&world, ball).is_empty());
        assert!(contacts(&world, ground).is_empty());
    }

    #[test]
    fn copied_component_gets_its_own_body() {
        let mut world = world();
        let a = world.add_entity(Entity::new("a").with_component(rigid_body(unit_box(), 1.0)));
        let a_body = body_of(&world, a).unwrap();

        let copy = world.entity(a).unwrap().rigid_body().unwrap().clone();
        assert_eq!(copy.state, BodyState::Active(a_body));
        let mut b = Entity::new("b").with_component(Component::RigidBody(copy));
        b.set_position(5.0, 5.0, 5.0);
        let b = world.add_entity(b);
        world.update(DT);

        let b_body = body_of(&world, b).unwrap();
        assert_ne!(a_body, b_body);
        assert_eq!(system(&world).physics().body_count(), 2);
        assert_eq!(system(&world).physics().owner_of(b_body), Some(b.owner()));
        let p = world.entity(b).unwrap().position;
        assert!((p - Vector3::new(5.0, 5.0, 5.0)).norm() < 1.0e-4);

        world.remove_entity(b);
        assert!(system(&world).physics().contains(a_body));
        assert_eq!(body_of(&world, a), Some(a_body));
    }
}
