//! Rapier-based simulation world: the native body registry and the stepping pipeline.
//!
//! Every body added here carries a packed [`Owner`] in its user data, so collision events
//! can be resolved back to whoever created the body.
//!
//! Design goals
//! - Explicit state: all pipeline structures live on [`PhysicsWorld`], nothing is global.
//! - Deterministic teardown: [`PhysicsWorld::remove_body`] drops the body and its collider
//!   in one call.
//! - Units are meters, seconds, kilograms. Gravity comes from [`PhysicsSettings`].

// Re-export Rapier so the runtime can name native types without depending on it directly.
pub use rapier3d;

use std::collections::HashMap;
use std::sync::Mutex;

use rapier3d::prelude::*;

use crate::body::{Activation, BodyConfig};
use crate::cache::ShapeHandle;
use crate::error::BodyError;
use crate::owner::{Owner, unpack_owner};
use crate::settings::PhysicsSettings;
use crate::types::{Transform, Vec3};

/// Opaque reference to a body registered with a [`PhysicsWorld`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

/// Two owners started or stopped touching during a step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContactEvent {
    Started(Owner, Owner),
    Stopped(Owner, Owner),
}

/// Bookkeeping kept beside each native body.
#[derive(Clone, Debug)]
struct BodyRecord {
    collider: ColliderHandle,
    owner: Owner,
    activation: Activation,
    shape: ShapeHandle,
}

/// Collects raw collision events while the pipeline runs.
///
/// Rapier requires event handlers to be `Sync`; events are resolved to owners afterwards.
#[derive(Default)]
struct CollisionCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl CollisionCollector {
    fn take(&self) -> Vec<CollisionEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventHandler for CollisionCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

pub struct PhysicsWorld {
    settings: PhysicsSettings,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    collector: CollisionCollector,
    records: HashMap<BodyHandle, BodyRecord>,
    contacts: Vec<ContactEvent>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsSettings::default())
    }
}

impl PhysicsWorld {
    pub fn new(settings: PhysicsSettings) -> Self {
        Self {
            settings,
            gravity: Vec3::from(settings.gravity),
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            collector: CollisionCollector::default(),
            records: HashMap::new(),
            contacts: Vec::new(),
        }
    }

    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    /// Construct a body from `shape` + `config` and register it.
    ///
    /// The body keeps its own reference to the shape, so the caller may drop the handle.
    pub fn add_body(&mut self, shape: &ShapeHandle, config: &BodyConfig) -> Result<BodyHandle, BodyError> {
        config.validate()?;

        let rb = config.rigid_body(shape.shared_shape());
        let rb_handle = self.bodies.insert(rb);
        let collider = config.collider(shape.shared_shape().clone());
        let collider = self
            .colliders
            .insert_with_parent(collider, rb_handle, &mut self.bodies);

        let handle = BodyHandle(rb_handle);
        self.records.insert(
            handle,
            BodyRecord {
                collider,
                owner: config.owner,
                activation: config.activation(),
                shape: shape.clone(),
            },
        );
        log::debug!(
            "added {} body for owner {:#x} ({} bodies)",
            if config.is_dynamic() { "dynamic" } else { "fixed" },
            config.owner,
            self.records.len()
        );
        Ok(handle)
    }

    /// Remove a body together with its collider.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<(), BodyError> {
        let record = self.records.remove(&handle).ok_or(BodyError::UnknownBody)?;
        self.bodies.remove(
            handle.0,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        log::debug!("removed body of owner {:#x}", record.owner);
        Ok(())
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.records.contains_key(&handle)
    }

    pub fn body_count(&self) -> usize {
        self.records.len()
    }

    /// Advance the simulation by `dt` seconds, split into substeps per the settings.
    ///
    /// Returns the number of substeps taken (0 when `dt` is not positive and finite).
    pub fn step(&mut self, dt: f32) -> u32 {
        let Some((substeps, substep_dt)) = self.settings.substeps(dt) else {
            return 0;
        };
        self.integration_parameters.dt = substep_dt;

        for _ in 0..substeps {
            self.pipeline.step(
                &self.gravity,
                &self.integration_parameters,
                &mut self.islands,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                &(),
                &self.collector,
            );
            self.resolve_collisions();
        }
        log::trace!("stepped {dt:.4}s in {substeps} substeps");
        substeps
    }

    fn resolve_collisions(&mut self) {
        for event in self.collector.take() {
            let owners = (
                self.collider_owner(event.collider1()),
                self.collider_owner(event.collider2()),
            );
            // Removed colliders can't be resolved anymore; their owners are gone anyway.
            let (Some(a), Some(b)) = owners else {
                continue;
            };
            self.contacts.push(if event.started() {
                ContactEvent::Started(a, b)
            } else {
                ContactEvent::Stopped(a, b)
            });
        }
    }

    fn collider_owner(&self, collider: ColliderHandle) -> Option<Owner> {
        let parent = self.colliders.get(collider)?.parent()?;
        let owner = self.bodies.get(parent)?.user_data;
        unpack_owner(owner).map(|_| owner)
    }

    /// Contact changes resolved since the last call.
    pub fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.contacts)
    }

    /// Current world pose of a body.
    pub fn body_transform(&self, handle: BodyHandle) -> Option<Transform> {
        let body = self.bodies.get(handle.0)?;
        Some(Transform::new(*body.translation(), *body.rotation()))
    }

    /// Teleport a body.
    pub fn set_body_transform(&mut self, handle: BodyHandle, transform: &Transform) -> Result<(), BodyError> {
        let body = self.bodies.get_mut(handle.0).ok_or(BodyError::UnknownBody)?;
        body.set_translation(transform.translation, true);
        body.set_rotation(transform.rotation, true);
        Ok(())
    }

    pub fn owner_of(&self, handle: BodyHandle) -> Option<Owner> {
        self.records.get(&handle).map(|r| r.owner)
    }

    pub fn is_dynamic(&self, handle: BodyHandle) -> Option<bool> {
        self.bodies.get(handle.0).map(|b| b.is_dynamic())
    }

    /// Per-axis translation factors: `0` on locked axes, `1` on free ones.
    pub fn linear_factor(&self, handle: BodyHandle) -> Option<Vec3> {
        let locked = self.bodies.get(handle.0)?.locked_axes();
        Some(factors(
            locked,
            [
                LockedAxes::TRANSLATION_LOCKED_X,
                LockedAxes::TRANSLATION_LOCKED_Y,
                LockedAxes::TRANSLATION_LOCKED_Z,
            ],
        ))
    }

    /// Per-axis rotation factors: `0` on locked axes, `1` on free ones.
    pub fn angular_factor(&self, handle: BodyHandle) -> Option<Vec3> {
        let locked = self.bodies.get(handle.0)?.locked_axes();
        Some(factors(
            locked,
            [
                LockedAxes::ROTATION_LOCKED_X,
                LockedAxes::ROTATION_LOCKED_Y,
                LockedAxes::ROTATION_LOCKED_Z,
            ],
        ))
    }

    pub fn activation(&self, handle: BodyHandle) -> Option<Activation> {
        self.records.get(&handle).map(|r| r.activation)
    }

    pub fn is_sleeping(&self, handle: BodyHandle) -> Option<bool> {
        self.bodies.get(handle.0).map(|b| b.is_sleeping())
    }

    /// `(friction, restitution)` of the body's collider.
    pub fn material(&self, handle: BodyHandle) -> Option<(f32, f32)> {
        let record = self.records.get(&handle)?;
        let collider = self.colliders.get(record.collider)?;
        Some((collider.friction(), collider.restitution()))
    }

    /// The shape the body was built with.
    pub fn shape_of(&self, handle: BodyHandle) -> Option<&ShapeHandle> {
        self.records.get(&handle).map(|r| &r.shape)
    }

    /// Total mass as seen by the solver (0 for fixed bodies).
    pub fn mass(&self, handle: BodyHandle) -> Option<f32> {
        self.bodies.get(handle.0).map(|b| b.mass())
    }
}

fn factors(locked: LockedAxes, axes: [LockedAxes; 3]) -> Vec3 {
    let f = |axis: LockedAxes| if locked.contains(axis) { 0.0 } else { 1.0 };
    Vec3::new(f(axes[0]), f(axes[1]), f(axes[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{AxisLock, Lock};
    use crate::builder::ShapeBuilder;
    use crate::owner::pack_owner;
    use crate::shape::ShapeDescription;

    fn sphere(builder: &mut ShapeBuilder) -> ShapeHandle {
        builder
            .build(&ShapeDescription::Sphere { radius: 0.5 }, 0)
            .unwrap()
    }

    fn at(x: f32, y: f32, z: f32) -> Transform {
        Transform {
            translation: Vec3::new(x, y, z),
            ..Transform::default()
        }
    }

    #[test]
    fn fixed_body_stays_put() {
        let mut builder = ShapeBuilder::new();
        let mut world = PhysicsWorld::default();
        let config = BodyConfig {
            mass: 0.0,
            transform: at(1.0, 2.0, 3.0),
            ..BodyConfig::default()
        };
        let handle = world.add_body(&sphere(&mut builder), &config).unwrap();

        world.step(0.1);
        let t = world.body_transform(handle).unwrap();
        assert!((t.translation - Vec3::new(1.0, 2.0, 3.0)).norm() < 1.0e-6);
        assert_eq!(world.is_dynamic(handle), Some(false));
    }

    #[test]
    fn dynamic_body_falls_under_gravity() {
        let mut builder = ShapeBuilder::new();
        let mut world = PhysicsWorld::default();
        let config = BodyConfig {
            transform: at(0.0, 10.0, 0.0),
            ..BodyConfig::default()
        };
        let handle = world.add_body(&sphere(&mut builder), &config).unwrap();

        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        let t = world.body_transform(handle).unwrap();
        assert!(t.translation.y < 10.0);
        assert!(t.translation.x.abs() < 1.0e-6);
    }

    #[test]
    fn locks_and_material_are_applied() {
        let mut builder = ShapeBuilder::new();
        let mut world = PhysicsWorld::default();
        let config = BodyConfig {
            friction: 0.8,
            restitution: 0.1,
            allow_sleep: false,
            lock: Lock {
                position: AxisLock::new(true, false, false),
                rotation: AxisLock::ALL,
            },
            ..BodyConfig::default()
        };
        let handle = world.add_body(&sphere(&mut builder), &config).unwrap();

        assert_eq!(world.linear_factor(handle), Some(Vec3::new(0.0, 1.0, 1.0)));
        assert_eq!(world.angular_factor(handle), Some(Vec3::zeros()));
        assert_eq!(world.activation(handle), Some(Activation::NeverSleep));
        let (friction, restitution) = world.material(handle).unwrap();
        assert!((friction - 0.8).abs() < 1.0e-6);
        assert!((restitution - 0.1).abs() < 1.0e-6);
    }

    #[test]
    fn owner_is_stored_on_the_body() {
        let mut builder = ShapeBuilder::new();
        let mut world = PhysicsWorld::default();
        let owner = pack_owner(4, 2);
        let config = BodyConfig {
            owner,
            ..BodyConfig::default()
        };
        let handle = world.add_body(&sphere(&mut builder), &config).unwrap();
        assert_eq!(world.owner_of(handle), Some(owner));
    }

    #[test]
    fn remove_body_unregisters_it() {
        let mut builder = ShapeBuilder::new();
        let mut world = PhysicsWorld::default();
        let shape = sphere(&mut builder);
        let handle = world.add_body(&shape, &BodyConfig::default()).unwrap();
        assert!(world.shape_of(handle).unwrap().ptr_eq(&shape));

        world.remove_body(handle).unwrap();
        assert!(!world.contains(handle));
        assert_eq!(world.body_count(), 0);
        assert!(world.body_transform(handle).is_none());
        assert_eq!(world.remove_body(handle), Err(BodyError::UnknownBody));
    }

    #[test]
    fn invalid_mass_never_reaches_the_engine() {
        let mut builder = ShapeBuilder::new();
        let mut world = PhysicsWorld::default();
        let config = BodyConfig {
            mass: f32::NAN,
            ..BodyConfig::default()
        };
        assert!(matches!(
            world.add_body(&sphere(&mut builder), &config),
            Err(BodyError::InvalidMass(_))
        ));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn falling_body_reports_contact_with_ground() {
        let mut builder = ShapeBuilder::new();
        let mut world = PhysicsWorld::default();
        let ground = builder
            .build(&ShapeDescription::Plane { normal: crate::Vec3Def::UP }, 0)
            .unwrap();
        let (a, b) = (pack_owner(1, 0), pack_owner(2, 0));
        world
            .add_body(
                &ground,
                &BodyConfig {
                    mass: 0.0,
                    owner: a,
                    ..BodyConfig::default()
                },
            )
            .unwrap();
        world
            .add_body(
                &sphere(&mut builder),
                &BodyConfig {
                    owner: b,
                    transform: at(0.0, 0.6, 0.0),
                    ..BodyConfig::default()
                },
            )
            .unwrap();

        let mut events = Vec::new();
        for _ in 0..60 {
            world.step(1.0 / 60.0);
            events.extend(world.drain_contacts());
        }
        assert!(events.iter().any(|e| matches!(
            e,
            ContactEvent::Started(x, y) if (*x == a && *y == b) || (*x == b && *y == a)
        )));
    }

    #[test]
    fn never_sleep_bodies_stay_awake() {
        let mut builder = ShapeBuilder::new();
        let mut world = PhysicsWorld::new(PhysicsSettings::zero_gravity());
        let config = BodyConfig {
            allow_sleep: false,
            ..BodyConfig::default()
        };
        let handle = world.add_body(&sphere(&mut builder), &config).unwrap();

        for _ in 0..240 {
            world.step(1.0 / 60.0);
        }
        assert_eq!(world.is_sleeping(handle), Some(false));

        world.remove_body(handle).unwrap();
        assert_eq!(world.is_sleeping(handle), None);
    }

    #[test]
    fn non_positive_dt_is_a_no_op() {
        let mut world = PhysicsWorld::default();
        assert_eq!(world.step(0.0), 0);
        assert_eq!(world.step(f32::INFINITY), 0);
        assert_eq!(world.step(0.05), 3);
    }
}
