/*!
Rigid body configuration: everything needed to turn a built shape into a native body.

Design notes
- A mass of `0` means fixed (immovable level geometry). Any positive mass is dynamic.
- Mass properties are derived from the shape at unit density, then rescaled to the
  requested mass. The collider itself carries zero density so rapier doesn't add its own.
- Axis locks are expressed as per-axis factors: `0` on a locked axis, `1` on a free one.
*/

use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ALLOW_SLEEP, DEFAULT_FRICTION, DEFAULT_MASS, DEFAULT_RESTITUTION};
use crate::error::BodyError;
use crate::owner::Owner;
use crate::types::{Transform, Vec3};

/// Per-axis freeze flags. `true` means the axis is locked.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AxisLock {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisLock {
    pub const NONE: Self = Self::new(false, false, false);
    pub const ALL: Self = Self::new(true, true, true);

    pub const fn new(x: bool, y: bool, z: bool) -> Self {
        Self { x, y, z }
    }

    /// Scale factors applied to motion: `0` on locked axes, `1` on free ones.
    pub fn factors(&self) -> Vec3 {
        let f = |locked: bool| if locked { 0.0 } else { 1.0 };
        Vec3::new(f(self.x), f(self.y), f(self.z))
    }

    /// Rapier wants the inverse question ("is this axis enabled?").
    fn enabled(&self) -> (bool, bool, bool) {
        (!self.x, !self.y, !self.z)
    }
}

/// Linear and angular locks of a body.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Lock {
    pub position: AxisLock,
    pub rotation: AxisLock,
}

/// Sleep policy of a body.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Activation {
    /// The engine may deactivate the body when it comes to rest.
    #[default]
    Default,
    /// The body is simulated every step, even at rest.
    NeverSleep,
}

impl Activation {
    pub fn from_allow_sleep(allow_sleep: bool) -> Self {
        if allow_sleep {
            Activation::Default
        } else {
            Activation::NeverSleep
        }
    }
}

/// Everything besides the shape that goes into a native body.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyConfig {
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub allow_sleep: bool,
    pub lock: Lock,
    /// Initial world pose.
    pub transform: Transform,
    /// Back-reference stored in the body's user data.
    pub owner: Owner,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            mass: DEFAULT_MASS,
            friction: DEFAULT_FRICTION,
            restitution: DEFAULT_RESTITUTION,
            allow_sleep: DEFAULT_ALLOW_SLEEP,
            lock: Lock::default(),
            transform: Transform::default(),
            owner: 0,
        }
    }
}

impl BodyConfig {
    pub fn is_dynamic(&self) -> bool {
        self.mass > 0.0
    }

    pub fn activation(&self) -> Activation {
        Activation::from_allow_sleep(self.allow_sleep)
    }

    /// Reject values the native engine has no defined behavior for.
    pub fn validate(&self) -> Result<(), BodyError> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(BodyError::InvalidMass(self.mass));
        }
        let material_ok = |v: f32| v.is_finite() && v >= 0.0;
        if !material_ok(self.friction) || !material_ok(self.restitution) {
            return Err(BodyError::InvalidMaterial {
                friction: self.friction,
                restitution: self.restitution,
            });
        }
        Ok(())
    }

    /// Native body description for this config (pose, sleep policy, locks, owner).
    pub(crate) fn rigid_body(&self, shape: &SharedShape) -> RigidBody {
        let builder = if self.is_dynamic() {
            RigidBodyBuilder::dynamic().additional_mass_properties(mass_properties(shape, self.mass))
        } else {
            RigidBodyBuilder::fixed()
        };

        let (tx, ty, tz) = self.lock.position.enabled();
        let (rx, ry, rz) = self.lock.rotation.enabled();

        builder
            .pose(self.transform.iso())
            .can_sleep(self.allow_sleep)
            .enabled_translations(tx, ty, tz)
            .enabled_rotations(rx, ry, rz)
            .user_data(self.owner)
            .build()
    }

    /// Native collider carrying the material; mass lives on the body.
    pub(crate) fn collider(&self, shape: SharedShape) -> Collider {
        ColliderBuilder::new(shape)
            .friction(self.friction)
            .restitution(self.restitution)
            .density(0.0)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build()
    }
}

/// Mass properties of `shape` for a body of total `mass`.
///
/// Shapes without a usable volume (half-spaces, open triangle meshes) fall back to the
/// inertia of a unit sphere of that mass centered on the body origin.
pub fn mass_properties(shape: &SharedShape, mass: f32) -> MassProperties {
    let unit = shape.mass_properties(1.0);
    let unit_mass = unit.mass();
    let inertia = unit.principal_inertia();

    if unit_mass.is_finite() && unit_mass > f32::EPSILON && inertia.iter().all(|v| v.is_finite()) {
        let scale = mass / unit_mass;
        MassProperties::with_principal_inertia_frame(
            unit.local_com,
            mass,
            inertia * scale,
            unit.principal_inertia_local_frame,
        )
    } else {
        MassProperties::new(Point::origin(), mass, Vector::repeat(0.4 * mass))
    }
}

/// Principal inertia of `shape` at `mass`. Zero for fixed bodies.
pub fn local_inertia(shape: &SharedShape, mass: f32) -> Vec3 {
    if mass <= 0.0 {
        return Vec3::zeros();
    }
    mass_properties(shape, mass).principal_inertia()
}
