/*!
Physics defaults shared by the shape builder, body construction, and the simulation step.

Notes
- Distances are in meters, time in seconds, mass in kilograms.
- Rigid body defaults mirror what a freshly attached `rigidBody` component gets when the
  caller overrides nothing. Override them from game data, not by editing these values.
*/

/// Gravity magnitude in meters per second squared (positive value).
/// Applied along -Y.
pub const GRAVITY_MPS2: f32 = 9.81;

/// Default body mass. A mass of 0 makes the body fixed (immovable terrain/level geometry).
pub const DEFAULT_MASS: f32 = 1.0;

/// Default surface friction coefficient.
pub const DEFAULT_FRICTION: f32 = 0.5;

/// Default restitution. Slightly above zero so resting contacts settle without bouncing.
pub const DEFAULT_RESTITUTION: f32 = 0.003;

/// Whether bodies may be put to sleep by the engine unless told otherwise.
pub const DEFAULT_ALLOW_SLEEP: bool = true;

/// Radius of the default sphere shape.
pub const DEFAULT_SPHERE_RADIUS: f32 = 1.0;

/// Longest single substep handed to the native pipeline (seconds).
/// Larger frame deltas are split into equal substeps no longer than this.
pub const MAX_SUBSTEP_DT: f32 = 1.0 / 60.0;

/// Upper bound on substeps per frame. A very long frame (e.g. after a debugger pause)
/// is simulated with at most this many substeps, each longer than `MAX_SUBSTEP_DT`.
pub const MAX_SUBSTEPS: u32 = 8;
