pub mod body;
pub mod builder;
pub mod cache;
pub mod constants;
pub mod error;
pub mod mesh;
pub mod owner;
pub mod settings;
pub mod shape;
pub mod types;
pub mod world;

pub use body::{Activation, AxisLock, BodyConfig, Lock, local_inertia, mass_properties};
pub use builder::{ShapeBuilder, heightfield_local_scale};
pub use cache::{CacheStats, ShapeCache, ShapeHandle};
pub use constants::{
    DEFAULT_ALLOW_SLEEP, DEFAULT_FRICTION, DEFAULT_MASS, DEFAULT_RESTITUTION,
    DEFAULT_SPHERE_RADIUS, GRAVITY_MPS2, MAX_SUBSTEP_DT, MAX_SUBSTEPS,
};
pub use error::{BodyError, ShapeError};
pub use mesh::{Face, MeshGeometry, triangles_from_mesh};
pub use owner::{Owner, pack_owner, unpack_owner, validate_owner};
pub use settings::PhysicsSettings;
pub use shape::{ShapeDescription, ShapeKind, Triangle};
pub use types::{Iso, Point3, Quat, Transform, Vec3, Vec3Def};
pub use world::{BodyHandle, ContactEvent, PhysicsWorld, rapier3d};
