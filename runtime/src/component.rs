/*!
Component kinds and their typed payloads.

The set of kinds is closed: [`ComponentKind`] names every kind an entity may carry and
[`Component`] holds the matching payload. Payloads deserialize from the same camelCase JSON
objects game data uses, e.g. `{ "mass": 0, "shape": { "type": "box", ... } }`.

Notes
- Runtime-only state (body handles, mesh tasks, contact sets, billboard positions) is never
  serialized and starts out empty.
*/

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::Vector3;
use physics::{
    BodyError, BodyHandle, DEFAULT_ALLOW_SLEEP, DEFAULT_FRICTION, DEFAULT_MASS,
    DEFAULT_RESTITUTION, Lock, MeshGeometry, ShapeDescription,
};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::task::Task;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    RigidBody,
    Scene,
    Quad,
    Script,
    CollisionReporter,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::RigidBody,
        ComponentKind::Scene,
        ComponentKind::Quad,
        ComponentKind::Script,
        ComponentKind::CollisionReporter,
    ];

    /// Name used in entity definitions.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::RigidBody => "rigidBody",
            ComponentKind::Scene => "scene",
            ComponentKind::Quad => "quad",
            ComponentKind::Script => "script",
            ComponentKind::CollisionReporter => "collisionReporter",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug)]
pub enum Component {
    RigidBody(RigidBodyComponent),
    Scene(SceneComponent),
    Quad(QuadComponent),
    Script(ScriptComponent),
    CollisionReporter(CollisionReporterComponent),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::RigidBody(_) => ComponentKind::RigidBody,
            Component::Scene(_) => ComponentKind::Scene,
            Component::Quad(_) => ComponentKind::Quad,
            Component::Script(_) => ComponentKind::Script,
            Component::CollisionReporter(_) => ComponentKind::CollisionReporter,
        }
    }

    /// Deserialize the payload for `kind` from a (fully merged) JSON value.
    pub fn from_value(kind: ComponentKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ComponentKind::RigidBody => Component::RigidBody(serde_json::from_value(value)?),
            ComponentKind::Scene => Component::Scene(serde_json::from_value(value)?),
            ComponentKind::Quad => Component::Quad(serde_json::from_value(value)?),
            ComponentKind::Script => Component::Script(serde_json::from_value(value)?),
            ComponentKind::CollisionReporter => {
                Component::CollisionReporter(serde_json::from_value(value)?)
            }
        })
    }
}

/// Where a rigid body is in its lifecycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum BodyState {
    /// Waiting for prerequisites (e.g. a mesh to load).
    #[default]
    Pending,
    /// Shape geometry is available; the body is being constructed.
    ShapeReady,
    /// Registered with the physics world.
    Active(BodyHandle),
    /// Construction failed; the entity lives on without physics.
    Skipped(BodyError),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RigidBodyComponent {
    pub shape: ShapeDescription,
    /// 0 makes the body fixed.
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub allow_sleep: bool,
    pub lock: Lock,
    #[serde(skip)]
    pub state: BodyState,
}

impl Default for RigidBodyComponent {
    fn default() -> Self {
        Self {
            shape: ShapeDescription::default(),
            mass: DEFAULT_MASS,
            friction: DEFAULT_FRICTION,
            restitution: DEFAULT_RESTITUTION,
            allow_sleep: DEFAULT_ALLOW_SLEEP,
            lock: Lock::default(),
            state: BodyState::Pending,
        }
    }
}

impl RigidBodyComponent {
    /// Native body, once construction has completed.
    pub fn body(&self) -> Option<BodyHandle> {
        match self.state {
            BodyState::Active(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, BodyState::Pending)
    }
}

/// Renderable scene (model) attached to an entity.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct SceneComponent {
    pub id: String,
    /// Resolves once the mesh geometry has loaded.
    #[serde(skip)]
    pub mesh_task: Task<MeshGeometry>,
}

/// Camera-facing billboard. Keeps its own render position.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct QuadComponent {
    pub transparent: bool,
    pub texture: String,
    #[serde(skip)]
    pub position: Vector3<f32>,
}

impl Default for QuadComponent {
    fn default() -> Self {
        Self {
            transparent: false,
            texture: String::new(),
            position: Vector3::zeros(),
        }
    }
}

/// A script reference: either a bare path or a path plus parameters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ScriptRef {
    Path(String),
    Source {
        src: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl ScriptRef {
    pub fn path(&self) -> &str {
        match self {
            ScriptRef::Path(path) => path,
            ScriptRef::Source { src, .. } => src,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ScriptComponent {
    pub scripts: Vec<ScriptRef>,
}

impl ScriptComponent {
    pub fn get(&self, path: &str) -> Option<&ScriptRef> {
        self.scripts.iter().find(|s| s.path() == path)
    }
}

/// Tracks which entities this one currently touches.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct CollisionReporterComponent {
    #[serde(skip)]
    pub contacts: BTreeSet<EntityId>,
}
