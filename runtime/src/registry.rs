//! Component defaults and the entity builder.
//!
//! Every component kind has a default JSON configuration. Building an entity deep-merges
//! the caller's overrides into those defaults (objects merge key by key, anything else
//! replaces) and deserializes the result into the typed payload.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::component::{Component, ComponentKind};
use crate::entity::Entity;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown component kind `{0}`")]
    UnknownComponent(String),

    #[error("invalid `{kind}` component: {source}")]
    InvalidComponent {
        kind: ComponentKind,
        #[source]
        source: serde_json::Error,
    },
}

pub struct ComponentRegistry {
    defaults: HashMap<ComponentKind, Value>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(
            ComponentKind::RigidBody,
            json!({
                "mass": physics::DEFAULT_MASS,
                "shape": { "type": "sphere", "radius": physics::DEFAULT_SPHERE_RADIUS },
                "allowSleep": physics::DEFAULT_ALLOW_SLEEP,
                "lock": {
                    "position": { "x": false, "y": false, "z": false },
                    "rotation": { "x": false, "y": false, "z": false }
                },
                "restitution": physics::DEFAULT_RESTITUTION,
                "friction": physics::DEFAULT_FRICTION
            }),
        );
        defaults.insert(ComponentKind::Scene, json!({ "id": "" }));
        defaults.insert(
            ComponentKind::Quad,
            json!({ "transparent": false, "texture": "" }),
        );
        defaults.insert(ComponentKind::Script, json!({ "scripts": [] }));
        defaults.insert(ComponentKind::CollisionReporter, json!({}));
        Self { defaults }
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the defaults of `kind`.
    pub fn set_defaults(&mut self, kind: ComponentKind, defaults: Value) {
        self.defaults.insert(kind, defaults);
    }

    pub fn defaults(&self, kind: ComponentKind) -> Option<&Value> {
        self.defaults.get(&kind)
    }

    /// Defaults of `kind` with `overrides` merged on top, as a typed component.
    pub fn create(&self, kind: ComponentKind, overrides: &Value) -> Result<Component, BuildError> {
        let mut value = self
            .defaults
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        merge(&mut value, overrides);
        Component::from_value(kind, value).map_err(|source| BuildError::InvalidComponent { kind, source })
    }
}

/// Deep merge `overrides` into `base`.
pub fn merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// Declarative entity: transform plus component overrides keyed by kind name.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct EntityDef {
    pub position: [f32; 3],
    /// Euler angles in radians, applied in X, Y, Z order.
    pub rotation: [f32; 3],
    pub components: Map<String, Value>,
}

impl EntityDef {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Euler angles (radians) to a quaternion, rotating about X, then Y, then Z.
pub fn euler_xyz(x: f32, y: f32, z: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), y)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z)
}

#[derive(Default)]
pub struct EntityBuilder {
    registry: ComponentRegistry,
}

impl EntityBuilder {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Build a detached entity; add it to a world to give it an id.
    pub fn build(&self, name: &str, def: &EntityDef) -> Result<Entity, BuildError> {
        let mut entity = Entity::new(name);
        let [px, py, pz] = def.position;
        entity.set_position(px, py, pz);
        let [rx, ry, rz] = def.rotation;
        entity.orientation = euler_xyz(rx, ry, rz);

        for (kind_name, overrides) in &def.components {
            let kind = ComponentKind::from_name(kind_name)
                .ok_or_else(|| BuildError::UnknownComponent(kind_name.clone()))?;
            entity.insert_component(self.registry.create(kind, overrides)?);
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physics::ShapeDescription;

    #[test]
    fn merge_is_deep_for_objects_and_replaces_the_rest() {
        let mut base = json!({ "a": 1, "lock": { "x": false, "y": false }, "list": [1, 2] });
        merge(&mut base, &json!({ "lock": { "y": true }, "list": [3] }));
        assert_eq!(
            base,
            json!({ "a": 1, "lock": { "x": false, "y": true }, "list": [3] })
        );
    }

    #[test]
    fn overrides_merge_into_rigid_body_defaults() {
        let registry = ComponentRegistry::new();
        let c = registry
            .create(
                ComponentKind::RigidBody,
                &json!({ "mass": 0, "lock": { "rotation": { "y": true } } }),
            )
            .unwrap();
        let Component::RigidBody(rb) = c else {
            panic!("expected rigid body");
        };
        assert_eq!(rb.mass, 0.0);
        assert_eq!(rb.shape, ShapeDescription::Sphere { radius: 1.0 });
        assert!(rb.lock.rotation.y && !rb.lock.rotation.x);
        assert!((rb.restitution - 0.003).abs() < 1.0e-6);
    }

    #[test]
    fn builder_sets_transform_and_components() {
        let def = EntityDef::from_json_str(
            r#"{
                "position": [1, 2, 3],
                "rotation": [0, 1.5707964, 0],
                "components": {
                    "rigidBody": { "shape": { "type": "box", "width": 0.5, "height": 1, "depth": 0.5 } },
                    "collisionReporter": {}
                }
            }"#,
        )
        .unwrap();
        let entity = EntityBuilder::default().build("bunny", &def).unwrap();

        assert_eq!(entity.name(), "bunny");
        assert_eq!(entity.position, Vector3::new(1.0, 2.0, 3.0));
        let turned = entity.orientation * Vector3::x();
        assert!((turned - Vector3::new(0.0, 0.0, -1.0)).norm() < 1.0e-5);
        assert_eq!(
            entity.rigid_body().and_then(|rb| rb.shape.cache_key()).as_deref(),
            Some("box_0.5_1_0.5")
        );
        assert!(entity.collision_reporter().is_some());
    }

    #[test]
    fn unknown_component_name_is_an_error() {
        let mut def = EntityDef::default();
        def.components.insert("light".into(), json!({}));
        let err = EntityBuilder::default().build("x", &def).unwrap_err();
        assert!(matches!(err, BuildError::UnknownComponent(name) if name == "light"));
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let mut def = EntityDef::default();
        def.components.insert("rigidBody".into(), json!({ "mass": "heavy" }));
        let err = EntityBuilder::default().build("x", &def).unwrap_err();
        assert!(matches!(
            err,
            BuildError::InvalidComponent {
                kind: ComponentKind::RigidBody,
                ..
            }
        ));
    }
}
