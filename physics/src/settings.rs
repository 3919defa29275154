/*!
Simulation settings for a [`PhysicsWorld`](crate::PhysicsWorld).

These are the knobs a game may want to override from data (gravity, stepping bounds).
Every field has a sensible default from [`crate::constants`], so a partial JSON object
like `{ "gravity": { "x": 0, "y": 0, "z": 0 } }` is enough to turn gravity off.
*/

use serde::Deserialize;

use crate::constants::{GRAVITY_MPS2, MAX_SUBSTEP_DT, MAX_SUBSTEPS};
use crate::types::Vec3Def;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsSettings {
    /// World gravity (m/s^2).
    pub gravity: Vec3Def,
    /// Longest substep handed to the native pipeline (seconds).
    pub max_substep_dt: f32,
    /// Maximum substeps per `step` call.
    pub max_substeps: u32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3Def::new(0.0, -GRAVITY_MPS2, 0.0),
            max_substep_dt: MAX_SUBSTEP_DT,
            max_substeps: MAX_SUBSTEPS,
        }
    }
}

impl PhysicsSettings {
    /// Settings with gravity disabled; handy for scenes driven purely by scripts.
    pub fn zero_gravity() -> Self {
        Self {
            gravity: Vec3Def::ZERO,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Split a frame delta into `(substeps, substep_dt)`.
    ///
    /// Returns `None` when there is nothing to simulate (`dt <= 0` or non-finite).
    pub fn substeps(&self, dt: f32) -> Option<(u32, f32)> {
        if !dt.is_finite() || dt <= 0.0 {
            return None;
        }
        let max_dt = if self.max_substep_dt > 0.0 {
            self.max_substep_dt
        } else {
            MAX_SUBSTEP_DT
        };
        let wanted = (dt / max_dt).ceil().max(1.0) as u32;
        let count = wanted.clamp(1, self.max_substeps.max(1));
        Some((count, dt / count as f32))
    }
}
