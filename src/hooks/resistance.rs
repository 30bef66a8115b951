//! Immunities and probabilistic resists.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{BuffError, BuffRng, RngState};
use crate::modifiers::Buff;

use super::{HookContext, HookModule};

/// Vetoes applications of names the owner is immune to or resists.
///
/// Immunities are keyed by modifier name and either permanent or timed;
/// timed ones count down in `process`. Resist chances are rolled on a
/// seeded RNG whose position is part of the snapshot, so a restored
/// module rolls the same outcomes.
#[derive(Clone, Debug)]
pub struct ResistanceModule {
    /// Name → remaining seconds; `None` is permanent.
    immunities: FxHashMap<String, Option<f64>>,
    resist_chances: FxHashMap<String, f64>,
    rng: BuffRng,
    resisted: u32,
}

#[derive(Serialize, Deserialize)]
struct ResistanceData {
    #[serde(default)]
    immunities: FxHashMap<String, Option<f64>>,
    #[serde(default)]
    resist_chances: FxHashMap<String, f64>,
    rng: RngState,
    #[serde(default)]
    resisted: u32,
}

impl ResistanceModule {
    /// Snapshot type tag.
    pub const TYPE_TAG: &'static str = "ResistanceModule";

    /// Create a module rolling on the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            immunities: FxHashMap::default(),
            resist_chances: FxHashMap::default(),
            rng: BuffRng::new(seed).for_context("resist"),
            resisted: 0,
        }
    }

    /// Add an immunity (builder pattern). A duration ≤ 0 is permanent.
    #[must_use]
    pub fn with_immunity(mut self, name: impl Into<String>, duration: f64) -> Self {
        self.add_immunity(name, duration);
        self
    }

    /// Set a resist chance in `[0, 1]` (builder pattern).
    #[must_use]
    pub fn with_resist_chance(mut self, name: impl Into<String>, chance: f64) -> Self {
        self.set_resist_chance(name, chance);
        self
    }

    /// Add or replace an immunity. A duration ≤ 0 is permanent.
    pub fn add_immunity(&mut self, name: impl Into<String>, duration: f64) {
        let remaining = (duration > 0.0).then_some(duration);
        self.immunities.insert(name.into(), remaining);
    }

    /// Drop an immunity.
    pub fn remove_immunity(&mut self, name: &str) -> bool {
        self.immunities.remove(name).is_some()
    }

    /// Whether the owner is immune to a name.
    #[must_use]
    pub fn is_immune(&self, name: &str) -> bool {
        self.immunities.contains_key(name)
    }

    /// Seconds of immunity left; `None` when permanent or absent.
    #[must_use]
    pub fn immunity_remaining(&self, name: &str) -> Option<f64> {
        self.immunities.get(name).copied().flatten()
    }

    /// Set a resist chance, clamped to `[0, 1]`.
    pub fn set_resist_chance(&mut self, name: impl Into<String>, chance: f64) {
        self.resist_chances.insert(name.into(), chance.clamp(0.0, 1.0));
    }

    /// Resist chance for a name (0 when unset).
    #[must_use]
    pub fn resist_chance(&self, name: &str) -> f64 {
        self.resist_chances.get(name).copied().unwrap_or(0.0)
    }

    /// Applications resisted so far.
    #[must_use]
    pub fn resisted(&self) -> u32 {
        self.resisted
    }

    /// Rebuild from snapshot data.
    pub fn from_data(data: serde_json::Value) -> Result<Self, BuffError> {
        let data: ResistanceData = serde_json::from_value(data)?;
        Ok(Self {
            immunities: data.immunities,
            resist_chances: data.resist_chances,
            rng: BuffRng::from_state(&data.rng),
            resisted: data.resisted,
        })
    }
}

impl HookModule for ResistanceModule {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn before_apply(&mut self, buff: &Buff, _ctx: &mut HookContext<'_>) -> bool {
        let name = buff.name();
        if self.is_immune(name) {
            debug!(name = %name, "immune");
            return false;
        }
        let chance = self.resist_chance(name);
        if chance > 0.0 && self.rng.chance(chance) {
            self.resisted += 1;
            debug!(name = %name, chance, "resisted");
            return false;
        }
        true
    }

    fn process(&mut self, delta: f64, _ctx: &mut HookContext<'_>) {
        self.immunities.retain(|name, remaining| match remaining {
            None => true,
            Some(left) => {
                *left -= delta;
                if *left > 0.0 {
                    true
                } else {
                    debug!(name = %name, "immunity expired");
                    false
                }
            }
        });
    }

    fn to_data(&self) -> serde_json::Value {
        serde_json::json!({
            "immunities": self.immunities,
            "resist_chances": self.resist_chances,
            "rng": self.rng.state(),
            "resisted": self.resisted,
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
