//! Bounded numeric attributes.
//!
//! A [`Stat`] is a plain value type: it holds its components and computes
//! its observable value, and every write returns a [`StatUpdate`] that says
//! what actually changed. Observation (listeners, bindings) lives on
//! [`StatHandle`](super::StatHandle), which wraps a `Stat` for sharing.
//!
//! ## Computation
//!
//! ```text
//! max   = max(max_value * (1 + max_percent / 100) + max_flat, min_value)
//! raw   = base * (1 + percent / 100) + flat
//! value = clamp(raw, min, max)      (when final clamping is enabled)
//! ```
//!
//! When `min == max` the value collapses to that point regardless of
//! modifiers or clamp flags.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::modifiers::ModifierKind;

/// Values whose difference is at most this are considered unchanged.
const CHANGE_EPSILON: f64 = 1e-9;

/// Payload of a stat change notification.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatChange {
    /// Computed value after the write.
    pub new_value: f64,
    /// Effective maximum after the write.
    pub new_max: f64,
    /// Computed value before the write.
    pub old_value: f64,
    /// Effective maximum before the write.
    pub old_max: f64,
}

/// Result of a single write to a [`Stat`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatUpdate {
    /// Delta actually written to the addressed component after clamping.
    ///
    /// Writing `-delta` to the same component reverses the write exactly.
    pub delta: f64,
    /// Present when the computed value or maximum changed and signalling
    /// is enabled.
    pub change: Option<StatChange>,
}

/// A bounded, dynamic numeric attribute.
///
/// ```
/// use buff_engine::stats::Stat;
///
/// let mut health = Stat::new(100.0, 0.0, 200.0);
/// health.add_flat(10.0);
/// health.add_percent(50.0);
/// assert_eq!(health.get_value(), 160.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    base_value: f64,
    min_value: f64,
    max_value: f64,
    flat_modifier: f64,
    percent_modifier: f64,
    #[serde(default)]
    max_flat_modifier: f64,
    #[serde(default)]
    max_percent_modifier: f64,
    clamp_base: bool,
    clamp_value: bool,
    signals_enabled: bool,
    #[serde(skip)]
    value: f64,
}

impl Stat {
    /// Create a stat with both clamp flags and signalling enabled.
    ///
    /// Bounds given in the wrong order are swapped.
    #[must_use]
    pub fn new(base_value: f64, min_value: f64, max_value: f64) -> Self {
        let (min_value, max_value) = if min_value <= max_value {
            (min_value, max_value)
        } else {
            (max_value, min_value)
        };
        let mut stat = Self {
            base_value,
            min_value,
            max_value,
            flat_modifier: 0.0,
            percent_modifier: 0.0,
            max_flat_modifier: 0.0,
            max_percent_modifier: 0.0,
            clamp_base: true,
            clamp_value: true,
            signals_enabled: true,
            value: 0.0,
        };
        stat.base_value = stat.clamp_base_write(base_value);
        stat.value = stat.compute_value();
        stat
    }

    /// Create an unbounded stat.
    #[must_use]
    pub fn unbounded(base_value: f64) -> Self {
        Self::new(base_value, f64::MIN, f64::MAX)
    }

    /// Enable or disable clamping of the base value on write.
    #[must_use]
    pub fn with_clamp_base(mut self, clamp: bool) -> Self {
        self.clamp_base = clamp;
        self.base_value = self.clamp_base_write(self.base_value);
        self.value = self.compute_value();
        self
    }

    /// Enable or disable clamping of the final computed value.
    #[must_use]
    pub fn with_clamp_value(mut self, clamp: bool) -> Self {
        self.clamp_value = clamp;
        self.value = self.compute_value();
        self
    }

    /// Enable or disable change signalling.
    #[must_use]
    pub fn with_signals(mut self, enabled: bool) -> Self {
        self.signals_enabled = enabled;
        self
    }

    // === Reads ===

    /// Cached computed value.
    #[must_use]
    pub fn get_value(&self) -> f64 {
        self.value
    }

    /// Effective maximum (never below the minimum).
    #[must_use]
    pub fn get_max(&self) -> f64 {
        let max = self.max_value * (1.0 + self.max_percent_modifier / 100.0)
            + self.max_flat_modifier;
        max.max(self.min_value)
    }

    /// Minimum bound.
    #[must_use]
    pub fn get_min(&self) -> f64 {
        self.min_value
    }

    /// Base value before flat/percent adjustments.
    #[must_use]
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Sum of flat adjustments.
    #[must_use]
    pub fn flat_modifier(&self) -> f64 {
        self.flat_modifier
    }

    /// Sum of percent adjustments, in percentage points.
    #[must_use]
    pub fn percent_modifier(&self) -> f64 {
        self.percent_modifier
    }

    /// Whether change notifications are produced.
    #[must_use]
    pub fn signals_enabled(&self) -> bool {
        self.signals_enabled
    }

    // === Writes ===

    /// Enable or disable change signalling.
    pub fn set_signals_enabled(&mut self, enabled: bool) {
        self.signals_enabled = enabled;
    }

    /// Set the base value, clamped when base clamping is enabled.
    pub fn set_base_value(&mut self, value: f64) -> StatUpdate {
        let before = self.snapshot();
        let old_base = self.base_value;
        self.base_value = self.clamp_base_write(value);
        self.finish(self.base_value - old_base, before)
    }

    /// Add to the base value.
    pub fn add_value(&mut self, amount: f64) -> StatUpdate {
        let before = self.snapshot();
        let old_base = self.base_value;
        self.base_value = self.clamp_base_write(old_base + amount);
        self.finish(self.base_value - old_base, before)
    }

    /// Add a flat adjustment.
    pub fn add_flat(&mut self, amount: f64) -> StatUpdate {
        let before = self.snapshot();
        self.flat_modifier += amount;
        self.finish(amount, before)
    }

    /// Add a percent adjustment, in percentage points.
    pub fn add_percent(&mut self, amount: f64) -> StatUpdate {
        let before = self.snapshot();
        self.percent_modifier += amount;
        self.finish(amount, before)
    }

    /// Add to the maximum bound. The bound never drops below the minimum.
    pub fn add_max_value(&mut self, amount: f64) -> StatUpdate {
        let before = self.snapshot();
        let old = self.max_value;
        let requested = old + amount;
        self.max_value = requested.max(self.min_value);
        if self.max_value != requested {
            debug!(requested, max = self.max_value, "max value clamped to minimum");
        }
        self.finish(self.max_value - old, before)
    }

    /// Add a flat adjustment to the maximum.
    pub fn add_max_flat(&mut self, amount: f64) -> StatUpdate {
        let before = self.snapshot();
        self.max_flat_modifier += amount;
        self.finish(amount, before)
    }

    /// Add a percent adjustment to the maximum, in percentage points.
    pub fn add_max_percent(&mut self, amount: f64) -> StatUpdate {
        let before = self.snapshot();
        self.max_percent_modifier += amount;
        self.finish(amount, before)
    }

    /// Add to the minimum bound. The bound never rises above the maximum.
    pub fn add_min_value(&mut self, amount: f64) -> StatUpdate {
        let before = self.snapshot();
        let old = self.min_value;
        let requested = old + amount;
        self.min_value = requested.min(self.get_max());
        if self.min_value != requested {
            debug!(requested, min = self.min_value, "min value clamped to maximum");
        }
        self.finish(self.min_value - old, before)
    }

    /// Write `amount` to the component addressed by `kind`.
    pub fn apply(&mut self, kind: ModifierKind, amount: f64) -> StatUpdate {
        match kind {
            ModifierKind::Flat => self.add_flat(amount),
            ModifierKind::Percent => self.add_percent(amount),
            ModifierKind::Value => self.add_value(amount),
            ModifierKind::MaxValue => self.add_max_value(amount),
            ModifierKind::MaxFlat => self.add_max_flat(amount),
            ModifierKind::MaxPercent => self.add_max_percent(amount),
            ModifierKind::MinValue => self.add_min_value(amount),
        }
    }

    /// Recompute the cached value after deserialization.
    pub fn refresh(&mut self) {
        self.value = self.compute_value();
    }

    // === Internals ===

    fn snapshot(&self) -> (f64, f64) {
        (self.value, self.get_max())
    }

    fn finish(&mut self, delta: f64, (old_value, old_max): (f64, f64)) -> StatUpdate {
        self.value = self.compute_value();
        let new_max = self.get_max();

        let changed = (self.value - old_value).abs() > CHANGE_EPSILON
            || (new_max - old_max).abs() > CHANGE_EPSILON;

        let change = (changed && self.signals_enabled).then_some(StatChange {
            new_value: self.value,
            new_max,
            old_value,
            old_max,
        });

        StatUpdate { delta, change }
    }

    fn clamp_base_write(&self, value: f64) -> f64 {
        if !self.clamp_base {
            return value;
        }
        let clamped = clamp(value, self.min_value, self.get_max());
        if clamped != value {
            debug!(requested = value, clamped, "base value write clamped");
        }
        clamped
    }

    fn compute_value(&self) -> f64 {
        let min = self.min_value;
        let max = self.get_max();
        if min == max {
            return min;
        }

        let raw = self.base_value * (1.0 + self.percent_modifier / 100.0) + self.flat_modifier;
        if self.clamp_value {
            clamp(raw, min, max)
        } else {
            raw
        }
    }
}

/// Clamp that tolerates `lo > hi` by preferring `lo`.
fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(hi).max(lo)
}
