//! Modifier sets with a duration and periodic ticks.
//!
//! A [`TimedModifierSet`] wraps a [`ModifierSet`] and advances two
//! cooperative timers on every `process(delta)` call:
//!
//! - the **interval** timer, which re-applies the set's repeatable modifiers
//!   once per elapsed interval, up to `total_ticks` times (-1 is unbounded)
//! - the **duration** timer, which marks the set for deletion once it runs
//!   out (a duration ≤ 0 never runs out)
//!
//! A set with unlimited duration but a tick budget is done after its last
//! tick.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::BuffError;
use crate::stats::StatOwner;

use super::modifier::EPSILON;
use super::set::{ModifierSet, ValueMerge};

/// Shortest interval a periodic tick runs at.
pub const MIN_INTERVAL: f64 = 1e-3;

/// Most periodic ticks caught up by one `process` call.
pub const MAX_CATCH_UP_TICKS: u32 = 1024;

/// How durations combine on merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationMerge {
    /// Leave the running timer alone.
    Keep,
    /// Extend by the incoming duration and tick budget.
    Add,
    /// Restart with the incoming duration and tick budget.
    #[default]
    Refresh,
}

bitflags! {
    /// Combinable merge flags, decoded into a [`MergePolicy`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MergeFlags: u8 {
        /// Extend the duration.
        const ADD_DURATION     = 1 << 0;
        /// Add magnitudes.
        const ADD_VALUE        = 1 << 1;
        /// Restart the duration.
        const REFRESH_DURATION = 1 << 2;
    }
}

/// Combined duration and value rules applied when a timed set is re-applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Duration rule.
    #[serde(default)]
    pub duration: DurationMerge,
    /// Magnitude rule.
    #[serde(default)]
    pub value: ValueMerge,
}

impl MergePolicy {
    /// Create a policy from its two rules.
    #[must_use]
    pub fn new(duration: DurationMerge, value: ValueMerge) -> Self {
        Self { duration, value }
    }

    /// Decode combinable merge flags.
    ///
    /// Without a duration flag the timer is kept; without `ADD_VALUE`
    /// magnitudes are refreshed. `ADD_DURATION | REFRESH_DURATION` is
    /// contradictory and rejected.
    pub fn from_flags(flags: MergeFlags) -> Result<Self, BuffError> {
        let duration = match (
            flags.contains(MergeFlags::ADD_DURATION),
            flags.contains(MergeFlags::REFRESH_DURATION),
        ) {
            (true, true) => return Err(BuffError::InvalidMergeFlags(flags)),
            (true, false) => DurationMerge::Add,
            (false, true) => DurationMerge::Refresh,
            (false, false) => DurationMerge::Keep,
        };
        let value = if flags.contains(MergeFlags::ADD_VALUE) {
            ValueMerge::Add
        } else {
            ValueMerge::Refresh
        };
        Ok(Self { duration, value })
    }

    /// Decode raw flag bits, dropping unknown ones.
    pub fn from_bits(bits: u8) -> Result<Self, BuffError> {
        let flags = MergeFlags::from_bits_truncate(bits);
        if flags.bits() != bits {
            warn!(bits, "ignoring unknown merge flag bits");
        }
        Self::from_flags(flags)
    }

    /// Encode back into flags.
    #[must_use]
    pub fn flags(&self) -> MergeFlags {
        let mut flags = match self.duration {
            DurationMerge::Keep => MergeFlags::empty(),
            DurationMerge::Add => MergeFlags::ADD_DURATION,
            DurationMerge::Refresh => MergeFlags::REFRESH_DURATION,
        };
        flags.set(MergeFlags::ADD_VALUE, self.value == ValueMerge::Add);
        flags
    }
}

fn unbounded_ticks() -> i32 {
    -1
}

fn default_true() -> bool {
    true
}

/// A modifier set with duration and periodic-tick semantics.
///
/// ```
/// use buff_engine::modifiers::{Modifier, ModifierSet};
/// use buff_engine::stats::{Stat, StatBlock, StatOwner};
///
/// let stats = StatBlock::new().with_stat("health", Stat::new(100.0, 0.0, 100.0));
/// let mut poison = ModifierSet::new("poison")
///     .with_modifier(Modifier::value("health", -5.0))
///     .timed(3.0)
///     .with_interval(1.0)
///     .with_apply_at_start(false)
///     .with_remove_effect_on_finish(false);
///
/// poison.init(&stats);
/// poison.process(3.0, &stats);
///
/// assert_eq!(stats.get_stat("health").unwrap().get_value(), 85.0);
/// assert!(poison.is_marked_for_deletion());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimedModifierSet {
    /// The wrapped set.
    pub set: ModifierSet,
    /// Lifetime in seconds; ≤ 0 is unlimited.
    pub duration: f64,
    /// Seconds between periodic ticks; ≤ 0 disables them. Positive values
    /// below [`MIN_INTERVAL`] tick at [`MIN_INTERVAL`].
    #[serde(default)]
    pub interval: f64,
    /// Tick budget; -1 is unbounded.
    #[serde(default = "unbounded_ticks")]
    pub total_ticks: i32,
    /// Apply the modifiers when the set is registered.
    #[serde(default = "default_true")]
    pub apply_at_start: bool,
    /// Reverse the contribution when the set leaves the registry.
    #[serde(default = "default_true")]
    pub remove_effect_on_finish: bool,
    /// Re-application rules.
    #[serde(default)]
    pub merge_policy: MergePolicy,
    #[serde(default)]
    elapsed: f64,
    #[serde(default)]
    interval_elapsed: f64,
    #[serde(default)]
    ticks_done: u32,
}

impl TimedModifierSet {
    /// Wrap a set with a duration.
    #[must_use]
    pub fn new(set: ModifierSet, duration: f64) -> Self {
        Self {
            set,
            duration,
            interval: 0.0,
            total_ticks: unbounded_ticks(),
            apply_at_start: true,
            remove_effect_on_finish: true,
            merge_policy: MergePolicy::default(),
            elapsed: 0.0,
            interval_elapsed: 0.0,
            ticks_done: 0,
        }
    }

    /// Set the tick interval (builder pattern).
    #[must_use]
    pub fn with_interval(mut self, interval: f64) -> Self {
        self.interval = interval;
        self
    }

    /// Set the tick budget (builder pattern).
    #[must_use]
    pub fn with_total_ticks(mut self, total_ticks: i32) -> Self {
        self.total_ticks = total_ticks;
        self
    }

    /// Set whether modifiers apply on registration (builder pattern).
    #[must_use]
    pub fn with_apply_at_start(mut self, apply: bool) -> Self {
        self.apply_at_start = apply;
        self
    }

    /// Set whether removal reverses the contribution (builder pattern).
    #[must_use]
    pub fn with_remove_effect_on_finish(mut self, remove: bool) -> Self {
        self.remove_effect_on_finish = remove;
        self
    }

    /// Set the merge policy (builder pattern).
    #[must_use]
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Whether the duration never runs out.
    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.duration <= 0.0
    }

    /// Seconds elapsed since the timer (re)started.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Seconds left, or `None` for an unlimited duration.
    #[must_use]
    pub fn remaining(&self) -> Option<f64> {
        (!self.is_infinite()).then(|| (self.duration - self.elapsed).max(0.0))
    }

    /// Periodic ticks performed.
    #[must_use]
    pub fn ticks_done(&self) -> u32 {
        self.ticks_done
    }

    /// Whether periodic ticks remain.
    #[must_use]
    pub fn has_ticks_left(&self) -> bool {
        self.interval > 0.0 && (self.total_ticks < 0 || i64::from(self.ticks_done) < i64::from(self.total_ticks))
    }

    /// Whether the set is due for removal.
    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.set.is_marked_for_deletion()
    }

    /// Prepare a freshly registered instance.
    pub fn init(&mut self, owner: &dyn StatOwner) {
        self.set.init(owner, self.apply_at_start);
    }

    /// Advance both timers by `delta` seconds.
    pub fn process(&mut self, delta: f64, owner: &dyn StatOwner) {
        if self.is_marked_for_deletion() || delta <= 0.0 {
            return;
        }

        if self.has_ticks_left() {
            let interval = self.interval.max(MIN_INTERVAL);
            self.interval_elapsed += delta;
            let mut caught_up = 0;
            while self.has_ticks_left() && self.interval_elapsed + EPSILON >= interval {
                if caught_up == MAX_CATCH_UP_TICKS {
                    warn!(
                        name = %self.set.name,
                        dropped = self.interval_elapsed,
                        "periodic ticks capped for this update"
                    );
                    self.interval_elapsed %= interval;
                    break;
                }
                self.interval_elapsed -= interval;
                self.ticks_done = self.ticks_done.saturating_add(1);
                caught_up += 1;
                self.set.tick(owner);
            }
        }

        if self.is_infinite() {
            if self.interval > 0.0 && self.total_ticks >= 0 && !self.has_ticks_left() {
                self.set.mark_for_deletion();
            }
            return;
        }

        self.elapsed += delta;
        if self.elapsed + EPSILON >= self.duration {
            self.set.mark_for_deletion();
        }
    }

    /// Combine a same-named incoming timed set, following this instance's
    /// merge policy.
    pub fn merge(&mut self, other: &TimedModifierSet, owner: &dyn StatOwner) {
        match self.merge_policy.duration {
            DurationMerge::Keep => {}
            DurationMerge::Add => {
                self.duration = if self.is_infinite() || other.is_infinite() {
                    0.0
                } else {
                    self.duration + other.duration
                };
                if self.total_ticks >= 0 && other.total_ticks >= 0 {
                    self.total_ticks += other.total_ticks;
                } else {
                    self.total_ticks = -1;
                }
            }
            DurationMerge::Refresh => {
                self.duration = other.duration;
                self.total_ticks = other.total_ticks;
                self.elapsed = 0.0;
                self.interval_elapsed = 0.0;
                self.ticks_done = 0;
            }
        }
        self.set.merge(&other.set, owner, self.merge_policy.value);
    }
}
