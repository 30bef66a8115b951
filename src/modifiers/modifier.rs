//! Atomic, reversible stat modifiers.
//!
//! A [`Modifier`] changes one component of one stat. It records the exact
//! delta the stat reported for every write, so reversing by the recorded
//! net contribution restores the stat exactly, clamping included.
//!
//! ## Composite Modifiers
//!
//! A modifier's amount comes from its [`MagnitudeSource`]:
//!
//! - `Constant`: the magnitude itself
//! - `Stat`: a reading of another stat times the magnitude (coefficient)
//! - `Formula`: an expression over stat readings times the magnitude
//!
//! Composite modifiers are live by default: on first apply they subscribe to
//! every stat they read, and when one changes they restate their
//! contribution on the target. A snapshotted composite instead freezes the
//! reading it took at first apply; the magnitude still scales it, and the
//! source stays as defined so merges find the same slot.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::stats::{ListenerId, StatChange, StatHandle, StatOwner, WeakStatHandle};

use super::formula::Formula;

/// Contributions at or below this magnitude count as fully removed.
pub(crate) const EPSILON: f64 = 1e-6;

/// Which stat component a modifier writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierKind {
    /// Flat adjustment on top of the scaled base.
    #[default]
    Flat,
    /// Percent adjustment of the base, in percentage points.
    Percent,
    /// The base value itself.
    Value,
    /// The maximum bound.
    MaxValue,
    /// Flat adjustment of the maximum.
    MaxFlat,
    /// Percent adjustment of the maximum.
    MaxPercent,
    /// The minimum bound.
    MinValue,
}

impl ModifierKind {
    /// Every kind, in declaration order.
    pub const ALL: [ModifierKind; 7] = [
        ModifierKind::Flat,
        ModifierKind::Percent,
        ModifierKind::Value,
        ModifierKind::MaxValue,
        ModifierKind::MaxFlat,
        ModifierKind::MaxPercent,
        ModifierKind::MinValue,
    ];
}

/// Which reading of a stat a composite modifier uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatReading {
    /// Computed value.
    #[default]
    Value,
    /// Effective maximum.
    Max,
    /// Minimum bound.
    Min,
    /// Base value.
    Base,
}

impl StatReading {
    /// Parse a formula field suffix (`value`, `max`, `min`, `base`).
    #[must_use]
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "value" => Some(Self::Value),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "base" => Some(Self::Base),
            _ => None,
        }
    }

    /// Read from a stat.
    #[must_use]
    pub fn read(self, stat: &StatHandle) -> f64 {
        match self {
            Self::Value => stat.get_value(),
            Self::Max => stat.get_max(),
            Self::Min => stat.get_min(),
            Self::Base => stat.base_value(),
        }
    }
}

/// Where a modifier's amount comes from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MagnitudeSource {
    /// The magnitude is the amount.
    #[default]
    Constant,
    /// A reading of another stat, scaled by the magnitude.
    Stat {
        name: String,
        #[serde(default)]
        reading: StatReading,
    },
    /// A formula over stat readings, scaled by the magnitude.
    Formula { formula: Formula },
}

impl MagnitudeSource {
    /// Stat names this source reads.
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        match self {
            Self::Constant => Vec::new(),
            Self::Stat { name, .. } => vec![name.clone()],
            Self::Formula { formula } => formula.references(),
        }
    }
}

type Lookup<'a> = &'a dyn Fn(&str, StatReading) -> Option<f64>;

/// Unscaled reading of a source (1 for a constant), or `None` when the
/// source is an invalid formula.
fn reading_from(source: &MagnitudeSource, lookup: Lookup<'_>) -> Option<f64> {
    match source {
        MagnitudeSource::Constant => Some(1.0),
        MagnitudeSource::Stat { name, reading } => Some(lookup(name, *reading).unwrap_or_else(|| {
            warn!(stat = %name, "composite modifier references missing stat, using 0");
            0.0
        })),
        MagnitudeSource::Formula { formula } => formula.eval(lookup),
    }
}

/// Amount of one application, or `None` when the source is an invalid formula.
fn amount_from(source: &MagnitudeSource, magnitude: f64, lookup: Lookup<'_>) -> Option<f64> {
    reading_from(source, lookup).map(|reading| reading * magnitude)
}

/// Application state, shared with live listeners.
#[derive(Debug, Default)]
struct Tracking {
    applied: Cell<bool>,
    /// Net contribution currently written to the target.
    value: Cell<f64>,
    applications: Cell<u32>,
    /// Magnitude in effect, mirrored for listeners.
    coefficient: Cell<f64>,
    /// Set while this modifier writes its target.
    updating: Cell<bool>,
}

impl Tracking {
    fn write(&self, target: &StatHandle, kind: ModifierKind, amount: f64) -> f64 {
        self.updating.set(true);
        let delta = target.apply(kind, amount);
        self.updating.set(false);
        delta
    }

    /// Replace the whole contribution with `amount` per application.
    fn restate(&self, target: &StatHandle, kind: ModifierKind, amount: f64) {
        let current = self.value.get();
        let reverted = self.write(target, kind, -current);
        let total = amount * f64::from(self.applications.get());
        let delta = self.write(target, kind, total);
        self.value.set(current + reverted + delta);
    }

    fn reset(&self) {
        self.applied.set(false);
        self.value.set(0.0);
        self.applications.set(0);
    }
}

/// Listener state for a live composite.
struct LiveLink {
    target: WeakStatHandle,
    refs: Rc<Vec<(String, WeakStatHandle)>>,
    tracking: Rc<Tracking>,
    source: MagnitudeSource,
    kind: ModifierKind,
}

impl LiveLink {
    fn refresh(&self) {
        let tracking = &self.tracking;
        if tracking.updating.get() || !tracking.applied.get() {
            return;
        }
        let Some(target) = self.target.upgrade() else {
            return;
        };

        let lookup = |name: &str, reading: StatReading| {
            self.refs
                .iter()
                .find(|(n, _)| n == name)
                .and_then(|(_, weak)| weak.upgrade())
                .map(|stat| reading.read(&stat))
        };
        if let Some(amount) = amount_from(&self.source, tracking.coefficient.get(), &lookup) {
            tracking.restate(&target, self.kind, amount);
        }
    }
}

#[derive(Debug)]
struct Subscription {
    stat: WeakStatHandle,
    id: ListenerId,
}

/// An atomic, reversible rule changing one stat.
///
/// ```
/// use buff_engine::modifiers::Modifier;
/// use buff_engine::stats::{Stat, StatBlock, StatOwner};
///
/// let stats = StatBlock::new().with_stat("armor", Stat::new(10.0, 0.0, 100.0));
/// let mut plating = Modifier::flat("armor", 5.0);
///
/// assert!(plating.apply(&stats));
/// assert_eq!(stats.get_stat("armor").unwrap().get_value(), 15.0);
///
/// plating.remove(&stats, true);
/// assert_eq!(stats.get_stat("armor").unwrap().get_value(), 10.0);
/// ```
///
/// Cloning yields an unapplied copy of the definition.
#[derive(Debug, Serialize, Deserialize)]
pub struct Modifier {
    stat_name: String,
    kind: ModifierKind,
    magnitude: f64,
    #[serde(default)]
    source: MagnitudeSource,
    #[serde(default)]
    snapshot: bool,
    #[serde(default)]
    apply_only_once: bool,
    /// Source reading captured by a snapshotted composite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frozen: Option<f64>,
    #[serde(skip)]
    tracking: Rc<Tracking>,
    #[serde(skip)]
    subscriptions: Vec<Subscription>,
}

impl Modifier {
    /// Create a constant modifier.
    pub fn new(stat_name: impl Into<String>, kind: ModifierKind, magnitude: f64) -> Self {
        Self {
            stat_name: stat_name.into(),
            kind,
            magnitude,
            source: MagnitudeSource::Constant,
            snapshot: false,
            apply_only_once: false,
            frozen: None,
            tracking: Rc::default(),
            subscriptions: Vec::new(),
        }
    }

    /// Flat adjustment.
    pub fn flat(stat_name: impl Into<String>, amount: f64) -> Self {
        Self::new(stat_name, ModifierKind::Flat, amount)
    }

    /// Percent adjustment, in percentage points.
    pub fn percent(stat_name: impl Into<String>, amount: f64) -> Self {
        Self::new(stat_name, ModifierKind::Percent, amount)
    }

    /// Base value change.
    pub fn value(stat_name: impl Into<String>, amount: f64) -> Self {
        Self::new(stat_name, ModifierKind::Value, amount)
    }

    /// Maximum bound change.
    pub fn max_value(stat_name: impl Into<String>, amount: f64) -> Self {
        Self::new(stat_name, ModifierKind::MaxValue, amount)
    }

    /// Flat adjustment of the maximum.
    pub fn max_flat(stat_name: impl Into<String>, amount: f64) -> Self {
        Self::new(stat_name, ModifierKind::MaxFlat, amount)
    }

    /// Percent adjustment of the maximum.
    pub fn max_percent(stat_name: impl Into<String>, amount: f64) -> Self {
        Self::new(stat_name, ModifierKind::MaxPercent, amount)
    }

    /// Minimum bound change.
    pub fn min_value(stat_name: impl Into<String>, amount: f64) -> Self {
        Self::new(stat_name, ModifierKind::MinValue, amount)
    }

    /// Composite: `coefficient * reading(reference)`.
    pub fn from_stat(
        stat_name: impl Into<String>,
        kind: ModifierKind,
        reference: impl Into<String>,
        reading: StatReading,
        coefficient: f64,
    ) -> Self {
        let mut modifier = Self::new(stat_name, kind, coefficient);
        modifier.source = MagnitudeSource::Stat {
            name: reference.into(),
            reading,
        };
        modifier
    }

    /// Composite: the value of a formula.
    ///
    /// A malformed formula leaves the modifier permanently invalid.
    pub fn from_formula(stat_name: impl Into<String>, kind: ModifierKind, formula: impl Into<String>) -> Self {
        let mut modifier = Self::new(stat_name, kind, 1.0);
        modifier.source = MagnitudeSource::Formula {
            formula: Formula::new(formula),
        };
        modifier
    }

    /// Freeze composite readings at first apply (builder pattern).
    #[must_use]
    pub fn snapshotted(mut self) -> Self {
        self.snapshot = true;
        self
    }

    /// Apply at most once; periodic ticks skip it (builder pattern).
    #[must_use]
    pub fn once(mut self) -> Self {
        self.apply_only_once = true;
        self
    }

    // === Accessors ===

    /// Target stat name.
    #[must_use]
    pub fn stat_name(&self) -> &str {
        &self.stat_name
    }

    /// Component written.
    #[must_use]
    pub fn kind(&self) -> ModifierKind {
        self.kind
    }

    /// Amount (constant) or coefficient (composite).
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    /// Magnitude source.
    #[must_use]
    pub fn source(&self) -> &MagnitudeSource {
        &self.source
    }

    /// Whether the amount derives from other stats.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        !matches!(self.source, MagnitudeSource::Constant)
    }

    /// Whether composite readings are frozen at first apply.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.snapshot
    }

    /// The reading a snapshotted composite froze, once applied.
    #[must_use]
    pub fn frozen_reading(&self) -> Option<f64> {
        self.frozen
    }

    /// Whether the modifier applies at most once.
    #[must_use]
    pub fn apply_only_once(&self) -> bool {
        self.apply_only_once
    }

    /// False for a modifier whose formula failed to parse.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match &self.source {
            MagnitudeSource::Formula { formula } => formula.is_valid(),
            _ => true,
        }
    }

    /// Whether the modifier currently contributes to its target.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.tracking.applied.get()
    }

    /// Net contribution currently written to the target.
    #[must_use]
    pub fn applied_value(&self) -> f64 {
        self.tracking.value.get()
    }

    /// Number of applications making up the contribution.
    #[must_use]
    pub fn applications(&self) -> u32 {
        self.tracking.applications.get()
    }

    /// Whether [`apply`](Self::apply) would do anything.
    #[must_use]
    pub fn can_apply(&self) -> bool {
        self.is_valid() && !(self.apply_only_once && self.is_applied())
    }

    /// Whether two modifiers address the same slot (stat, kind, source).
    #[must_use]
    pub fn same_slot(&self, other: &Modifier) -> bool {
        self.stat_name == other.stat_name && self.kind == other.kind && self.source == other.source
    }

    // === Operations ===

    /// Amount of one application against the current readings.
    ///
    /// `None` only for an invalid formula.
    pub fn evaluate(&self, owner: &dyn StatOwner) -> Option<f64> {
        self.reading(owner).map(|reading| reading * self.magnitude)
    }

    fn reading(&self, owner: &dyn StatOwner) -> Option<f64> {
        if let Some(frozen) = self.frozen {
            return Some(frozen);
        }
        let lookup =
            |name: &str, reading: StatReading| owner.get_stat(name).map(|stat| reading.read(&stat));
        reading_from(&self.source, &lookup)
    }

    /// Apply once to the target stat. Returns false if nothing was written.
    pub fn apply(&mut self, owner: &dyn StatOwner) -> bool {
        if !self.can_apply() {
            if !self.is_valid() {
                warn!(stat = %self.stat_name, "skipping invalid modifier");
            }
            return false;
        }
        let Some(target) = owner.get_stat(&self.stat_name) else {
            warn!(stat = %self.stat_name, "modifier target stat not found");
            return false;
        };
        let Some(reading) = self.reading(owner) else {
            return false;
        };
        if self.snapshot && self.is_composite() {
            self.frozen = Some(reading);
        }
        let amount = reading * self.magnitude;

        let tracking = &self.tracking;
        let delta = tracking.write(&target, self.kind, amount);
        tracking.value.set(tracking.value.get() + delta);
        tracking.applications.set(tracking.applications.get() + 1);
        tracking.coefficient.set(self.magnitude);
        tracking.applied.set(true);

        if self.is_composite() && !self.snapshot && self.subscriptions.is_empty() {
            self.subscribe(owner, &target);
        }
        true
    }

    /// Reverse the contribution.
    ///
    /// A full removal reverses the recorded net contribution. A partial one
    /// reverses a single application at its current amount. The modifier
    /// counts as unapplied once its contribution is back to zero.
    pub fn remove(&mut self, owner: &dyn StatOwner, full: bool) -> bool {
        if !self.is_applied() {
            return false;
        }
        let Some(target) = owner.get_stat(&self.stat_name) else {
            warn!(stat = %self.stat_name, "modifier target stat not found on removal");
            return false;
        };

        let current = self.tracking.value.get();
        let applications = self.tracking.applications.get();
        let partial = !full && applications > 1;
        let amount = if partial {
            self.evaluate(owner).unwrap_or(current / f64::from(applications))
        } else {
            current
        };

        let delta = self.tracking.write(&target, self.kind, -amount);
        let remaining = current + delta;

        if remaining.abs() <= EPSILON {
            self.tracking.reset();
            self.unsubscribe();
        } else {
            self.tracking.value.set(remaining);
            let left = if partial { applications - 1 } else { applications };
            self.tracking.applications.set(left.max(1));
        }
        true
    }

    /// Change the magnitude, restating the current contribution.
    ///
    /// The contribution becomes the new per-application amount times the
    /// number of applications, as if the modifier had always had this
    /// magnitude.
    pub fn set_magnitude(&mut self, owner: &dyn StatOwner, magnitude: f64) {
        self.magnitude = magnitude;
        self.tracking.coefficient.set(magnitude);
        if !self.is_applied() {
            return;
        }
        let Some(target) = owner.get_stat(&self.stat_name) else {
            warn!(stat = %self.stat_name, "modifier target stat not found on merge");
            return;
        };
        if let Some(amount) = self.evaluate(owner) {
            self.tracking.restate(&target, self.kind, amount);
        }
    }

    fn subscribe(&mut self, owner: &dyn StatOwner, target: &StatHandle) {
        let mut refs = Vec::new();
        for name in self.source.references() {
            match owner.get_stat(&name) {
                Some(stat) => refs.push((name, stat.downgrade())),
                None => warn!(stat = %name, "composite modifier cannot watch missing stat"),
            }
        }
        let refs = Rc::new(refs);

        for (_, weak) in refs.iter() {
            let Some(stat) = weak.upgrade() else {
                continue;
            };
            let link = LiveLink {
                target: target.downgrade(),
                refs: Rc::clone(&refs),
                tracking: Rc::clone(&self.tracking),
                source: self.source.clone(),
                kind: self.kind,
            };
            let id = stat.subscribe(move |_: &StatChange| link.refresh());
            self.subscriptions.push(Subscription {
                stat: weak.clone(),
                id,
            });
        }
    }

    fn unsubscribe(&mut self) {
        for sub in self.subscriptions.drain(..) {
            if let Some(stat) = sub.stat.upgrade() {
                stat.unsubscribe(sub.id);
            }
        }
    }
}

impl Clone for Modifier {
    fn clone(&self) -> Self {
        Self {
            stat_name: self.stat_name.clone(),
            kind: self.kind,
            magnitude: self.magnitude,
            source: self.source.clone(),
            snapshot: self.snapshot,
            apply_only_once: self.apply_only_once,
            frozen: None,
            tracking: Rc::default(),
            subscriptions: Vec::new(),
        }
    }
}

impl Drop for Modifier {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Stat, StatBlock};

    fn stats() -> StatBlock {
        StatBlock::new()
            .with_stat("health", Stat::new(100.0, 0.0, 200.0))
            .with_stat("strength", Stat::new(10.0, 0.0, 100.0))
            .with_stat("agility", Stat::new(4.0, 0.0, 100.0))
    }

    fn value(stats: &StatBlock, name: &str) -> f64 {
        stats.get_stat(name).unwrap().get_value()
    }

    #[test]
    fn test_apply_remove_every_kind() {
        for kind in ModifierKind::ALL {
            let stats = stats();
            let health = stats.get_stat("health").unwrap();
            let before = health.snapshot();

            let mut modifier = Modifier::new("health", kind, 30.0);
            assert!(modifier.apply(&stats), "{:?} should apply", kind);
            assert!(modifier.is_applied());

            assert!(modifier.remove(&stats, true));
            assert!(!modifier.is_applied());
            assert_eq!(modifier.applied_value(), 0.0);

            let after = health.snapshot();
            assert!((after.get_value() - before.get_value()).abs() < EPSILON, "{:?}", kind);
            assert!((after.get_max() - before.get_max()).abs() < EPSILON, "{:?}", kind);
            assert!((after.get_min() - before.get_min()).abs() < EPSILON, "{:?}", kind);
        }
    }

    #[test]
    fn test_applied_value_records_clamped_delta() {
        let stats = StatBlock::new().with_stat("health", Stat::new(190.0, 0.0, 200.0));
        let mut heal = Modifier::value("health", 50.0);

        heal.apply(&stats);
        assert_eq!(heal.applied_value(), 10.0);
        assert_eq!(value(&stats, "health"), 200.0);

        heal.remove(&stats, true);
        assert_eq!(value(&stats, "health"), 190.0);
    }

    #[test]
    fn test_apply_only_once() {
        let stats = stats();
        let mut modifier = Modifier::flat("health", 5.0).once();

        assert!(modifier.can_apply());
        assert!(modifier.apply(&stats));
        assert!(!modifier.can_apply());
        assert!(!modifier.apply(&stats));
        assert_eq!(value(&stats, "health"), 105.0);
    }

    #[test]
    fn test_repeated_apply_accumulates() {
        let stats = stats();
        let mut regen = Modifier::value("health", 5.0);

        regen.apply(&stats);
        regen.apply(&stats);
        regen.apply(&stats);
        assert_eq!(regen.applications(), 3);
        assert_eq!(regen.applied_value(), 15.0);

        // Partial removal reverses one application.
        regen.remove(&stats, false);
        assert_eq!(regen.applications(), 2);
        assert_eq!(value(&stats, "health"), 110.0);

        regen.remove(&stats, true);
        assert_eq!(value(&stats, "health"), 100.0);
        assert!(!regen.is_applied());
    }

    #[test]
    fn test_missing_target_is_noop() {
        let stats = stats();
        let mut modifier = Modifier::flat("mana", 5.0);
        assert!(!modifier.apply(&stats));
        assert!(!modifier.is_applied());
        assert!(!modifier.remove(&stats, true));
    }

    #[test]
    fn test_live_stat_composite() {
        let stats = stats();
        let mut bonus = Modifier::from_stat("health", ModifierKind::Flat, "strength", StatReading::Value, 2.0);

        bonus.apply(&stats);
        assert_eq!(value(&stats, "health"), 120.0);

        stats.get_stat("strength").unwrap().add_flat(5.0);
        assert_eq!(value(&stats, "health"), 130.0);
        assert_eq!(bonus.applied_value(), 30.0);

        bonus.remove(&stats, true);
        assert_eq!(value(&stats, "health"), 100.0);
        assert_eq!(stats.get_stat("strength").unwrap().listener_count(), 0);
    }

    #[test]
    fn test_snapshot_composite_freezes() {
        let stats = stats();
        let mut bonus =
            Modifier::from_stat("health", ModifierKind::Flat, "strength", StatReading::Value, 2.0).snapshotted();

        bonus.apply(&stats);
        assert_eq!(value(&stats, "health"), 120.0);
        assert!(bonus.is_composite());
        assert_eq!(bonus.magnitude(), 2.0);
        assert_eq!(bonus.frozen_reading(), Some(10.0));

        stats.get_stat("strength").unwrap().add_flat(5.0);
        assert_eq!(value(&stats, "health"), 120.0);
        assert_eq!(stats.get_stat("strength").unwrap().listener_count(), 0);
    }

    #[test]
    fn test_snapshot_composite_keeps_slot() {
        let stats = stats();
        let mut bonus =
            Modifier::from_stat("health", ModifierKind::Flat, "strength", StatReading::Value, 1.0).snapshotted();
        let fresh = bonus.clone();

        bonus.apply(&stats);
        assert!(bonus.same_slot(&fresh));
        assert_eq!(fresh.frozen_reading(), None);

        // The coefficient still merges against the frozen reading.
        stats.get_stat("strength").unwrap().add_flat(10.0);
        bonus.set_magnitude(&stats, 3.0);
        assert_eq!(value(&stats, "health"), 130.0);

        bonus.remove(&stats, true);
        assert_eq!(value(&stats, "health"), 100.0);
    }

    #[test]
    fn test_formula_composite_live() {
        let stats = stats();
        let mut bonus = Modifier::from_formula("health", ModifierKind::Flat, "strength * 2 + agility");

        bonus.apply(&stats);
        assert_eq!(value(&stats, "health"), 124.0);

        stats.get_stat("agility").unwrap().add_flat(6.0);
        assert_eq!(value(&stats, "health"), 130.0);

        stats.get_stat("strength").unwrap().set_base_value(20.0);
        assert_eq!(value(&stats, "health"), 150.0);

        bonus.remove(&stats, true);
        assert_eq!(value(&stats, "health"), 100.0);
    }

    #[test]
    fn test_self_referencing_composite_is_stable() {
        let stats = stats();
        // Adds 10% of its own max as flat; writing max would retrigger itself.
        let mut modifier = Modifier::from_formula("health", ModifierKind::MaxFlat, "health.max * 0.1");

        modifier.apply(&stats);
        assert_eq!(stats.get_stat("health").unwrap().get_max(), 220.0);

        modifier.remove(&stats, true);
        assert_eq!(stats.get_stat("health").unwrap().get_max(), 200.0);
    }

    #[test]
    fn test_malformed_formula_is_permanently_invalid() {
        let stats = stats();
        let mut modifier = Modifier::from_formula("health", ModifierKind::Flat, "strength *");

        assert!(!modifier.is_valid());
        assert!(!modifier.can_apply());
        assert!(!modifier.apply(&stats));
        assert_eq!(value(&stats, "health"), 100.0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let stats = stats();
        let strength = stats.get_stat("strength").unwrap();
        {
            let mut bonus = Modifier::from_stat("health", ModifierKind::Flat, "strength", StatReading::Value, 1.0);
            bonus.apply(&stats);
            assert_eq!(strength.listener_count(), 1);
        }
        assert_eq!(strength.listener_count(), 0);
    }

    #[test]
    fn test_clone_is_unapplied() {
        let stats = stats();
        let mut modifier = Modifier::flat("health", 5.0);
        modifier.apply(&stats);

        let copy = modifier.clone();
        assert!(!copy.is_applied());
        assert!(copy.same_slot(&modifier));
        assert_eq!(copy.magnitude(), 5.0);
    }

    #[test]
    fn test_set_magnitude_restates() {
        let stats = stats();
        let mut modifier = Modifier::flat("health", 5.0);
        modifier.apply(&stats);

        modifier.set_magnitude(&stats, 12.0);
        assert_eq!(value(&stats, "health"), 112.0);
        assert_eq!(modifier.applied_value(), 12.0);

        modifier.remove(&stats, true);
        assert_eq!(value(&stats, "health"), 100.0);
    }

    #[test]
    fn test_serde_definition_only() {
        let stats = stats();
        let mut modifier = Modifier::from_formula("health", ModifierKind::Percent, "agility * 5").once();
        modifier.apply(&stats);

        let json = serde_json::to_string(&modifier).unwrap();
        let restored: Modifier = serde_json::from_str(&json).unwrap();

        assert!(!restored.is_applied());
        assert!(restored.same_slot(&modifier));
        assert!(restored.apply_only_once());
        assert!(restored.is_valid());
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(serde_json::to_string(&ModifierKind::MaxPercent).unwrap(), "\"MAX_PERCENT\"");
        assert_eq!(serde_json::to_string(&ModifierKind::Flat).unwrap(), "\"FLAT\"");
    }
}
