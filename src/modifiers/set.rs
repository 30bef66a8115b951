//! Named, stackable bundles of modifiers.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::stats::StatOwner;

use super::modifier::Modifier;
use super::timed::TimedModifierSet;

/// How re-applying a same-named set behaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackingMode {
    /// Merge into the one active instance.
    #[default]
    MergeValues,
    /// One instance carrying a stack count, capped by `max_stacks`.
    CountStacks,
    /// Fully separate instances, optionally capped per source.
    Independent,
}

/// How magnitudes combine on merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueMerge {
    /// Sum existing and incoming magnitudes.
    Add,
    /// Replace with the incoming magnitudes.
    #[default]
    Refresh,
}

/// A named bundle of modifiers with a stacking policy.
///
/// ```
/// use buff_engine::modifiers::{Modifier, ModifierSet, StackingMode};
///
/// let rage = ModifierSet::new("rage")
///     .with_modifier(Modifier::percent("attack", 25.0))
///     .with_modifier(Modifier::flat("armor", -5.0))
///     .with_stacking(StackingMode::CountStacks)
///     .with_max_stacks(3);
///
/// assert_eq!(rage.modifiers().len(), 2);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModifierSet {
    /// Registry key.
    pub name: String,
    modifiers: SmallVec<[Modifier; 4]>,
    /// Stacking policy.
    #[serde(default)]
    pub stacking: StackingMode,
    /// Stack or instance cap; `None` is unlimited.
    #[serde(default)]
    pub max_stacks: Option<u32>,
    /// Who applied this set.
    #[serde(default)]
    pub source_id: Option<String>,
    /// Instances one source may contribute under independent stacking.
    #[serde(default)]
    pub source_cap: Option<u32>,
    /// Group tag for category and tracking modules.
    #[serde(default)]
    pub group: Option<String>,
    /// Re-apply repeatable modifiers on every manager tick.
    #[serde(default)]
    pub process_every_tick: bool,
    #[serde(default)]
    stack_count: u32,
    #[serde(skip)]
    marked_for_deletion: bool,
}

impl ModifierSet {
    /// Create an empty set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: SmallVec::new(),
            stacking: StackingMode::default(),
            max_stacks: None,
            source_id: None,
            source_cap: None,
            group: None,
            process_every_tick: false,
            stack_count: 0,
            marked_for_deletion: false,
        }
    }

    /// Add a modifier (builder pattern).
    #[must_use]
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Set the stacking mode (builder pattern).
    #[must_use]
    pub fn with_stacking(mut self, stacking: StackingMode) -> Self {
        self.stacking = stacking;
        self
    }

    /// Cap stacks or instances (builder pattern).
    #[must_use]
    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = Some(max_stacks);
        self
    }

    /// Tag the applying source (builder pattern).
    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Cap instances per source (builder pattern).
    #[must_use]
    pub fn with_source_cap(mut self, cap: u32) -> Self {
        self.source_cap = Some(cap);
        self
    }

    /// Set the group tag (builder pattern).
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Re-apply on every manager tick (builder pattern).
    #[must_use]
    pub fn with_process_every_tick(mut self, enabled: bool) -> Self {
        self.process_every_tick = enabled;
        self
    }

    /// Wrap into a timed set lasting `duration` seconds (≤ 0 is unlimited).
    #[must_use]
    pub fn timed(self, duration: f64) -> TimedModifierSet {
        TimedModifierSet::new(self, duration)
    }

    /// The modifiers, in application order.
    #[must_use]
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// Stacks merged into this instance; 0 before registration.
    #[must_use]
    pub fn stack_count(&self) -> u32 {
        self.stack_count
    }

    /// Whether any modifier currently contributes.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.modifiers.iter().any(Modifier::is_applied)
    }

    /// Whether the set is due for removal.
    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    pub(crate) fn mark_for_deletion(&mut self) {
        self.marked_for_deletion = true;
    }

    pub(crate) fn add_stack(&mut self) {
        self.stack_count += 1;
    }

    /// Prepare a freshly registered instance, applying its modifiers if asked.
    pub fn init(&mut self, owner: &dyn StatOwner, apply: bool) {
        if apply {
            self.apply_all(owner);
        }
        self.stack_count = self.stack_count.max(1);
    }

    /// Apply every modifier that can apply. Returns how many did.
    pub fn apply_all(&mut self, owner: &dyn StatOwner) -> usize {
        let mut applied = 0;
        for modifier in &mut self.modifiers {
            if modifier.can_apply() && modifier.apply(owner) {
                applied += 1;
            }
        }
        applied
    }

    /// Periodic re-application: applies every modifier not marked
    /// `apply_only_once`. Returns how many applied.
    pub fn tick(&mut self, owner: &dyn StatOwner) -> usize {
        let mut applied = 0;
        for modifier in &mut self.modifiers {
            if !modifier.apply_only_once() && modifier.apply(owner) {
                applied += 1;
            }
        }
        applied
    }

    /// Combine a same-named incoming set into this one.
    ///
    /// Matching modifiers (same stat, kind, source) keep their application
    /// and get the merged magnitude. Unmatched incoming modifiers are
    /// appended, and applied if this instance is active.
    pub fn merge(&mut self, other: &ModifierSet, owner: &dyn StatOwner, rule: ValueMerge) {
        let active = self.is_applied();
        for incoming in &other.modifiers {
            match self.modifiers.iter_mut().find(|m| m.same_slot(incoming)) {
                Some(existing) => {
                    let magnitude = match rule {
                        ValueMerge::Add => existing.magnitude() + incoming.magnitude(),
                        ValueMerge::Refresh => incoming.magnitude(),
                    };
                    existing.set_magnitude(owner, magnitude);
                }
                None => {
                    let mut modifier = incoming.clone();
                    if active {
                        modifier.apply(owner);
                    }
                    self.modifiers.push(modifier);
                }
            }
        }
        debug!(name = %self.name, ?rule, "merged modifier set");
    }

    /// Fully reverse every applied modifier. Returns how many were removed.
    pub fn remove_effects(&mut self, owner: &dyn StatOwner) -> usize {
        let mut removed = 0;
        for modifier in &mut self.modifiers {
            if modifier.remove(owner, true) {
                removed += 1;
            }
        }
        removed
    }

    /// Per-tick update for a plain set.
    pub fn process(&mut self, _delta: f64, owner: &dyn StatOwner) {
        if self.process_every_tick {
            self.tick(owner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Stat, StatBlock};

    fn stats() -> StatBlock {
        StatBlock::new()
            .with_stat("attack", Stat::new(100.0, 0.0, 1000.0))
            .with_stat("armor", Stat::new(20.0, 0.0, 100.0))
    }

    fn value(stats: &StatBlock, name: &str) -> f64 {
        stats.get_stat(name).unwrap().get_value()
    }

    fn rage() -> ModifierSet {
        ModifierSet::new("rage")
            .with_modifier(Modifier::percent("attack", 20.0))
            .with_modifier(Modifier::flat("armor", -5.0))
    }

    #[test]
    fn test_init_applies() {
        let stats = stats();
        let mut set = rage();
        assert_eq!(set.stack_count(), 0);

        set.init(&stats, true);
        assert_eq!(set.stack_count(), 1);
        assert!(set.is_applied());
        assert_eq!(value(&stats, "attack"), 120.0);
        assert_eq!(value(&stats, "armor"), 15.0);
    }

    #[test]
    fn test_init_without_apply() {
        let stats = stats();
        let mut set = rage();
        set.init(&stats, false);
        assert_eq!(set.stack_count(), 1);
        assert!(!set.is_applied());
        assert_eq!(value(&stats, "attack"), 100.0);
    }

    #[test]
    fn test_merge_add() {
        let stats = stats();
        let mut set = rage();
        set.init(&stats, true);

        set.merge(&rage(), &stats, ValueMerge::Add);
        assert_eq!(set.modifiers().len(), 2);
        assert_eq!(value(&stats, "attack"), 140.0);
        assert_eq!(value(&stats, "armor"), 10.0);

        set.remove_effects(&stats);
        assert_eq!(value(&stats, "attack"), 100.0);
        assert_eq!(value(&stats, "armor"), 20.0);
    }

    #[test]
    fn test_merge_refresh() {
        let stats = stats();
        let mut set = rage();
        set.init(&stats, true);

        let weaker = ModifierSet::new("rage").with_modifier(Modifier::percent("attack", 5.0));
        set.merge(&weaker, &stats, ValueMerge::Refresh);

        assert_eq!(value(&stats, "attack"), 105.0);
        // Unmatched existing modifiers stay as they were.
        assert_eq!(value(&stats, "armor"), 15.0);
    }

    #[test]
    fn test_merge_appends_unmatched() {
        let stats = stats();
        let mut set = rage();
        set.init(&stats, true);

        let extra = ModifierSet::new("rage").with_modifier(Modifier::max_value("armor", 50.0));
        set.merge(&extra, &stats, ValueMerge::Add);

        assert_eq!(set.modifiers().len(), 3);
        assert_eq!(stats.get_stat("armor").unwrap().get_max(), 150.0);
    }

    #[test]
    fn test_tick_skips_once_modifiers() {
        let stats = stats();
        let mut set = ModifierSet::new("regen")
            .with_modifier(Modifier::value("armor", 1.0))
            .with_modifier(Modifier::flat("attack", 10.0).once());
        set.init(&stats, true);

        assert_eq!(set.tick(&stats), 1);
        assert_eq!(set.tick(&stats), 1);
        assert_eq!(value(&stats, "armor"), 23.0);
        assert_eq!(value(&stats, "attack"), 110.0);
    }

    #[test]
    fn test_process_every_tick() {
        let stats = stats();
        let mut set = ModifierSet::new("aura")
            .with_modifier(Modifier::value("armor", 2.0))
            .with_process_every_tick(true);
        set.init(&stats, true);

        set.process(0.5, &stats);
        set.process(0.5, &stats);
        assert_eq!(value(&stats, "armor"), 26.0);

        let mut idle = ModifierSet::new("idle").with_modifier(Modifier::value("attack", 2.0));
        idle.init(&stats, true);
        idle.process(0.5, &stats);
        assert_eq!(value(&stats, "attack"), 102.0);
    }

    #[test]
    fn test_serde_keeps_definition() {
        let stats = stats();
        let mut set = rage()
            .with_stacking(StackingMode::Independent)
            .with_source("boss")
            .with_source_cap(2)
            .with_group("debuff");
        set.init(&stats, true);
        set.mark_for_deletion();

        let json = serde_json::to_string(&set).unwrap();
        let restored: ModifierSet = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.name, "rage");
        assert_eq!(restored.stacking, StackingMode::Independent);
        assert_eq!(restored.source_id.as_deref(), Some("boss"));
        assert_eq!(restored.source_cap, Some(2));
        assert_eq!(restored.group.as_deref(), Some("debuff"));
        assert_eq!(restored.stack_count(), 1);
        assert!(!restored.is_applied());
        assert!(!restored.is_marked_for_deletion());
    }

    #[test]
    fn test_minimal_json() {
        let json = r#"{"name": "haste", "modifiers": [{"stat_name": "speed", "kind": "PERCENT", "magnitude": 30.0}]}"#;
        let set: ModifierSet = serde_json::from_str(json).unwrap();

        assert_eq!(set.stacking, StackingMode::MergeValues);
        assert_eq!(set.modifiers().len(), 1);
        assert_eq!(set.modifiers()[0].magnitude(), 30.0);
        assert!(set.max_stacks.is_none());
    }
}
