//! Queryable counts of active status effects.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::BuffError;
use crate::modifiers::Buff;

use super::{HookContext, HookModule};

/// Keeps an externally queryable view of active effects.
///
/// Filters match a buff's name or group. Exclusions win over inclusions;
/// an empty include list tracks everything not excluded. Counts mirror the
/// registry's instance counts, so they stay correct under every stacking
/// mode.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusEffectTracker {
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(skip)]
    counts: FxHashMap<String, usize>,
    #[serde(skip)]
    groups: FxHashMap<String, String>,
}

impl StatusEffectTracker {
    /// Snapshot type tag.
    pub const TYPE_TAG: &'static str = "StatusEffectTracker";

    /// Track everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only track this name or group, plus other includes (builder pattern).
    #[must_use]
    pub fn with_include(mut self, key: impl Into<String>) -> Self {
        self.include.push(key.into());
        self
    }

    /// Never track this name or group (builder pattern).
    #[must_use]
    pub fn with_exclude(mut self, key: impl Into<String>) -> Self {
        self.exclude.push(key.into());
        self
    }

    /// Whether a buff passes the filters.
    #[must_use]
    pub fn tracks(&self, buff: &Buff) -> bool {
        let name = buff.name();
        let group = buff.set().group.as_deref();
        let matches = |key: &String| key == name || Some(key.as_str()) == group;

        if self.exclude.iter().any(matches) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(matches)
    }

    /// Active instances under a name (0 when untracked).
    #[must_use]
    pub fn get_effect_count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Tracked active names, sorted.
    #[must_use]
    pub fn get_active_effects(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.counts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Active instances across a group.
    #[must_use]
    pub fn get_group_count(&self, group: &str) -> usize {
        self.groups
            .iter()
            .filter(|(_, g)| g.as_str() == group)
            .map(|(name, _)| self.get_effect_count(name))
            .sum()
    }

    /// Whether any tracked effect of a group is active.
    #[must_use]
    pub fn has_group_modifiers(&self, group: &str) -> bool {
        self.groups.values().any(|g| g == group)
    }

    /// Rebuild from snapshot data. Counts are rebuilt as buffs are restored.
    pub fn from_data(data: serde_json::Value) -> Result<Self, BuffError> {
        Ok(serde_json::from_value(data)?)
    }

    fn recount(&mut self, buff: &Buff, ctx: &HookContext<'_>) {
        let name = buff.name();
        let count = ctx.instance_count(name);
        if count == 0 {
            self.counts.remove(name);
            self.groups.remove(name);
            return;
        }
        self.counts.insert(name.to_string(), count);
        if let Some(group) = &buff.set().group {
            self.groups.insert(name.to_string(), group.clone());
        }
    }
}

impl HookModule for StatusEffectTracker {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn init(&mut self, ctx: &mut HookContext<'_>) {
        self.counts.clear();
        self.groups.clear();
        let registry = ctx.registry();
        for (_, entry) in registry.iter() {
            if let Some(active) = entry.instances().first() {
                if self.tracks(active.buff()) {
                    self.recount(active.buff(), ctx);
                }
            }
        }
    }

    fn after_apply(&mut self, buff: &Buff, ctx: &mut HookContext<'_>) {
        if self.tracks(buff) {
            self.recount(buff, ctx);
        }
    }

    fn after_remove(&mut self, buff: &Buff, ctx: &mut HookContext<'_>) {
        if self.tracks(buff) {
            self.recount(buff, ctx);
        }
    }

    fn to_data(&self) -> serde_json::Value {
        serde_json::json!({
            "include": self.include,
            "exclude": self.exclude,
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
