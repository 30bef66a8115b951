//! Positive/negative/neutral tagging of active buffs.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::BuffError;
use crate::manager::BuffManager;
use crate::modifiers::Buff;

use super::{HookContext, HookModule};

/// Broad classification of a buff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Beneficial.
    Positive,
    /// Harmful.
    Negative,
    /// Neither.
    Neutral,
}

/// Tags active names by category for queries and bulk removal.
///
/// Rules map a modifier name or a group tag to a category; a name rule wins
/// over a group rule. Untagged buffs are ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CategoryModule {
    #[serde(default)]
    rules: FxHashMap<String, Category>,
    #[serde(default)]
    active: FxHashMap<String, Category>,
}

impl CategoryModule {
    /// Snapshot type tag.
    pub const TYPE_TAG: &'static str = "CategoryModule";

    /// Create a module without rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a name or group to a category (builder pattern).
    #[must_use]
    pub fn with_rule(mut self, key: impl Into<String>, category: Category) -> Self {
        self.set_rule(key, category);
        self
    }

    /// Map a name or group to a category.
    pub fn set_rule(&mut self, key: impl Into<String>, category: Category) {
        self.rules.insert(key.into(), category);
    }

    /// Category a buff falls under, by name first, then group.
    #[must_use]
    pub fn categorize(&self, buff: &Buff) -> Option<Category> {
        self.rules
            .get(buff.name())
            .or_else(|| buff.set().group.as_ref().and_then(|group| self.rules.get(group)))
            .copied()
    }

    /// Category of an active name.
    #[must_use]
    pub fn get_category(&self, name: &str) -> Option<Category> {
        self.active.get(name).copied()
    }

    /// Active names in a category, sorted.
    #[must_use]
    pub fn names_in(&self, category: Category) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .active
            .iter()
            .filter(|(_, tagged)| **tagged == category)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Rebuild from snapshot data.
    pub fn from_data(data: serde_json::Value) -> Result<Self, BuffError> {
        Ok(serde_json::from_value(data)?)
    }
}

impl HookModule for CategoryModule {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn init(&mut self, ctx: &mut HookContext<'_>) {
        for (name, entry) in ctx.registry().iter() {
            let tagged = entry.instances().first().and_then(|active| self.categorize(active.buff()));
            if let Some(category) = tagged {
                self.active.insert(name.to_string(), category);
            }
        }
    }

    fn after_apply(&mut self, buff: &Buff, _ctx: &mut HookContext<'_>) {
        if let Some(category) = self.categorize(buff) {
            self.active.insert(buff.name().to_string(), category);
        }
    }

    fn after_remove(&mut self, buff: &Buff, ctx: &mut HookContext<'_>) {
        if !ctx.has_modifier(buff.name()) {
            self.active.remove(buff.name());
        }
    }

    fn to_data(&self) -> serde_json::Value {
        serde_json::json!({
            "rules": self.rules,
            "active": self.active,
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Remove every active buff in a category. Returns the number of instances
/// removed; 0 when the manager has no [`CategoryModule`].
pub fn remove_category(manager: &mut BuffManager, category: Category) -> usize {
    let names: Vec<String> = manager
        .module::<CategoryModule>()
        .map(|module| module.names_in(category).into_iter().map(str::to_owned).collect())
        .unwrap_or_default();

    names.iter().map(|name| manager.remove_modifier(name, None)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::Registry;
    use crate::modifiers::ModifierSet;

    fn module() -> CategoryModule {
        CategoryModule::new()
            .with_rule("regen", Category::Positive)
            .with_rule("curse", Category::Negative)
            .with_rule("poison", Category::Neutral)
    }

    #[test]
    fn test_categorize_name_before_group() {
        let module = module();
        let named: Buff = ModifierSet::new("poison").with_group("curse").into();
        let grouped: Buff = ModifierSet::new("hex").with_group("curse").into();
        let untagged: Buff = ModifierSet::new("hex").into();

        assert_eq!(module.categorize(&named), Some(Category::Neutral));
        assert_eq!(module.categorize(&grouped), Some(Category::Negative));
        assert_eq!(module.categorize(&untagged), None);
    }

    #[test]
    fn test_tagging_follows_registry() {
        let stats = crate::stats::StatBlock::new();
        let mut registry = Registry::new();
        let mut commands = Vec::new();
        let mut module = module();

        let hex: Buff = ModifierSet::new("hex").with_group("curse").into();
        registry.register(hex.clone(), &stats);
        {
            let mut ctx = HookContext::new(&stats, &registry, &mut commands);
            module.after_apply(&hex, &mut ctx);
        }
        assert_eq!(module.get_category("hex"), Some(Category::Negative));
        assert_eq!(module.names_in(Category::Negative), vec!["hex"]);

        // Still registered: the tag stays.
        {
            let mut ctx = HookContext::new(&stats, &registry, &mut commands);
            module.after_remove(&hex, &mut ctx);
        }
        assert_eq!(module.get_category("hex"), Some(Category::Negative));

        let empty = Registry::new();
        let mut ctx = HookContext::new(&stats, &empty, &mut commands);
        module.after_remove(&hex, &mut ctx);
        assert_eq!(module.get_category("hex"), None);
    }

    #[test]
    fn test_data_roundtrip() {
        let module = module();
        let restored = CategoryModule::from_data(module.to_data()).unwrap();
        let regen: Buff = ModifierSet::new("regen").into();
        assert_eq!(restored.categorize(&regen), Some(Category::Positive));
    }
}
