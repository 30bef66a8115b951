//! Flat, serializable manager snapshots.
//!
//! Layout:
//!
//! ```json
//! {
//!   "active_modifiers": [{ "key": "haste", "type_tag": "TimedModifierSet", "data": {} }],
//!   "modules": [{ "type_tag": "ResistanceModule", "data": {} }]
//! }
//! ```
//!
//! Every `type_tag` resolves to a constructor through a [`TypeRegistry`]
//! populated at startup. `modules` is absent when module state was not
//! captured.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::BuffError;
use crate::hooks::{CategoryModule, HookModule, ResistanceModule, StatusEffectTracker};
use crate::modifiers::{Buff, ModifierSet, TimedModifierSet};

/// One serialized buff instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Registry name.
    pub key: String,
    /// Constructor tag.
    pub type_tag: String,
    /// The buff's own payload.
    pub data: serde_json::Value,
}

/// One serialized hook module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Constructor tag.
    pub type_tag: String,
    /// The module's own payload.
    pub data: serde_json::Value,
}

/// Serializable manager state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Registered instances, by name, in registration order per name.
    #[serde(default)]
    pub active_modifiers: Vec<SnapshotEntry>,
    /// Module chain, in order. `None` when not captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<ModuleEntry>>,
}

impl Snapshot {
    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, BuffError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self, BuffError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builds a buff from its snapshot payload.
pub type BuffFactory = fn(serde_json::Value) -> Result<Buff, BuffError>;

/// Builds a hook module from its snapshot payload.
pub type ModuleFactory = fn(serde_json::Value) -> Result<Box<dyn HookModule>, BuffError>;

/// Tag → constructor maps used when restoring snapshots.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    buffs: FxHashMap<String, BuffFactory>,
    modules: FxHashMap<String, ModuleFactory>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in buff and module types.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut types = Self::new();
        types.register_buff(Buff::SET_TAG, build_set);
        types.register_buff(Buff::TIMED_TAG, build_timed);
        types.register_module(ResistanceModule::TYPE_TAG, build_resistance);
        types.register_module(CategoryModule::TYPE_TAG, build_category);
        types.register_module(StatusEffectTracker::TYPE_TAG, build_status);
        types
    }

    /// Register a buff constructor, replacing any previous one for the tag.
    pub fn register_buff(&mut self, type_tag: impl Into<String>, factory: BuffFactory) {
        self.buffs.insert(type_tag.into(), factory);
    }

    /// Register a module constructor, replacing any previous one for the tag.
    pub fn register_module(&mut self, type_tag: impl Into<String>, factory: ModuleFactory) {
        self.modules.insert(type_tag.into(), factory);
    }

    /// Build a buff from a tagged payload.
    pub fn build_buff(&self, type_tag: &str, data: serde_json::Value) -> Result<Buff, BuffError> {
        let factory = self
            .buffs
            .get(type_tag)
            .ok_or_else(|| BuffError::UnknownTypeTag(type_tag.to_string()))?;
        factory(data)
    }

    /// Build a module from a tagged payload.
    pub fn build_module(&self, type_tag: &str, data: serde_json::Value) -> Result<Box<dyn HookModule>, BuffError> {
        let factory = self
            .modules
            .get(type_tag)
            .ok_or_else(|| BuffError::UnknownTypeTag(type_tag.to_string()))?;
        factory(data)
    }
}

fn build_set(data: serde_json::Value) -> Result<Buff, BuffError> {
    Ok(Buff::Set(serde_json::from_value::<ModifierSet>(data)?))
}

fn build_timed(data: serde_json::Value) -> Result<Buff, BuffError> {
    Ok(Buff::Timed(serde_json::from_value::<TimedModifierSet>(data)?))
}

fn build_resistance(data: serde_json::Value) -> Result<Box<dyn HookModule>, BuffError> {
    Ok(Box::new(ResistanceModule::from_data(data)?))
}

fn build_category(data: serde_json::Value) -> Result<Box<dyn HookModule>, BuffError> {
    Ok(Box::new(CategoryModule::from_data(data)?))
}

fn build_status(data: serde_json::Value) -> Result<Box<dyn HookModule>, BuffError> {
    Ok(Box::new(StatusEffectTracker::from_data(data)?))
}
