//! Hook modules: pluggable policy consulted around every registry change.
//!
//! Modules are chained on the manager in registration order. Each one sees
//! every buff before and after it is applied or removed, and gets one
//! `process` call per manager tick.
//!
//! # Veto
//!
//! `before_apply` returning false aborts the application. The stacking
//! caps are checked first, the remaining modules are skipped, commands the
//! chain queued during the check are discarded, and no `after_apply` or
//! event follows.
//!
//! # Re-entrancy
//!
//! Hooks never hold the manager. They get a [`HookContext`] with a
//! read-only registry and a command queue; queued applications and removals
//! run once the current manager operation is complete.
//!
//! # Reference modules
//!
//! - [`ResistanceModule`]: immunities and probabilistic resists
//! - [`CategoryModule`]: positive/negative/neutral tagging for bulk removal
//! - [`StatusEffectTracker`]: queryable counts of active effects

mod category;
mod context;
mod resistance;
mod status;

pub use category::{remove_category, Category, CategoryModule};
pub use context::{Command, HookContext};
pub use resistance::ResistanceModule;
pub use status::StatusEffectTracker;

use std::any::Any;

use crate::modifiers::Buff;

/// A policy object registered on a buff manager.
///
/// All hooks default to doing nothing.
pub trait HookModule: Any {
    /// Snapshot type tag.
    fn type_tag(&self) -> &'static str;

    /// Called when the module joins a manager.
    fn init(&mut self, _ctx: &mut HookContext<'_>) {}

    /// Called when the module leaves its manager or the manager is dropped.
    fn uninit(&mut self) {}

    /// Return false to veto the application.
    fn before_apply(&mut self, _buff: &Buff, _ctx: &mut HookContext<'_>) -> bool {
        true
    }

    /// Called after a buff was registered or merged.
    fn after_apply(&mut self, _buff: &Buff, _ctx: &mut HookContext<'_>) {}

    /// Called while the instance is still registered.
    fn before_remove(&mut self, _buff: &Buff, _ctx: &mut HookContext<'_>) {}

    /// Called once the instance left the registry.
    fn after_remove(&mut self, _buff: &Buff, _ctx: &mut HookContext<'_>) {}

    /// Called once per manager tick.
    fn process(&mut self, _delta: f64, _ctx: &mut HookContext<'_>) {}

    /// Serialized state for snapshots.
    fn to_data(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Upcast for downcasting to the concrete module.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete module.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
