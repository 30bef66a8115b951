//! # buff-engine
//!
//! A runtime engine for dynamic numeric attributes ("stats") and the
//! stackable, time-limited modifications applied to them (buffs and
//! debuffs).
//!
//! ## Design Principles
//!
//! 1. **Exact Reversibility**: Every modifier records the delta its stat
//!    actually accepted, so removing it restores the stat exactly, clamping
//!    included.
//!
//! 2. **One Lookup Contract**: Everything resolves stats through
//!    [`StatOwner::get_stat`]. No field probing.
//!
//! 3. **Snapshot-Then-Mutate**: Hooks never mutate the registry while it is
//!    being walked. They queue commands that run after the current operation.
//!
//! ## Architecture
//!
//! - **Stats** are plain values wrapped in shared, observable handles.
//!   Listeners run synchronously after the stat is updated and released.
//!
//! - **Modifiers** change one stat component. Composite modifiers derive
//!   their amount from other stats or a formula and follow them live.
//!
//! - **Sets** bundle modifiers under a name with a stacking mode; timed sets
//!   add duration and periodic ticks.
//!
//! - **The manager** stores sets in a name-keyed registry, runs the hook
//!   chain around every change, and queues lifecycle events.
//!
//! ## Modules
//!
//! - `core`: Configuration, errors, deterministic RNG
//! - `stats`: Stats, handles, owners
//! - `modifiers`: Modifiers, formulas, modifier sets, timed sets
//! - `manager`: Buff manager, registry, events, snapshots
//! - `hooks`: Hook module trait and reference modules

pub mod core;
pub mod hooks;
pub mod manager;
pub mod modifiers;
pub mod stats;

// Re-export commonly used types
pub use crate::core::{BuffError, BuffRng, EngineConfig, RngState};

pub use crate::stats::{Stat, StatBlock, StatChange, StatHandle, StatOwner};

pub use crate::modifiers::{
    Buff, DurationMerge, Formula, MagnitudeSource, MergeFlags, MergePolicy, Modifier, ModifierKind, ModifierSet,
    StackingMode, StatReading, TimedModifierSet, ValueMerge,
};

pub use crate::manager::{
    BuffEvent, BuffManager, InstanceId, RegistryEntry, RemovalReason, Snapshot, TypeRegistry,
};

pub use crate::hooks::{
    remove_category, Category, CategoryModule, HookContext, HookModule, ResistanceModule,
    StatusEffectTracker,
};
