//! Modifiers and the sets that bundle them.
//!
//! - [`Modifier`]: atomic, reversible change to one stat, constant or
//!   composite (derived from other stats or a [`Formula`])
//! - [`ModifierSet`]: named bundle with a [`StackingMode`]
//! - [`TimedModifierSet`]: set with duration, periodic ticks and a
//!   [`MergePolicy`]
//! - [`Buff`]: either of the two, as stored by the manager

mod buff;
mod formula;
mod modifier;
mod set;
mod timed;

pub use buff::Buff;
pub use formula::{BinaryOp, Expression, Formula, Function, MAX_DEPTH, MAX_TOKENS};
pub use modifier::{MagnitudeSource, Modifier, ModifierKind, StatReading};
pub use set::{ModifierSet, StackingMode, ValueMerge};
pub use timed::{DurationMerge, MergeFlags, MergePolicy, TimedModifierSet, MAX_CATCH_UP_TICKS, MIN_INTERVAL};

