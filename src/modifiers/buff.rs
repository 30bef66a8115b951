//! The unit the buff manager stores: a plain or timed modifier set.

use serde::{Deserialize, Serialize};

use crate::core::BuffError;
use crate::stats::StatOwner;

use super::set::{ModifierSet, StackingMode, ValueMerge};
use super::timed::TimedModifierSet;

/// A plain or timed modifier set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Buff {
    /// Lasts until removed.
    Set(ModifierSet),
    /// Expires on its own.
    Timed(TimedModifierSet),
}

impl Buff {
    /// Snapshot tag of plain sets.
    pub const SET_TAG: &'static str = "ModifierSet";
    /// Snapshot tag of timed sets.
    pub const TIMED_TAG: &'static str = "TimedModifierSet";

    /// Registry key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.set().name
    }

    /// The underlying set.
    #[must_use]
    pub fn set(&self) -> &ModifierSet {
        match self {
            Self::Set(set) => set,
            Self::Timed(timed) => &timed.set,
        }
    }

    /// The underlying set, mutably.
    pub fn set_mut(&mut self) -> &mut ModifierSet {
        match self {
            Self::Set(set) => set,
            Self::Timed(timed) => &mut timed.set,
        }
    }

    /// The timed set, if this is one.
    #[must_use]
    pub fn as_timed(&self) -> Option<&TimedModifierSet> {
        match self {
            Self::Timed(timed) => Some(timed),
            Self::Set(_) => None,
        }
    }

    /// Snapshot type tag.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Set(_) => Self::SET_TAG,
            Self::Timed(_) => Self::TIMED_TAG,
        }
    }

    /// Stacking policy of the underlying set.
    #[must_use]
    pub fn stacking(&self) -> StackingMode {
        self.set().stacking
    }

    /// Stacks merged into this instance.
    #[must_use]
    pub fn stack_count(&self) -> u32 {
        self.set().stack_count()
    }

    /// Whether the buff is due for removal.
    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.set().is_marked_for_deletion()
    }

    /// Whether removal reverses the buff's contribution.
    #[must_use]
    pub fn reverts_on_removal(&self) -> bool {
        match self {
            Self::Set(_) => true,
            Self::Timed(timed) => timed.remove_effect_on_finish,
        }
    }

    /// Prepare a freshly registered instance.
    pub fn init(&mut self, owner: &dyn StatOwner) {
        match self {
            Self::Set(set) => set.init(owner, true),
            Self::Timed(timed) => timed.init(owner),
        }
    }

    /// Merge a same-named incoming buff into this instance.
    ///
    /// Two timed sets merge by the existing set's policy. Any other pairing
    /// merges the underlying sets, adding magnitudes for a plain existing set.
    pub fn merge(&mut self, other: &Buff, owner: &dyn StatOwner) {
        match (self, other) {
            (Self::Timed(existing), Self::Timed(incoming)) => existing.merge(incoming, owner),
            (Self::Timed(existing), incoming) => {
                let rule = existing.merge_policy.value;
                existing.set.merge(incoming.set(), owner, rule);
            }
            (Self::Set(existing), incoming) => existing.merge(incoming.set(), owner, ValueMerge::Add),
        }
    }

    /// Advance timers and periodic effects.
    pub fn process(&mut self, delta: f64, owner: &dyn StatOwner) {
        match self {
            Self::Set(set) => set.process(delta, owner),
            Self::Timed(timed) => timed.process(delta, owner),
        }
    }

    /// Fully reverse every applied modifier.
    pub fn remove_effects(&mut self, owner: &dyn StatOwner) -> usize {
        self.set_mut().remove_effects(owner)
    }

    /// Serialized payload, without the type tag.
    pub fn to_data(&self) -> Result<serde_json::Value, BuffError> {
        let data = match self {
            Self::Set(set) => serde_json::to_value(set)?,
            Self::Timed(timed) => serde_json::to_value(timed)?,
        };
        Ok(data)
    }
}

impl From<ModifierSet> for Buff {
    fn from(set: ModifierSet) -> Self {
        Self::Set(set)
    }
}

impl From<TimedModifierSet> for Buff {
    fn from(timed: TimedModifierSet) -> Self {
        Self::Timed(timed)
    }
}
