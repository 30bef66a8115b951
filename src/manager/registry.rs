//! The buff registry: one slot per modifier name.
//!
//! A slot holds either a single instance (merge and count stacking) or an
//! ordered list of independent instances. The shape of an existing slot
//! decides how a re-application is handled.

use std::fmt;
use std::slice;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::modifiers::{Buff, StackingMode};
use crate::stats::StatOwner;

/// Unique id of one registered buff instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Create an instance id from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered buff and its id.
#[derive(Debug)]
pub struct ActiveBuff {
    id: InstanceId,
    buff: Buff,
}

impl ActiveBuff {
    /// Instance id.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The registered buff.
    #[must_use]
    pub fn buff(&self) -> &Buff {
        &self.buff
    }

    pub(crate) fn buff_mut(&mut self) -> &mut Buff {
        &mut self.buff
    }
}

/// One registry slot.
#[derive(Debug)]
pub enum RegistryEntry {
    /// Merge or count stacking: one instance.
    Single(ActiveBuff),
    /// Independent stacking: separate instances in application order.
    Stacked(Vec<ActiveBuff>),
}

impl RegistryEntry {
    /// Instances in the slot.
    #[must_use]
    pub fn instances(&self) -> &[ActiveBuff] {
        match self {
            Self::Single(active) => slice::from_ref(active),
            Self::Stacked(list) => list,
        }
    }

    /// Instances in the slot, mutably.
    pub fn instances_mut(&mut self) -> &mut [ActiveBuff] {
        match self {
            Self::Single(active) => slice::from_mut(active),
            Self::Stacked(list) => list,
        }
    }

    /// Whether this is the independent list form.
    #[must_use]
    pub fn is_stacked(&self) -> bool {
        matches!(self, Self::Stacked(_))
    }

    /// Stack count: the count of a single instance, or the list length.
    #[must_use]
    pub fn stack_count(&self) -> u32 {
        self.instances().iter().map(|active| active.buff.stack_count()).sum()
    }
}

/// Why an application was refused before any hook ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// `max_stacks` reached.
    StackLimit {
        /// Current stacks.
        stacks: u32,
        /// The cap.
        max: u32,
    },
    /// The source reached its per-source cap.
    SourceLimit {
        /// The source.
        source: String,
        /// The cap.
        cap: u32,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackLimit { stacks, max } => write!(f, "stack limit reached ({stacks}/{max})"),
            Self::SourceLimit { source, cap } => write!(f, "source '{source}' reached its cap of {cap}"),
        }
    }
}

/// Outcome of a registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Registration {
    pub id: InstanceId,
    pub merged: bool,
    pub stacks: u32,
}

/// Name-keyed store of active buffs.
#[derive(Debug, Default)]
pub struct Registry {
    entries: FxHashMap<String, RegistryEntry>,
    next_id: u64,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(name)
    }

    /// Whether a name is active.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of instances under a name.
    #[must_use]
    pub fn instance_count(&self, name: &str) -> usize {
        self.entries.get(name).map_or(0, |entry| entry.instances().len())
    }

    /// Stack count under a name (0 when inactive).
    #[must_use]
    pub fn stack_count(&self, name: &str) -> u32 {
        self.entries.get(name).map_or(0, RegistryEntry::stack_count)
    }

    /// Active names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of active names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All slots, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Look up one instance.
    #[must_use]
    pub fn instance(&self, name: &str, id: InstanceId) -> Option<&ActiveBuff> {
        self.entries.get(name)?.instances().iter().find(|active| active.id == id)
    }

    /// Ids under a name. Independent slots filter by source when one is
    /// given; a single instance always matches.
    #[must_use]
    pub fn instance_ids(&self, name: &str, source_id: Option<&str>) -> Vec<InstanceId> {
        match self.entries.get(name) {
            None => Vec::new(),
            Some(RegistryEntry::Single(active)) => vec![active.id],
            Some(RegistryEntry::Stacked(list)) => list
                .iter()
                .filter(|active| source_id.map_or(true, |source| active.buff.set().source_id.as_deref() == Some(source)))
                .map(|active| active.id)
                .collect(),
        }
    }

    /// Check the stacking caps for an incoming buff.
    ///
    /// The caps come from the incoming set; the slot shape, when present,
    /// decides which cap applies.
    pub fn admits(&self, buff: &Buff) -> Result<(), Rejection> {
        let set = buff.set();
        let entry = self.entries.get(&set.name);

        let mode = match entry {
            Some(RegistryEntry::Stacked(_)) => StackingMode::Independent,
            Some(RegistryEntry::Single(active)) => active.buff.stacking(),
            None => set.stacking,
        };

        match mode {
            StackingMode::MergeValues => Ok(()),
            StackingMode::CountStacks => {
                let stacks = entry.map_or(0, RegistryEntry::stack_count);
                match set.max_stacks {
                    Some(max) if stacks >= max => Err(Rejection::StackLimit { stacks, max }),
                    _ => Ok(()),
                }
            }
            StackingMode::Independent => {
                let instances = entry.map_or(&[][..], RegistryEntry::instances);
                let stacks = u32::try_from(instances.len()).unwrap_or(u32::MAX);
                if let Some(max) = set.max_stacks {
                    if stacks >= max {
                        return Err(Rejection::StackLimit { stacks, max });
                    }
                }
                if let (Some(source), Some(cap)) = (&set.source_id, set.source_cap) {
                    let from_source = instances
                        .iter()
                        .filter(|active| active.buff.set().source_id.as_ref() == Some(source))
                        .count();
                    if from_source >= cap as usize {
                        return Err(Rejection::SourceLimit {
                            source: source.clone(),
                            cap,
                        });
                    }
                }
                Ok(())
            }
        }
    }

    /// Register an admitted buff: merge into a single instance, push onto an
    /// independent list, or create the slot.
    pub(crate) fn register(&mut self, mut buff: Buff, owner: &dyn StatOwner) -> Registration {
        match self.entries.get_mut(buff.name()) {
            Some(RegistryEntry::Single(active)) => {
                if buff.stacking() != active.buff.stacking() {
                    warn!(
                        name = %buff.name(),
                        existing = ?active.buff.stacking(),
                        incoming = ?buff.stacking(),
                        "stacking mode differs from the active instance, using the active one"
                    );
                }
                active.buff.merge(&buff, owner);
                if active.buff.stacking() == StackingMode::CountStacks {
                    active.buff.set_mut().add_stack();
                }
                Registration {
                    id: active.id,
                    merged: true,
                    stacks: active.buff.stack_count(),
                }
            }
            Some(RegistryEntry::Stacked(list)) => {
                if buff.stacking() != StackingMode::Independent {
                    warn!(
                        name = %buff.name(),
                        incoming = ?buff.stacking(),
                        "stacking mode differs from the active instances, stacking independently"
                    );
                }
                let id = InstanceId::new(self.next_id);
                self.next_id += 1;
                buff.init(owner);
                list.push(ActiveBuff { id, buff });
                Registration {
                    id,
                    merged: false,
                    stacks: u32::try_from(list.len()).unwrap_or(u32::MAX),
                }
            }
            None => {
                let id = InstanceId::new(self.next_id);
                self.next_id += 1;
                buff.init(owner);
                let stacks = buff.stack_count();
                let name = buff.name().to_string();
                let active = ActiveBuff { id, buff };
                let entry = if active.buff.stacking() == StackingMode::Independent {
                    RegistryEntry::Stacked(vec![active])
                } else {
                    RegistryEntry::Single(active)
                };
                self.entries.insert(name, entry);
                Registration {
                    id,
                    merged: false,
                    stacks,
                }
            }
        }
    }

    /// Take one instance out, deleting the slot once empty.
    pub(crate) fn take(&mut self, name: &str, id: InstanceId) -> Option<ActiveBuff> {
        match self.entries.get_mut(name)? {
            RegistryEntry::Single(active) => {
                if active.id != id {
                    return None;
                }
                match self.entries.remove(name) {
                    Some(RegistryEntry::Single(active)) => Some(active),
                    _ => None,
                }
            }
            RegistryEntry::Stacked(list) => {
                let index = list.iter().position(|active| active.id == id)?;
                let active = list.remove(index);
                if list.is_empty() {
                    self.entries.remove(name);
                }
                Some(active)
            }
        }
    }
}
