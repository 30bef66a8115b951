//! Context handed to hook modules.

use crate::manager::Registry;
use crate::modifiers::Buff;
use crate::stats::{StatHandle, StatOwner};

/// A registry mutation requested by a hook, run after the current
/// manager operation completes.
#[derive(Clone, Debug)]
pub enum Command {
    /// Apply a buff (ownership transfer).
    Apply(Buff),
    /// Remove a name, optionally filtered by source.
    Remove {
        name: String,
        source_id: Option<String>,
    },
}

/// What a hook sees while the manager is mid-operation.
///
/// The registry is read-only here. Mutations go through
/// [`apply_modifier`](Self::apply_modifier) and
/// [`remove_modifier`](Self::remove_modifier), which queue commands the
/// manager drains once the current operation is done.
pub struct HookContext<'a> {
    owner: &'a dyn StatOwner,
    registry: &'a Registry,
    commands: &'a mut Vec<Command>,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(owner: &'a dyn StatOwner, registry: &'a Registry, commands: &'a mut Vec<Command>) -> Self {
        Self {
            owner,
            registry,
            commands,
        }
    }

    /// The stat owner.
    #[must_use]
    pub fn owner(&self) -> &dyn StatOwner {
        self.owner
    }

    /// Look up a stat on the owner.
    #[must_use]
    pub fn get_stat(&self, name: &str) -> Option<StatHandle> {
        self.owner.get_stat(name)
    }

    /// Read-only view of the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Whether a name is active.
    #[must_use]
    pub fn has_modifier(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Number of instances under a name.
    #[must_use]
    pub fn instance_count(&self, name: &str) -> usize {
        self.registry.instance_count(name)
    }

    /// Active names, sorted.
    #[must_use]
    pub fn active_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Queue an application.
    pub fn apply_modifier(&mut self, buff: impl Into<Buff>) {
        self.commands.push(Command::Apply(buff.into()));
    }

    /// Queue a removal.
    pub fn remove_modifier(&mut self, name: impl Into<String>, source_id: Option<&str>) {
        self.commands.push(Command::Remove {
            name: name.into(),
            source_id: source_id.map(str::to_owned),
        });
    }

    /// Commands queued so far.
    #[must_use]
    pub fn pending(&self) -> &[Command] {
        self.commands
    }
}
