//! The buff manager: registry, hook chain and per-tick orchestration.

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::core::EngineConfig;
use crate::hooks::{Command, HookContext, HookModule};
use crate::modifiers::Buff;
use crate::stats::StatOwner;

use super::events::{BuffEvent, RemovalReason};
use super::registry::{ActiveBuff, InstanceId, Registry, RegistryEntry};
use super::snapshot::{ModuleEntry, Snapshot, SnapshotEntry, TypeRegistry};

/// Owns the active buffs of one stat owner.
///
/// ```
/// use std::rc::Rc;
/// use buff_engine::manager::BuffManager;
/// use buff_engine::modifiers::{Modifier, ModifierSet};
/// use buff_engine::stats::{Stat, StatBlock, StatOwner};
///
/// let stats = Rc::new(StatBlock::new().with_stat("speed", Stat::new(10.0, 0.0, 50.0)));
/// let mut manager = BuffManager::new(stats.clone());
///
/// let haste = ModifierSet::new("haste")
///     .with_modifier(Modifier::percent("speed", 50.0))
///     .timed(2.0);
/// assert!(manager.apply_modifier(haste));
/// assert_eq!(stats.get_stat("speed").unwrap().get_value(), 15.0);
///
/// manager.process(2.0);
/// assert!(!manager.has_modifier("haste"));
/// assert_eq!(stats.get_stat("speed").unwrap().get_value(), 10.0);
/// ```
pub struct BuffManager {
    owner: Rc<dyn StatOwner>,
    registry: Registry,
    modules: Vec<Box<dyn HookModule>>,
    events: Vec<BuffEvent>,
    deferred: Vec<Command>,
    config: EngineConfig,
}

impl BuffManager {
    /// Create a manager for a stat owner.
    pub fn new(owner: Rc<dyn StatOwner>) -> Self {
        Self::with_config(owner, EngineConfig::default())
    }

    /// Create a manager with explicit configuration.
    pub fn with_config(owner: Rc<dyn StatOwner>, config: EngineConfig) -> Self {
        Self {
            owner,
            registry: Registry::new(),
            modules: Vec::new(),
            events: Vec::new(),
            deferred: Vec::new(),
            config,
        }
    }

    // === Accessors ===

    /// The stat owner.
    #[must_use]
    pub fn owner(&self) -> &Rc<dyn StatOwner> {
        &self.owner
    }

    /// Read-only registry view.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a name is active.
    #[must_use]
    pub fn has_modifier(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// First active instance under a name.
    #[must_use]
    pub fn get_modifier(&self, name: &str) -> Option<&Buff> {
        self.instances(name).first().map(ActiveBuff::buff)
    }

    /// All active instances under a name.
    #[must_use]
    pub fn instances(&self, name: &str) -> &[ActiveBuff] {
        self.registry.get(name).map_or(&[][..], RegistryEntry::instances)
    }

    /// Stack count under a name (0 when inactive).
    #[must_use]
    pub fn stack_count(&self, name: &str) -> u32 {
        self.registry.stack_count(name)
    }

    /// Active names, sorted.
    #[must_use]
    pub fn active_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Number of active names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether nothing is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Events queued since the last drain.
    #[must_use]
    pub fn events(&self) -> &[BuffEvent] {
        &self.events
    }

    /// Take the queued events.
    pub fn drain_events(&mut self) -> Vec<BuffEvent> {
        std::mem::take(&mut self.events)
    }

    // === Modules ===

    /// Append a module to the hook chain and initialise it.
    pub fn add_module<M: HookModule>(&mut self, module: M) {
        self.push_module(Box::new(module));
    }

    fn push_module(&mut self, mut module: Box<dyn HookModule>) {
        {
            let mut ctx = HookContext::new(&*self.owner, &self.registry, &mut self.deferred);
            module.init(&mut ctx);
        }
        debug!(module = module.type_tag(), "module added");
        self.modules.push(module);
        self.flush_deferred();
    }

    /// Remove the first module of a type, calling its `uninit`.
    pub fn remove_module<M: HookModule>(&mut self) -> bool {
        let Some(index) = self.modules.iter().position(|m| m.as_any().is::<M>()) else {
            return false;
        };
        let mut module = self.modules.remove(index);
        module.uninit();
        true
    }

    /// The first module of a type.
    #[must_use]
    pub fn module<M: HookModule>(&self) -> Option<&M> {
        self.modules.iter().find_map(|m| m.as_any().downcast_ref::<M>())
    }

    /// The first module of a type, mutably.
    pub fn module_mut<M: HookModule>(&mut self) -> Option<&mut M> {
        self.modules.iter_mut().find_map(|m| m.as_any_mut().downcast_mut::<M>())
    }

    /// Number of modules in the chain.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn clear_modules(&mut self) {
        for mut module in self.modules.drain(..) {
            module.uninit();
        }
    }

    // === Application ===

    /// Apply a buff, taking ownership.
    ///
    /// Returns false when a stacking cap or a hook refused it; nothing
    /// changes in that case.
    pub fn apply_modifier(&mut self, buff: impl Into<Buff>) -> bool {
        let applied = self.apply_inner(buff.into(), true);
        self.flush_deferred();
        applied
    }

    /// Apply a copy of a buff, leaving the original untouched.
    pub fn apply_modifier_copy(&mut self, buff: &Buff) -> bool {
        self.apply_modifier(buff.clone())
    }

    fn apply_inner(&mut self, buff: Buff, consult_hooks: bool) -> bool {
        if let Err(rejection) = self.registry.admits(&buff) {
            debug!(name = %buff.name(), %rejection, "application rejected");
            return false;
        }

        let owner = Rc::clone(&self.owner);
        if consult_hooks {
            let queued = self.deferred.len();
            let mut vetoed_by = None;
            let mut ctx = HookContext::new(&*owner, &self.registry, &mut self.deferred);
            for module in &mut self.modules {
                if !module.before_apply(&buff, &mut ctx) {
                    vetoed_by = Some(module.type_tag());
                    break;
                }
            }
            if let Some(module) = vetoed_by {
                debug!(name = %buff.name(), module, "application vetoed");
                self.deferred.truncate(queued);
                return false;
            }
        }

        let name = buff.name().to_string();
        let registration = self.registry.register(buff, &*owner);

        if let Some(active) = self.registry.instance(&name, registration.id) {
            let mut ctx = HookContext::new(&*owner, &self.registry, &mut self.deferred);
            for module in &mut self.modules {
                module.after_apply(active.buff(), &mut ctx);
            }
        }

        debug!(
            name = %name,
            instance = %registration.id,
            stacks = registration.stacks,
            merged = registration.merged,
            "buff applied"
        );
        self.events.push(BuffEvent::Applied {
            name,
            instance: registration.id,
            stacks: registration.stacks,
            merged: registration.merged,
        });
        true
    }

    // === Removal ===

    /// Remove a name. Independent instances are filtered by source when one
    /// is given. Returns the number of instances removed.
    pub fn remove_modifier(&mut self, name: &str, source_id: Option<&str>) -> usize {
        let removed = self.remove_inner(name, source_id, RemovalReason::Explicit);
        self.flush_deferred();
        removed
    }

    /// Remove every instance matching a predicate.
    pub fn remove_where(&mut self, predicate: impl Fn(&Buff) -> bool) -> usize {
        let mut targets = Vec::new();
        for (name, entry) in self.registry.iter() {
            for active in entry.instances() {
                if predicate(active.buff()) {
                    targets.push((name.to_string(), active.id()));
                }
            }
        }

        let mut removed = 0;
        for (name, id) in targets {
            if self.remove_instance(&name, id, RemovalReason::Explicit) {
                removed += 1;
            }
        }
        self.flush_deferred();
        removed
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.clear_with(RemovalReason::Cleared);
        self.flush_deferred();
    }

    fn clear_with(&mut self, reason: RemovalReason) {
        let names: Vec<String> = self.registry.names().into_iter().map(str::to_owned).collect();
        for name in names {
            for id in self.registry.instance_ids(&name, None) {
                self.remove_instance(&name, id, reason);
            }
        }
    }

    fn remove_inner(&mut self, name: &str, source_id: Option<&str>, reason: RemovalReason) -> usize {
        let mut removed = 0;
        for id in self.registry.instance_ids(name, source_id) {
            if self.remove_instance(name, id, reason) {
                removed += 1;
            }
        }
        removed
    }

    /// Remove one instance through the hook chain. False if it is already
    /// gone, so every instance is removed exactly once.
    fn remove_instance(&mut self, name: &str, id: InstanceId, reason: RemovalReason) -> bool {
        let owner = Rc::clone(&self.owner);

        let Some(active) = self.registry.instance(name, id) else {
            return false;
        };
        {
            let mut ctx = HookContext::new(&*owner, &self.registry, &mut self.deferred);
            for module in &mut self.modules {
                module.before_remove(active.buff(), &mut ctx);
            }
        }

        let Some(mut active) = self.registry.take(name, id) else {
            return false;
        };
        if active.buff().reverts_on_removal() {
            active.buff_mut().remove_effects(&*owner);
        }

        {
            let mut ctx = HookContext::new(&*owner, &self.registry, &mut self.deferred);
            for module in &mut self.modules {
                module.after_remove(active.buff(), &mut ctx);
            }
        }

        debug!(name = %name, instance = %id, ?reason, "buff removed");
        self.events.push(BuffEvent::Removed {
            name: name.to_string(),
            instance: id,
            reason,
        });
        true
    }

    // === Ticking ===

    /// Advance every active buff by `delta` seconds, run every module's
    /// `process` once, then remove what expired.
    pub fn process(&mut self, delta: f64) {
        let owner = Rc::clone(&self.owner);
        let names: Vec<String> = self.registry.names().into_iter().map(str::to_owned).collect();

        let mut expired = Vec::new();
        for name in names {
            let Some(entry) = self.registry.get_mut(&name) else {
                continue;
            };
            for active in entry.instances_mut() {
                active.buff_mut().process(delta, &*owner);
                if active.buff().is_marked_for_deletion() {
                    expired.push((name.clone(), active.id()));
                }
            }
        }

        {
            let mut ctx = HookContext::new(&*owner, &self.registry, &mut self.deferred);
            for module in &mut self.modules {
                module.process(delta, &mut ctx);
            }
        }

        for (name, id) in expired {
            trace!(name = %name, instance = %id, "buff expired");
            self.remove_instance(&name, id, RemovalReason::Expired);
        }
        self.flush_deferred();
    }

    /// Run queued hook commands until none are left, for at most
    /// `max_deferred_passes` passes.
    fn flush_deferred(&mut self) {
        let mut passes = 0;
        while !self.deferred.is_empty() {
            if passes >= self.config.max_deferred_passes {
                warn!(
                    dropped = self.deferred.len(),
                    passes, "hook commands still cascading, dropping the rest"
                );
                self.deferred.clear();
                return;
            }
            passes += 1;

            for command in std::mem::take(&mut self.deferred) {
                match command {
                    Command::Apply(buff) => {
                        self.apply_inner(buff, true);
                    }
                    Command::Remove { name, source_id } => {
                        self.remove_inner(&name, source_id.as_deref(), RemovalReason::Explicit);
                    }
                }
            }
        }
    }

    // === Snapshots ===

    /// Snapshot the registry, including module state when the configuration
    /// says so.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_with(self.config.snapshot_modules)
    }

    /// Snapshot the registry, optionally with module state.
    ///
    /// Buffs that fail to serialize are skipped with a warning.
    #[must_use]
    pub fn snapshot_with(&self, include_modules: bool) -> Snapshot {
        let mut active_modifiers = Vec::new();
        for name in self.registry.names() {
            for active in self.instances(name) {
                match active.buff().to_data() {
                    Ok(data) => active_modifiers.push(SnapshotEntry {
                        key: name.to_string(),
                        type_tag: active.buff().type_tag().to_string(),
                        data,
                    }),
                    Err(err) => warn!(name = %name, %err, "skipping buff that failed to serialize"),
                }
            }
        }

        let modules = include_modules.then(|| {
            self.modules
                .iter()
                .map(|module| ModuleEntry {
                    type_tag: module.type_tag().to_string(),
                    data: module.to_data(),
                })
                .collect()
        });

        Snapshot {
            active_modifiers,
            modules,
        }
    }

    /// Replace the manager's state with a snapshot.
    ///
    /// Clears the registry, rebuilds the module chain when the snapshot has
    /// one, then re-runs the application path for every entry with
    /// ownership transfer. Vetoes are skipped, `after_apply` hooks run.
    /// Entries with unknown tags or bad payloads are skipped with a warning.
    /// Returns the number of entries restored.
    pub fn restore(&mut self, snapshot: &Snapshot, types: &TypeRegistry) -> usize {
        self.clear_with(RemovalReason::Cleared);

        if let Some(modules) = &snapshot.modules {
            self.clear_modules();
            for entry in modules {
                match types.build_module(&entry.type_tag, entry.data.clone()) {
                    Ok(module) => self.push_module(module),
                    Err(err) => warn!(type_tag = %entry.type_tag, %err, "skipping module"),
                }
            }
        }

        let mut restored = 0;
        for entry in &snapshot.active_modifiers {
            let buff = match types.build_buff(&entry.type_tag, entry.data.clone()) {
                Ok(buff) => buff,
                Err(err) => {
                    warn!(key = %entry.key, type_tag = %entry.type_tag, %err, "skipping buff");
                    continue;
                }
            };
            if buff.name() != entry.key {
                warn!(key = %entry.key, name = %buff.name(), "snapshot key differs from buff name");
            }
            if self.apply_inner(buff, false) {
                restored += 1;
            }
        }
        self.flush_deferred();
        restored
    }
}

impl Drop for BuffManager {
    fn drop(&mut self) {
        self.clear_modules();
    }
}

impl std::fmt::Debug for BuffManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let modules: Vec<&str> = self.modules.iter().map(|m| m.type_tag()).collect();
        f.debug_struct("BuffManager")
            .field("registry", &self.registry)
            .field("modules", &modules)
            .field("events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{Modifier, ModifierSet, StackingMode};
    use crate::stats::{Stat, StatBlock};

    fn setup() -> (Rc<StatBlock>, BuffManager) {
        let stats = Rc::new(StatBlock::new().with_stat("armor", Stat::new(10.0, 0.0, 100.0)));
        let manager = BuffManager::new(stats.clone());
        (stats, manager)
    }

    fn armor(stats: &StatBlock) -> f64 {
        stats.get_stat("armor").unwrap().get_value()
    }

    fn plating(amount: f64) -> ModifierSet {
        ModifierSet::new("plating").with_modifier(Modifier::flat("armor", amount))
    }

    #[test]
    fn test_apply_and_remove() {
        let (stats, mut manager) = setup();

        assert!(manager.apply_modifier(plating(5.0)));
        assert!(manager.has_modifier("plating"));
        assert_eq!(armor(&stats), 15.0);

        assert_eq!(manager.remove_modifier("plating", None), 1);
        assert!(!manager.has_modifier("plating"));
        assert_eq!(armor(&stats), 10.0);
        assert_eq!(manager.remove_modifier("plating", None), 0);
    }

    #[test]
    fn test_apply_copy_leaves_original() {
        let (stats, mut manager) = setup();
        let buff: Buff = plating(5.0).into();

        assert!(manager.apply_modifier_copy(&buff));
        assert!(manager.apply_modifier_copy(&buff));
        assert!(!buff.set().is_applied());
        assert_eq!(armor(&stats), 20.0);
    }

    #[test]
    fn test_events() {
        let (_stats, mut manager) = setup();
        manager.apply_modifier(plating(5.0));
        manager.apply_modifier(plating(5.0));
        manager.remove_modifier("plating", None);

        let events = manager.drain_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], BuffEvent::Applied { merged: false, .. }));
        assert!(matches!(events[1], BuffEvent::Applied { merged: true, .. }));
        assert!(matches!(
            events[2],
            BuffEvent::Removed {
                reason: RemovalReason::Explicit,
                ..
            }
        ));
        assert!(manager.events().is_empty());
    }

    #[test]
    fn test_clear() {
        let (stats, mut manager) = setup();
        manager.apply_modifier(plating(5.0));
        manager.apply_modifier(
            ModifierSet::new("shards")
                .with_modifier(Modifier::flat("armor", 1.0))
                .with_stacking(StackingMode::Independent),
        );
        manager.apply_modifier(
            ModifierSet::new("shards")
                .with_modifier(Modifier::flat("armor", 1.0))
                .with_stacking(StackingMode::Independent),
        );
        assert_eq!(armor(&stats), 17.0);
        manager.drain_events();

        manager.clear();
        assert!(manager.is_empty());
        assert_eq!(armor(&stats), 10.0);
        let removed: Vec<_> = manager
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, BuffEvent::Removed { reason: RemovalReason::Cleared, .. }))
            .collect();
        assert_eq!(removed.len(), 3);
    }

    #[test]
    fn test_remove_where() {
        let (stats, mut manager) = setup();
        manager.apply_modifier(plating(5.0).with_group("metal"));
        manager.apply_modifier(ModifierSet::new("bark").with_modifier(Modifier::flat("armor", 2.0)));

        let removed = manager.remove_where(|buff| buff.set().group.as_deref() == Some("metal"));
        assert_eq!(removed, 1);
        assert_eq!(manager.active_names(), vec!["bark"]);
        assert_eq!(armor(&stats), 12.0);
    }

    #[test]
    fn test_expiry_through_process() {
        let (stats, mut manager) = setup();
        manager.apply_modifier(plating(5.0).timed(1.0));
        manager.process(0.5);
        assert!(manager.has_modifier("plating"));
        manager.process(0.5);
        assert!(!manager.has_modifier("plating"));
        assert_eq!(armor(&stats), 10.0);
    }

    #[test]
    fn test_lingering_effect_stays_on_expiry() {
        let (stats, mut manager) = setup();
        manager.apply_modifier(plating(5.0).timed(1.0).with_remove_effect_on_finish(false));
        manager.process(1.0);
        assert!(!manager.has_modifier("plating"));
        assert_eq!(armor(&stats), 15.0);
    }

    #[test]
    fn test_get_modifier_and_instances() {
        let (_stats, mut manager) = setup();
        assert!(manager.get_modifier("plating").is_none());
        assert!(manager.instances("plating").is_empty());

        manager.apply_modifier(plating(5.0));
        assert_eq!(manager.get_modifier("plating").unwrap().name(), "plating");
        assert_eq!(manager.instances("plating").len(), 1);
        assert_eq!(manager.stack_count("plating"), 1);
        assert_eq!(manager.len(), 1);
    }
}
