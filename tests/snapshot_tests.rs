//! Snapshot integration tests.
//!
//! These tests verify that a manager's registry and module chain survive a
//! JSON round trip into a fresh manager, and that restore skips what it
//! cannot rebuild.

use std::rc::Rc;

use buff_engine::core::EngineConfig;
use buff_engine::hooks::{Category, CategoryModule, ResistanceModule, StatusEffectTracker};
use buff_engine::manager::{BuffManager, Snapshot, SnapshotEntry, TypeRegistry};
use buff_engine::modifiers::{Modifier, ModifierSet, StackingMode};
use buff_engine::stats::{Stat, StatBlock, StatOwner};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn stats() -> Rc<StatBlock> {
    Rc::new(
        StatBlock::new()
            .with_stat("attack", Stat::new(100.0, 0.0, 1000.0))
            .with_stat("speed", Stat::new(10.0, 0.0, 50.0)),
    )
}

fn value(stats: &StatBlock, name: &str) -> f64 {
    stats.get_stat(name).unwrap().get_value()
}

fn populated() -> (Rc<StatBlock>, BuffManager) {
    init_tracing();
    let stats = stats();
    let mut manager = BuffManager::new(stats.clone());
    manager.add_module(ResistanceModule::new(11).with_immunity("stun", 0.0));
    manager.add_module(CategoryModule::new().with_rule("dot", Category::Negative));
    manager.add_module(StatusEffectTracker::new().with_include("dot"));

    let fury = || {
        ModifierSet::new("fury")
            .with_modifier(Modifier::flat("attack", 5.0))
            .with_stacking(StackingMode::CountStacks)
    };
    manager.apply_modifier(fury());
    manager.apply_modifier(fury());

    let bleed = |source: &str| {
        ModifierSet::new("bleed")
            .with_modifier(Modifier::flat("attack", -1.0))
            .with_group("dot")
            .with_stacking(StackingMode::Independent)
            .with_source(source)
    };
    manager.apply_modifier(bleed("wolf"));
    manager.apply_modifier(bleed("bear"));

    manager.apply_modifier(
        ModifierSet::new("haste")
            .with_modifier(Modifier::flat("speed", 5.0))
            .timed(2.0),
    );
    manager.process(1.0);
    (stats, manager)
}

fn roundtrip(snapshot: &Snapshot) -> Snapshot {
    Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap()
}

/// A fresh manager restored from JSON has the same buffs, stats and modules.
#[test]
fn test_roundtrip_with_modules() {
    let (stats, manager) = populated();
    assert_eq!(value(&stats, "attack"), 108.0);
    assert_eq!(value(&stats, "speed"), 15.0);

    let snapshot = roundtrip(&manager.snapshot());
    assert_eq!(snapshot.active_modifiers.len(), 4);
    assert_eq!(snapshot.modules.as_ref().map(Vec::len), Some(3));

    let fresh = crate::stats();
    let mut restored = BuffManager::new(fresh.clone());
    assert_eq!(restored.restore(&snapshot, &TypeRegistry::with_builtin()), 4);

    assert_eq!(restored.active_names(), vec!["bleed", "fury", "haste"]);
    assert_eq!(restored.stack_count("fury"), 2);
    assert_eq!(restored.instances("bleed").len(), 2);
    assert_eq!(value(&fresh, "attack"), 108.0);
    assert_eq!(value(&fresh, "speed"), 15.0);

    assert_eq!(restored.module_count(), 3);
    assert!(restored.module::<ResistanceModule>().unwrap().is_immune("stun"));
    assert!(!restored.apply_modifier(ModifierSet::new("stun")));
    assert_eq!(restored.module::<StatusEffectTracker>().unwrap().get_effect_count("bleed"), 2);
    assert_eq!(
        restored.module::<CategoryModule>().unwrap().get_category("bleed"),
        Some(Category::Negative)
    );
}

/// Registry shapes come back as they were.
#[test]
fn test_restore_registry_shape() {
    let (_stats, manager) = populated();
    let snapshot = manager.snapshot();

    let mut restored = BuffManager::new(stats());
    restored.restore(&snapshot, &TypeRegistry::with_builtin());

    assert!(restored.registry().get("bleed").unwrap().is_stacked());
    assert!(!restored.registry().get("fury").unwrap().is_stacked());
    assert!(!restored.registry().get("haste").unwrap().is_stacked());
}

/// Timers carry over: the restored timed set expires on schedule.
#[test]
fn test_restored_timer_continues() {
    let (_stats, manager) = populated();
    let snapshot = roundtrip(&manager.snapshot());

    let fresh = stats();
    let mut restored = BuffManager::new(fresh.clone());
    restored.restore(&snapshot, &TypeRegistry::with_builtin());

    restored.process(0.5);
    assert!(restored.has_modifier("haste"));
    restored.process(0.5);
    assert!(!restored.has_modifier("haste"));
    assert_eq!(value(&fresh, "speed"), 10.0);
}

/// Restore replaces whatever the target manager held.
#[test]
fn test_restore_replaces_state() {
    let (_stats, manager) = populated();
    let snapshot = manager.snapshot();

    let fresh = stats();
    let mut restored = BuffManager::new(fresh.clone());
    restored.apply_modifier(ModifierSet::new("stale").with_modifier(Modifier::flat("speed", 20.0)));
    restored.restore(&snapshot, &TypeRegistry::with_builtin());

    assert!(!restored.has_modifier("stale"));
    assert_eq!(value(&fresh, "speed"), 15.0);
}

/// Entries with unknown tags are skipped; the rest restore.
#[test]
fn test_unknown_tag_skipped() {
    let (_stats, manager) = populated();
    let mut snapshot = manager.snapshot();
    snapshot.active_modifiers.push(SnapshotEntry {
        key: "aura".to_string(),
        type_tag: "AuraSet".to_string(),
        data: serde_json::json!({ "name": "aura" }),
    });

    let mut restored = BuffManager::new(stats());
    assert_eq!(restored.restore(&snapshot, &TypeRegistry::with_builtin()), 4);
    assert!(!restored.has_modifier("aura"));
    assert_eq!(restored.len(), 3);
}

/// Without module state, restore keeps the target's own chain.
#[test]
fn test_snapshot_without_modules() {
    let (_stats, manager) = populated();
    let snapshot = manager.snapshot_with(false);
    assert!(snapshot.modules.is_none());
    assert!(!snapshot.to_json().unwrap().contains("modules"));

    let mut restored = BuffManager::new(stats());
    restored.add_module(StatusEffectTracker::new());
    restored.restore(&snapshot, &TypeRegistry::with_builtin());

    assert_eq!(restored.module_count(), 1);
    assert!(restored.module::<ResistanceModule>().is_none());
    let tracker = restored.module::<StatusEffectTracker>().unwrap();
    assert_eq!(tracker.get_effect_count("bleed"), 2);
    assert_eq!(tracker.get_effect_count("fury"), 1);
}

/// The configuration decides whether `snapshot` captures modules.
#[test]
fn test_config_controls_modules() {
    let mut manager = BuffManager::with_config(stats(), EngineConfig::new().with_snapshot_modules(false));
    manager.add_module(StatusEffectTracker::new());
    assert!(manager.snapshot().modules.is_none());
    assert!(manager.snapshot_with(true).modules.is_some());
}

/// A restored resistance module rolls the same outcomes as the original.
#[test]
fn test_resistance_rolls_are_restored() {
    init_tracing();
    let mut original = BuffManager::new(stats());
    original.add_module(ResistanceModule::new(3).with_resist_chance("fear", 0.5));
    original.apply_modifier(ModifierSet::new("fear").with_stacking(StackingMode::Independent));

    let snapshot = original.snapshot();
    let mut restored = BuffManager::new(stats());
    restored.restore(&snapshot, &TypeRegistry::with_builtin());

    let fear = || ModifierSet::new("fear").with_stacking(StackingMode::Independent);
    let rolls_a: Vec<bool> = (0..16).map(|_| original.apply_modifier(fear())).collect();
    let rolls_b: Vec<bool> = (0..16).map(|_| restored.apply_modifier(fear())).collect();
    assert_eq!(rolls_a, rolls_b);
}
