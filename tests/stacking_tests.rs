//! Stacking integration tests.
//!
//! These tests verify the three stacking modes end to end through the
//! manager: value merging, counted stacks with a cap, and independent
//! instances with per-source caps.

use std::rc::Rc;

use buff_engine::manager::{BuffEvent, BuffManager};
use buff_engine::modifiers::{Modifier, ModifierKind, ModifierSet, StackingMode, StatReading};
use buff_engine::stats::{Stat, StatBlock, StatOwner};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (Rc<StatBlock>, BuffManager) {
    init_tracing();
    let stats = Rc::new(
        StatBlock::new()
            .with_stat("attack", Stat::new(100.0, 0.0, 1000.0))
            .with_stat("armor", Stat::new(20.0, 0.0, 100.0)),
    );
    let manager = BuffManager::new(stats.clone());
    (stats, manager)
}

fn value(stats: &StatBlock, name: &str) -> f64 {
    stats.get_stat(name).unwrap().get_value()
}

// =============================================================================
// MergeValues
// =============================================================================

/// Two same-named sets merge into one instance; one removal undoes both.
#[test]
fn test_merge_values_single_removal() {
    let (stats, mut manager) = setup();

    let a = ModifierSet::new("might").with_modifier(Modifier::flat("attack", 10.0));
    let b = ModifierSet::new("might").with_modifier(Modifier::flat("attack", 15.0));
    assert!(manager.apply_modifier(a));
    assert!(manager.apply_modifier(b));

    assert_eq!(manager.instances("might").len(), 1);
    assert_eq!(value(&stats, "attack"), 125.0);
    let magnitude = manager.get_modifier("might").unwrap().set().modifiers()[0].magnitude();
    assert_eq!(magnitude, 25.0);

    assert_eq!(manager.remove_modifier("might", None), 1);
    assert_eq!(value(&stats, "attack"), 100.0);
}

/// Unmatched modifiers from the incoming set are appended and applied.
#[test]
fn test_merge_appends_new_modifiers() {
    let (stats, mut manager) = setup();

    manager.apply_modifier(ModifierSet::new("might").with_modifier(Modifier::flat("attack", 10.0)));
    manager.apply_modifier(ModifierSet::new("might").with_modifier(Modifier::flat("armor", 5.0)));

    let set = manager.get_modifier("might").unwrap().set();
    assert_eq!(set.modifiers().len(), 2);
    assert_eq!(value(&stats, "attack"), 110.0);
    assert_eq!(value(&stats, "armor"), 25.0);

    manager.remove_modifier("might", None);
    assert_eq!(value(&stats, "attack"), 100.0);
    assert_eq!(value(&stats, "armor"), 20.0);
}

/// A snapshotted composite refreshes in place instead of piling up copies.
#[test]
fn test_merge_snapshotted_composite_refreshes() {
    let (stats, mut manager) = setup();
    let aura = || {
        ModifierSet::new("aura")
            .with_modifier(
                Modifier::from_stat("attack", ModifierKind::Flat, "armor", StatReading::Value, 1.0).snapshotted(),
            )
            .timed(10.0)
    };

    for _ in 0..5 {
        assert!(manager.apply_modifier(aura()));
    }
    assert_eq!(manager.instances("aura").len(), 1);
    assert_eq!(manager.get_modifier("aura").unwrap().set().modifiers().len(), 1);
    assert_eq!(value(&stats, "attack"), 120.0);

    manager.remove_modifier("aura", None);
    assert_eq!(value(&stats, "attack"), 100.0);
}

/// Added coefficients scale the reading frozen at first application.
#[test]
fn test_merge_snapshotted_composite_adds() {
    let (stats, mut manager) = setup();
    let ward = || {
        ModifierSet::new("ward").with_modifier(
            Modifier::from_stat("attack", ModifierKind::Flat, "armor", StatReading::Value, 1.0).snapshotted(),
        )
    };

    manager.apply_modifier(ward());
    stats.get_stat("armor").unwrap().add_flat(30.0);
    manager.apply_modifier(ward());

    let modifier = &manager.get_modifier("ward").unwrap().set().modifiers()[0];
    assert_eq!(modifier.magnitude(), 2.0);
    assert_eq!(modifier.frozen_reading(), Some(20.0));
    assert_eq!(value(&stats, "attack"), 140.0);
}

// =============================================================================
// CountStacks
// =============================================================================

fn fury() -> ModifierSet {
    ModifierSet::new("fury")
        .with_modifier(Modifier::flat("attack", 5.0))
        .with_stacking(StackingMode::CountStacks)
        .with_max_stacks(3)
}

/// The (max + 1)-th application is refused and changes nothing.
#[test]
fn test_count_stacks_cap() {
    let (stats, mut manager) = setup();

    for expected in 1..=3 {
        assert!(manager.apply_modifier(fury()));
        assert_eq!(manager.stack_count("fury"), expected);
    }
    assert_eq!(value(&stats, "attack"), 115.0);
    let events = manager.drain_events().len();
    assert_eq!(events, 3);

    assert!(!manager.apply_modifier(fury()));
    assert_eq!(manager.stack_count("fury"), 3);
    assert_eq!(value(&stats, "attack"), 115.0);
    assert!(manager.events().is_empty());

    assert_eq!(manager.remove_modifier("fury", None), 1);
    assert_eq!(value(&stats, "attack"), 100.0);
    assert_eq!(manager.stack_count("fury"), 0);
}

/// Stack counts are reported on the application events.
#[test]
fn test_count_stacks_events() {
    let (_stats, mut manager) = setup();
    manager.apply_modifier(fury());
    manager.apply_modifier(fury());

    let stacks: Vec<u32> = manager
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            BuffEvent::Applied { stacks, .. } => Some(stacks),
            BuffEvent::Removed { .. } => None,
        })
        .collect();
    assert_eq!(stacks, vec![1, 2]);
}

// =============================================================================
// Independent
// =============================================================================

fn bleed(source: &str) -> ModifierSet {
    ModifierSet::new("bleed")
        .with_modifier(Modifier::flat("armor", -2.0))
        .with_stacking(StackingMode::Independent)
        .with_source(source)
        .with_source_cap(2)
}

/// Each source may hold at most its cap of instances.
#[test]
fn test_independent_source_cap() {
    let (stats, mut manager) = setup();

    assert!(manager.apply_modifier(bleed("wolf")));
    assert!(manager.apply_modifier(bleed("wolf")));
    assert!(!manager.apply_modifier(bleed("wolf")));
    assert!(manager.apply_modifier(bleed("bear")));

    assert_eq!(manager.instances("bleed").len(), 3);
    assert!(manager.registry().get("bleed").unwrap().is_stacked());
    assert_eq!(value(&stats, "armor"), 14.0);
}

/// Removing by source only touches that source's instances.
#[test]
fn test_independent_remove_by_source() {
    let (stats, mut manager) = setup();
    manager.apply_modifier(bleed("wolf"));
    manager.apply_modifier(bleed("wolf"));
    manager.apply_modifier(bleed("bear"));

    assert_eq!(manager.remove_modifier("bleed", Some("wolf")), 2);
    assert_eq!(manager.instances("bleed").len(), 1);
    assert_eq!(value(&stats, "armor"), 18.0);

    assert_eq!(manager.remove_modifier("bleed", Some("wolf")), 0);
    assert_eq!(manager.remove_modifier("bleed", None), 1);
    assert!(!manager.has_modifier("bleed"));
    assert_eq!(value(&stats, "armor"), 20.0);
}

/// An overall stack cap bounds independent instances too.
#[test]
fn test_independent_max_stacks() {
    let (_stats, mut manager) = setup();
    let shard = || {
        ModifierSet::new("shard")
            .with_modifier(Modifier::flat("armor", 1.0))
            .with_stacking(StackingMode::Independent)
            .with_max_stacks(2)
    };

    assert!(manager.apply_modifier(shard()));
    assert!(manager.apply_modifier(shard()));
    assert!(!manager.apply_modifier(shard()));
    assert_eq!(manager.instances("shard").len(), 2);
}

/// Every independent instance gets a distinct id.
#[test]
fn test_independent_instance_ids() {
    let (_stats, mut manager) = setup();
    manager.apply_modifier(bleed("wolf"));
    manager.apply_modifier(bleed("bear"));

    let ids: Vec<_> = manager.instances("bleed").iter().map(|active| active.id()).collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}
