//! Buff management: the registry of active buffs and its orchestration.
//!
//! ## Key Types
//!
//! - [`BuffManager`]: applies, merges, ticks and removes buffs for one
//!   stat owner, consulting the hook chain around every change
//! - [`Registry`]: one [`RegistryEntry`] per modifier name, either a single
//!   instance or a list of independent ones
//! - [`BuffEvent`]: lifecycle events queued for callers
//! - [`Snapshot`] / [`TypeRegistry`]: flat serialization and tag-based
//!   reconstruction
//!
//! ## Tick Order
//!
//! `process(delta)` snapshots the active names, advances every instance,
//! collects what expired, runs each module's `process` once, and only then
//! removes the expired instances. Hook commands queued along the way run
//! last.

mod buff_manager;
mod events;
mod registry;
mod snapshot;

pub use buff_manager::BuffManager;
pub use events::{BuffEvent, RemovalReason};
pub use registry::{ActiveBuff, InstanceId, Registry, RegistryEntry, Rejection};
pub use snapshot::{BuffFactory, ModuleEntry, ModuleFactory, Snapshot, SnapshotEntry, TypeRegistry};
