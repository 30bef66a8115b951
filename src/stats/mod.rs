//! Stats: bounded numeric attributes with change notification.
//!
//! - [`Stat`]: the value type, with clamping and exact-delta writes
//! - [`StatHandle`]: shared observable wrapper with listeners and bindings
//! - [`StatOwner`]: the named lookup contract every consumer uses
//! - [`StatBlock`]: a ready-made owner

mod handle;
mod owner;
mod stat;

pub use handle::{BindingId, ListenerId, StatHandle, StatListener, WeakStatHandle};
pub use owner::{StatBlock, StatOwner};
pub use stat::{Stat, StatChange, StatUpdate};
