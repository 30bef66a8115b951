//! Buff lifecycle events.

use serde::{Deserialize, Serialize};

use super::registry::InstanceId;

/// How an instance left the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// `remove_modifier`, `remove_where`, or a hook command.
    Explicit,
    /// Duration or tick budget ran out.
    Expired,
    /// Manager-wide clear.
    Cleared,
}

/// Lifecycle event queued by the manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuffEvent {
    /// A buff was registered or merged into an active instance.
    Applied {
        name: String,
        instance: InstanceId,
        /// Stack count of the slot afterwards.
        stacks: u32,
        /// Whether it merged into an existing instance.
        merged: bool,
    },
    /// An instance left the registry.
    Removed {
        name: String,
        instance: InstanceId,
        reason: RemovalReason,
    },
}

impl BuffEvent {
    /// Modifier name the event concerns.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Applied { name, .. } | Self::Removed { name, .. } => name,
        }
    }

    /// Whether this is an `Applied` event.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Whether this is a `Removed` event.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }
}
