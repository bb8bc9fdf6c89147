//! Output contracts from the core engine.
//!
//! Outputs carry the property values written during this update and a
//! separate list of lifecycle events. Hosts that bind through [`ValueIo`]
//! already have the values applied; the record is for adapters that ship
//! them elsewhere.
//!
//! [`ValueIo`]: crate::binding::ValueIo

use serde::{Deserialize, Serialize};

use crate::ids::{TargetId, TickableId};
use crate::value::Value;

/// One property write. `tickable` is `None` for additive-pass sums.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub tickable: Option<TickableId>,
    pub target: TargetId,
    pub property: String,
    pub value: Value,
}

/// Discrete lifecycle signals emitted during stepping and control calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CoreEvent {
    Began { tickable: TickableId },
    Looped { tickable: TickableId, iteration: u64 },
    Paused { tickable: TickableId },
    Completed { tickable: TickableId },
    Cancelled { tickable: TickableId },
    Reverted { tickable: TickableId },
    Warning { message: String },
}

/// Outputs returned by `Engine::update()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub events: Vec<CoreEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    #[inline]
    pub fn push_event(&mut self, event: CoreEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }

    /// Latest value written to `property` on `target`, if any.
    pub fn last_value(&self, target: TargetId, property: &str) -> Option<&Value> {
        self.changes
            .iter()
            .rev()
            .find(|c| c.target == target && c.property == property)
            .map(|c| &c.value)
    }
}
