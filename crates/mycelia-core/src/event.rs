//! Biological states and the events that couple chemistry, conditions, and
//! actions into the per-cell propensity matrix.

use crate::action::Action;
use crate::chemistry::ReactionId;
use crate::condition::ConditionId;
use serde::{Deserialize, Serialize};

/// Stable index of a [`State`] in the culture's state table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StateId(pub usize);

/// Stable index of an [`Event`] in the culture's event table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub usize);

/// A named biological state. Its event-applicability mask row lives in the
/// culture's state×event mask matrix and grows as events are defined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct State {
    pub name: String,
}

impl State {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One stochastic event channel.
///
/// Its propensity column is assembled every tick as
/// `reaction.propensity × Π condition.factor[cell]`, then masked to zero for
/// cells whose current state is not in the ingoing set. Firing executes the
/// reaction, the action, and switches the fired cell to the outgoing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub ingoing: Vec<StateId>,
    pub outgoing: StateId,
    pub conditions: Vec<ConditionId>,
    pub action: Action,
    pub reaction: ReactionId,
}
