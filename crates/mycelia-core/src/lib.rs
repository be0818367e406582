//! Stochastic simulation engine for branching cellular colonies.
//!
//! A [`Culture`] owns the definition tables (elements, reactions, states,
//! conditions, events), the columnar cell arena, and one spatially hashed
//! [`Colony`] per founder cell. The Gillespie driver repeatedly refreshes
//! the cell×event propensity matrix, samples an exponential waiting time,
//! and fires one weighted (cell, event) pair until the end time is reached
//! or no propensity remains.

pub mod action;
pub mod cell;
pub mod chemistry;
pub mod colony;
pub mod condition;
pub mod config;
pub mod culture;
pub mod event;
pub mod snapshot;
pub mod store;

pub use action::{Action, GrowAction, PairAction, crowding_cutoff, crowding_kernel};
pub use cell::{CellId, CellStore, ColonyId};
pub use chemistry::{Element, ElementId, Reaction, ReactionId};
pub use colony::Colony;
pub use condition::{Condition, ConditionId, ResponseKind, SourceColumn, crowding_factor};
pub use config::{CrowdingConfig, CultureConfig, CultureError, TropismConfig};
pub use culture::{
    Culture, HaltReason, NullObserver, StepOutcome, TickObserver, TickReport,
};
pub use event::{Event, EventId, State, StateId};
pub use snapshot::{CellManifest, ColonyManifest, CultureSnapshot};
pub use store::{GrowMatrix, GrowVec};
