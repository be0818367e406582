//! Physical effects triggered by event firings, as a closed tagged variant
//! dispatched by the culture's executor.

use crate::condition::ConditionId;
use crate::event::StateId;
use serde::{Deserialize, Serialize};

/// Per-event physical effect applied to the fired cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Action {
    /// Do nothing (events whose whole effect is the state transition).
    None,
    /// Set the cell's state to a fixed target and refresh its mask row.
    SwitchState { target: StateId },
    /// Sprout a new segment from the cell's tip.
    Grow(GrowAction),
    /// Increment the cell's tracked polarity quantity by a fixed amount.
    AddPolarity { amount: f64 },
    /// Accumulate crowding between the cell and its colony neighbors, then
    /// refresh the given static condition's factor column for touched cells.
    Crowding { condition: ConditionId },
    /// Detach the cell's subtree into a new colony.
    Fragment,
}

/// Effect applied between a donor and a recipient cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PairAction {
    /// Move `ratio × donor.polarity` from donor to recipient.
    Transfer { ratio: f64 },
}

/// Growth parameters and the sub-actions run after the new cell exists.
///
/// The new direction is
/// `parent.direction ± bend + tropism_bend + angular noise`; the bend sign
/// is a fair coin, noise and tropism tuning come from the culture config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowAction {
    /// Segment length projected from the parent's tip.
    pub length: f64,
    /// Deterministic bend magnitude in radians (e.g. π/2 for a lateral
    /// branch, π for the second germ tube).
    pub bend: f64,
    /// Run on the parent after growth.
    pub parent_actions: Vec<Action>,
    /// Run on the new cell after growth.
    pub child_actions: Vec<Action>,
    /// Run between (parent, new cell) after growth.
    pub pair_actions: Vec<PairAction>,
}

impl GrowAction {
    /// Straight growth with no sub-actions.
    #[must_use]
    pub fn straight(length: f64) -> Self {
        Self {
            length,
            bend: 0.0,
            parent_actions: Vec::new(),
            child_actions: Vec::new(),
            pair_actions: Vec::new(),
        }
    }
}

/// Crowding kernel: the scalar influence a neighbor at `distance` exerts.
/// Equals `spacing` at distance zero and decays exponentially with the
/// configured steepness.
#[must_use]
pub fn crowding_kernel(distance: f64, steepness: f64, spacing: f64) -> f64 {
    (-distance / steepness).exp() * spacing
}

/// Cutoff distance beyond which the kernel contributes less than
/// `error_tolerance`; the spatial partition size is set to this so the 3×3
/// query covers every meaningful neighbor.
#[must_use]
pub fn crowding_cutoff(error_tolerance: f64, steepness: f64, spacing: f64) -> f64 {
    -(error_tolerance / spacing).ln() * steepness
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_spacing_at_zero_distance() {
        assert!((crowding_kernel(0.0, 10.0, 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kernel_decreases_monotonically_towards_zero() {
        let mut previous = crowding_kernel(0.0, 10.0, 1.0);
        for step in 1..200 {
            let value = crowding_kernel(f64::from(step) * 2.0, 10.0, 1.0);
            assert!(value < previous);
            previous = value;
        }
        assert!(crowding_kernel(1e4, 10.0, 1.0) < 1e-12);
    }

    #[test]
    fn cutoff_bounds_the_kernel_by_the_tolerance() {
        let (steepness, spacing, tolerance) = (10.0, 1.0, 1e-3);
        let cutoff = crowding_cutoff(tolerance, steepness, spacing);
        assert!(cutoff > 0.0);
        let at_cutoff = crowding_kernel(cutoff, steepness, spacing);
        assert!((at_cutoff - tolerance).abs() < 1e-12);
        assert!(crowding_kernel(cutoff + 1.0, steepness, spacing) < tolerance);
    }
}
