//! Per-cell multiplicative propensity modifiers.
//!
//! Each condition owns one column of the culture's cell×condition factor
//! matrix. Non-static conditions are recomputed from a source parameter
//! column every driver tick; static ones (the crowding factor) are written
//! by actions and left untouched by the refresh pass.

use serde::{Deserialize, Serialize};

/// Stable index of a [`Condition`] in the culture's condition table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConditionId(pub usize);

/// How a condition maps its source parameter to a factor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResponseKind {
    /// Factor is written externally (e.g., by the crowding action); the
    /// per-tick refresh pass skips it.
    Static,
    /// Factor is `alpha` for every cell, ignoring the source parameter.
    Constant,
    /// `max(parameter - threshold, 0) * alpha`.
    Linear,
    /// `max(parameter - threshold, 0) ^ alpha`.
    PowerLaw,
    /// `exp(max(parameter - threshold, 0) * alpha)`.
    Exponential,
}

/// Which per-cell column feeds the response function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceColumn {
    Polarity,
    Age,
    Crowding,
}

/// A named per-cell scalar modifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub name: String,
    pub kind: ResponseKind,
    pub source: SourceColumn,
    pub threshold: f64,
    pub alpha: f64,
}

impl Condition {
    /// Construct a condition; `threshold` and `alpha` are ignored by kinds
    /// that do not use them.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: ResponseKind,
        source: SourceColumn,
        threshold: f64,
        alpha: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            source,
            threshold,
            alpha,
        }
    }

    /// A static condition fed by the crowding column.
    #[must_use]
    pub fn crowding(name: impl Into<String>) -> Self {
        Self::new(name, ResponseKind::Static, SourceColumn::Crowding, 0.0, 1.0)
    }

    /// Evaluate the response for one cell's parameter value.
    ///
    /// Static conditions have no response function; callers skip them.
    #[must_use]
    pub fn response(&self, parameter: f64) -> f64 {
        let value = (parameter - self.threshold).max(0.0);
        match self.kind {
            ResponseKind::Static => 1.0,
            ResponseKind::Constant => self.alpha,
            ResponseKind::Linear => value * self.alpha,
            ResponseKind::PowerLaw => value.powf(self.alpha),
            ResponseKind::Exponential => (value * self.alpha).exp(),
        }
    }
}

/// The clipped transform applied to accumulated crowding when a crowding
/// action refreshes its condition column: always in `(0, 1]` for
/// non-negative crowding.
#[must_use]
pub fn crowding_factor(crowding: f64, alpha: f64) -> f64 {
    1.0 / (1.0 + crowding * alpha)
}
