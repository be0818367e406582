//! Static configuration for a culture, validated once at construction and
//! threaded through explicitly rather than looked up from an ambient global.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing culture state.
#[derive(Debug, Error)]
pub enum CultureError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Indicates a snapshot that does not match the bootstrapped definitions.
    #[error("snapshot mismatch: {0}")]
    SnapshotMismatch(&'static str),
}

/// Crowding kernel tuning. The kernel is
/// `exp(-distance / steepness) × spacing`; `alpha` scales accumulated
/// crowding inside the `1 / (1 + crowding × alpha)` factor transform, and
/// `error_tolerance` fixes the cutoff (and spatial partition size) at the
/// distance where the kernel drops below it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CrowdingConfig {
    pub steepness: f64,
    pub spacing: f64,
    pub alpha: f64,
    pub error_tolerance: f64,
}

impl Default for CrowdingConfig {
    fn default() -> Self {
        Self {
            steepness: 10.0,
            spacing: 1.0,
            alpha: 1e-2,
            error_tolerance: 1e-3,
        }
    }
}

/// Tropism tuning: the bend away from the more crowded side is
/// `tanh(Δstimulus × sensitivity) × max_bend`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TropismConfig {
    pub sensitivity: f64,
    /// Maximum bend in radians.
    pub max_bend: f64,
}

impl Default for TropismConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.0,
            max_bend: 20.0_f64.to_radians(),
        }
    }
}

/// Static configuration for a culture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CultureConfig {
    /// Simulated end time; the driver halts before firing past it.
    pub end_time: f64,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Default segment length for spore cells.
    pub segment_length: f64,
    /// Standard deviation of the Gaussian angular growth noise, radians.
    pub angle_noise_dev: f64,
    /// Exponential rate at which the tracked polarity quantity grows
    /// (positive) or decays (negative) with simulated time.
    pub polarity_binding_rate: f64,
    pub crowding: CrowdingConfig,
    pub tropism: TropismConfig,
}

impl Default for CultureConfig {
    fn default() -> Self {
        Self {
            end_time: 48.0,
            rng_seed: None,
            segment_length: 1.0,
            angle_noise_dev: 20.0_f64.to_radians(),
            polarity_binding_rate: 0.1,
            crowding: CrowdingConfig::default(),
            tropism: TropismConfig::default(),
        }
    }
}

impl CultureConfig {
    /// Validate the configuration, returning the derived spatial partition
    /// size (the crowding cutoff distance).
    pub fn partition_size(&self) -> Result<f64, CultureError> {
        if !self.end_time.is_finite() || self.end_time <= 0.0 {
            return Err(CultureError::InvalidConfig("end_time must be positive"));
        }
        if !self.segment_length.is_finite() || self.segment_length <= 0.0 {
            return Err(CultureError::InvalidConfig(
                "segment_length must be positive",
            ));
        }
        if !self.angle_noise_dev.is_finite() || self.angle_noise_dev < 0.0 {
            return Err(CultureError::InvalidConfig(
                "angle_noise_dev must be non-negative",
            ));
        }
        if !self.polarity_binding_rate.is_finite() {
            return Err(CultureError::InvalidConfig(
                "polarity_binding_rate must be finite",
            ));
        }
        let crowding = &self.crowding;
        if crowding.steepness <= 0.0 || crowding.spacing <= 0.0 || crowding.alpha < 0.0 {
            return Err(CultureError::InvalidConfig(
                "crowding steepness and spacing must be positive, alpha non-negative",
            ));
        }
        if crowding.error_tolerance <= 0.0 || crowding.error_tolerance >= crowding.spacing {
            return Err(CultureError::InvalidConfig(
                "crowding error_tolerance must lie in (0, spacing)",
            ));
        }
        if self.tropism.sensitivity < 0.0 || self.tropism.max_bend < 0.0 {
            return Err(CultureError::InvalidConfig(
                "tropism sensitivity and max_bend must be non-negative",
            ));
        }
        Ok(crate::action::crowding_cutoff(
            crowding.error_tolerance,
            crowding.steepness,
            crowding.spacing,
        ))
    }

    /// Returns the configured RNG, seeding from entropy when no seed is set.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}
