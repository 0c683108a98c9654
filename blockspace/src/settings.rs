//! Tunable parameters of growth and ring-closure bookkeeping.

use crate::util::clamp_probability;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a probability decays with an integer argument (tree depth or port crowding).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProbabilityScheme {
    ExpDiff { lambda: f64 },
    Tanh { lambda: f64 },
    Sigma { steepness: f64, middle: f64 },
    Unrestricted,
}

impl ProbabilityScheme {
    pub fn probability(&self, x: f64) -> f64 {
        let p = match *self {
            ProbabilityScheme::ExpDiff { lambda } => {
                let f = (-x * lambda).exp();
                1.0 - (1.0 - f) / (1.0 + f)
            }
            ProbabilityScheme::Tanh { lambda } => 1.0 - (lambda * x).tanh(),
            ProbabilityScheme::Sigma { steepness, middle } => {
                1.0 - 1.0 / (1.0 + (-steepness * (x - middle)).exp())
            }
            ProbabilityScheme::Unrestricted => 1.0,
        };
        clamp_probability(p)
    }
}

impl Default for ProbabilityScheme {
    fn default() -> Self {
        ProbabilityScheme::ExpDiff { lambda: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GrowthSettings {
    pub growth: ProbabilityScheme,
    pub crowding: ProbabilityScheme,
    /// Probability of growing symmetrically when no class rule decides.
    pub symmetry_probability: f64,
    /// Grow symmetrically whenever no class rule decides.
    pub enforce_symmetry: bool,
    pub ring_closures: RingClosureSettings,
}

impl Default for GrowthSettings {
    fn default() -> Self {
        GrowthSettings {
            growth: ProbabilityScheme::default(),
            crowding: ProbabilityScheme::default(),
            symmetry_probability: 0.0,
            enforce_symmetry: false,
            ring_closures: RingClosureSettings::default(),
        }
    }
}

impl GrowthSettings {
    pub fn with_growth(mut self, scheme: ProbabilityScheme) -> Self {
        self.growth = scheme;
        self
    }

    pub fn with_crowding(mut self, scheme: ProbabilityScheme) -> Self {
        self.crowding = scheme;
        self
    }

    pub fn with_symmetry_probability(mut self, p: f64) -> Self {
        self.symmetry_probability = clamp_probability(p);
        self
    }

    pub fn with_enforced_symmetry(mut self, enforce: bool) -> Self {
        self.enforce_symmetry = enforce;
        self
    }

    pub fn with_ring_closures(mut self, ring_closures: RingClosureSettings) -> Self {
        self.ring_closures = ring_closures;
        self
    }

    /// Probability of growing on a vertex at `level` (the root sits at level -1).
    pub fn growth_probability(&self, level: i32) -> f64 {
        self.growth.probability(f64::from(level + 1))
    }

    /// Probability of using a port whose vertex already has `crowdedness` used ports.
    pub fn crowding_probability(&self, crowdedness: usize) -> f64 {
        self.crowding.probability(crowdedness as f64)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RingClosureSettings {
    pub enabled: bool,
    /// Prefer blocks that continue a known closable chain.
    pub closable_chain_bias: bool,
    pub lock_attempts: u32,
    pub lock_retry_delay: Duration,
}

impl Default for RingClosureSettings {
    fn default() -> Self {
        RingClosureSettings {
            enabled: false,
            closable_chain_bias: false,
            lock_attempts: 20,
            lock_retry_delay: Duration::from_millis(50),
        }
    }
}

impl RingClosureSettings {
    pub fn enabled() -> Self {
        RingClosureSettings {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_closable_chain_bias(mut self, bias: bool) -> Self {
        self.closable_chain_bias = bias;
        self
    }

    pub fn with_lock_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.lock_attempts = attempts.max(1);
        self.lock_retry_delay = delay;
        self
    }
}
