//! Algorithm selection and parameters.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The members of the SHARC family.
///
/// Each variant is a fixed composition of a similarity strategy, the SHARC
/// fallback, an optional stability controller and an originator policy:
///
/// | variant | similarity | fallback | stability | token policy |
/// |---|---|---|---|---|
/// | `Baseline` | neighbor count | no | no | highest score |
/// | `Sharc` | neighborhood | yes | no | highest score |
/// | `CdfWeighted` | CDF rank | yes | no | highest score |
/// | `MaxWeighted` | max weight | yes | no | highest score |
/// | `StabilityAware` | max weight | yes | yes | highest score |
/// | `TokenRandomWalk` | max weight | yes | yes | random walk |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    /// Plain epidemic label aggregation.
    Baseline,
    /// Neighborhood-similarity label aggregation.
    Sharc,
    /// SHARC with CDF-rank link weighting.
    CdfWeighted,
    /// SHARC with max-weight link normalization.
    MaxWeighted,
    /// Weighted SHARC with the freshness/break state machine.
    StabilityAware,
    /// Stability-aware SHARC with the random-walk token policy.
    TokenRandomWalk,
}

impl Algorithm {
    /// Every variant, in declaration order.
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Baseline,
        Algorithm::Sharc,
        Algorithm::CdfWeighted,
        Algorithm::MaxWeighted,
        Algorithm::StabilityAware,
        Algorithm::TokenRandomWalk,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Baseline => "baseline",
            Algorithm::Sharc => "sharc",
            Algorithm::CdfWeighted => "cdf-weighted",
            Algorithm::MaxWeighted => "max-weighted",
            Algorithm::StabilityAware => "stability-aware",
            Algorithm::TokenRandomWalk => "token-random-walk",
        }
    }

    /// Whether the variant runs the freshness/break state machine.
    pub fn has_stability(&self) -> bool {
        matches!(
            self,
            Algorithm::StabilityAware | Algorithm::TokenRandomWalk
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Accepts the canonical names plus the historical class names
    /// (`EpidemicCommunityAlgorithm`, `SawSharc`, `NewSawSharc`, `DynSharc`,
    /// `SandSharc`), case-insensitively. `AltSawSharc` is not a name: it is
    /// `CdfWeighted` with [`SharcConfig::with_forced_yes`].
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "baseline" | "epidemic" | "epidemiccommunityalgorithm" => Ok(Algorithm::Baseline),
            "sharc" => Ok(Algorithm::Sharc),
            "cdfweighted" | "sawsharc" => Ok(Algorithm::CdfWeighted),
            "maxweighted" | "newsawsharc" => Ok(Algorithm::MaxWeighted),
            "stabilityaware" | "dynsharc" => Ok(Algorithm::StabilityAware),
            "tokenrandomwalk" | "sandsharc" => Ok(Algorithm::TokenRandomWalk),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// How reads and writes interleave within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Schedule {
    /// Every node reads the state committed at the end of the previous
    /// round; token transfers land after all nodes updated.
    #[default]
    Synchronous,
    /// Nodes update in ascending index order and commit as soon as their own
    /// update returns, so later nodes see earlier results.
    Sequential,
}

/// Configuration for [`Sharc`](super::Sharc).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SharcConfig {
    /// Which member of the family to run.
    pub algorithm: Algorithm,
    /// Read/write interleaving.
    pub schedule: Schedule,
    /// Use the `1/cdf - 1` exponent (only read by `CdfWeighted`).
    pub forced_yes: bool,
    /// Stalled rounds before a node breaks away.
    pub stalling_threshold: u32,
    /// Length of a break episode, in rounds.
    pub break_period: u32,
    /// Random seed; `None` draws one from the thread generator.
    pub seed: Option<u64>,
    /// Rounds run by batch detection.
    pub max_rounds: usize,
}

impl Default for SharcConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::StabilityAware,
            schedule: Schedule::Synchronous,
            forced_yes: false,
            stalling_threshold: 5,
            break_period: 5,
            seed: None,
            max_rounds: 100,
        }
    }
}

impl SharcConfig {
    /// Default configuration for `algorithm`.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Set the schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Select the forced-yes CDF exponent.
    pub fn with_forced_yes(mut self, forced_yes: bool) -> Self {
        self.forced_yes = forced_yes;
        self
    }

    /// Set the stalling threshold and break period together.
    pub fn with_break(mut self, stalling_threshold: u32, break_period: u32) -> Self {
        self.stalling_threshold = stalling_threshold;
        self.break_period = break_period;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of rounds used by batch detection.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.stalling_threshold == 0 {
            return Err(Error::InvalidParameter {
                name: "stalling_threshold",
                message: "must be at least 1",
            });
        }
        if self.break_period == 0 {
            return Err(Error::InvalidParameter {
                name: "break_period",
                message: "must be at least 1",
            });
        }
        if self.max_rounds == 0 {
            return Err(Error::InvalidParameter {
                name: "max_rounds",
                message: "must be at least 1",
            });
        }
        Ok(())
    }
}
