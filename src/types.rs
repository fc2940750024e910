//! Shared identifiers, the chip model, and configuration errors.

use std::fmt;
use std::time::Duration;

use rand::Rng;

/// Unique identifier for a chip, assigned by the producer in push order.
pub type ChipId = u64;
/// Unique identifier for a worker thread.
pub type WorkerId = u64;

/// Smallest cost a chip can carry.
pub const MIN_COST: u32 = 1;
/// Largest cost a chip can carry.
pub const MAX_COST: u32 = 3;

/// Unit of work soldered by workers. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chip {
    /// Stable chip identifier for logging and validation.
    pub id: ChipId,
    /// Processing cost in soldering-time units, within [MIN_COST, MAX_COST].
    pub cost: u32,
}

impl Chip {
    /// Construct a chip with an explicit cost.
    pub fn new(id: ChipId, cost: u32) -> Self {
        debug_assert!(
            (MIN_COST..=MAX_COST).contains(&cost),
            "chip cost out of range: {cost}"
        );
        Self { id, cost }
    }

    /// Construct a chip with a cost drawn uniformly from the cost range.
    pub fn random(id: ChipId) -> Self {
        let cost = rand::thread_rng().gen_range(MIN_COST..=MAX_COST);
        Self::new(id, cost)
    }

    /// Human-readable size label for log output.
    pub fn grade(&self) -> &'static str {
        match self.cost {
            1 => "small",
            2 => "medium",
            _ => "big",
        }
    }

    /// Wall-clock time needed to solder this chip at the given cost unit.
    pub fn soldering_time(&self, cost_unit: Duration) -> Duration {
        cost_unit * self.cost
    }
}

/// Invalid startup configuration, detected before any thread is spawned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// At least one worker is required to drain the stack.
    NoWorkers,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoWorkers => write!(f, "workers must be > 0"),
        }
    }
}

impl std::error::Error for ConfigError {}
