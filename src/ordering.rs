//! Ordering policy for sibling specs and leaves.
//!
//! The policy is consulted once per spec subtree while the plan is built.
//! Random ordering shuffles each subtree with its own generator, derived from
//! the run seed and the subtree's path, so a subtree keeps the same order for
//! the same seed no matter what its siblings look like.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::random::derive_seed_bytes;
use crate::spec::SourceLocation;

/// How siblings are ordered before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    /// Registration order.
    Defined,
    /// Source location order.
    File,
    /// Seeded shuffle.
    Random,
}

impl OrderingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderingMode::Defined => "defined",
            OrderingMode::File => "file",
            OrderingMode::Random => "random",
        }
    }
}

impl fmt::Display for OrderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "defined" => Ok(OrderingMode::Defined),
            "file" => Ok(OrderingMode::File),
            "random" => Ok(OrderingMode::Random),
            _ => Err(ConfigError::InvalidOrdering {
                value: s.to_string(),
            }),
        }
    }
}

/// Applies an [`OrderingMode`] to the children of one subtree.
#[derive(Debug, Clone, Copy)]
pub struct Orderer {
    mode: OrderingMode,
    seed: u64,
}

impl Orderer {
    pub fn new(mode: OrderingMode, seed: u64) -> Self {
        Self { mode, seed }
    }

    pub fn mode(&self) -> OrderingMode {
        self.mode
    }

    /// Same seed, different mode. Used for per-spec ordering overrides.
    pub fn with_mode(self, mode: OrderingMode) -> Self {
        Self { mode, ..self }
    }

    /// Reorders `items` in place. `scope` identifies the subtree and `location`
    /// yields the source position used by [`OrderingMode::File`].
    pub fn order<I, L>(&self, scope: &str, items: &mut [I], location: L)
    where
        L: Fn(&I) -> SourceLocation,
    {
        match self.mode {
            OrderingMode::Defined => {}
            OrderingMode::File => items.sort_by_key(|item| location(item)),
            OrderingMode::Random => {
                let mut rng = Xoshiro256StarStar::from_seed(derive_seed_bytes(self.seed, scope));
                items.shuffle(&mut rng);
            }
        }
    }
}
