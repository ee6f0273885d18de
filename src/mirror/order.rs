//! Candidate ordering for mirror searches
//!
//! The search order decides which mirror a failing resource lands on.
//! `Descending` is the default and strictly prefers higher ids.
//! `WeightedRandom` spreads load across mirrors while still favouring higher
//! ids, using a ChaCha8 RNG that can be seeded so a run is reproducible.
//! `Forced` pins every search to one mirror.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Mutex;

use super::{MirrorId, MirrorRange};

/// Search-order mode selected at invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchOrder {
    /// MAX down to MIN
    #[default]
    Descending,
    /// Random permutation weighted toward higher ids
    WeightedRandom,
    /// Only the configured forced mirror
    Forced,
}

impl SearchOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Descending => "descending",
            Self::WeightedRandom => "weighted-random",
            Self::Forced => "forced",
        }
    }
}

impl FromStr for SearchOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "descending" | "desc" => Ok(Self::Descending),
            "weighted-random" | "weighted_random" | "random" => Ok(Self::WeightedRandom),
            "forced" | "single" => Ok(Self::Forced),
            other => Err(format!(
                "unknown search order '{other}' (expected descending, weighted-random or forced)"
            )),
        }
    }
}

/// Produces the candidate list for one search
pub struct CandidateOrder {
    order: SearchOrder,
    range: MirrorRange,
    forced: Option<MirrorId>,
    rng: Mutex<ChaCha8Rng>,
}

impl CandidateOrder {
    pub fn new(
        order: SearchOrder,
        range: MirrorRange,
        forced: Option<MirrorId>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            order,
            range,
            forced,
            rng: Mutex::new(rng),
        }
    }

    /// Plain descending order over `range`
    pub fn descending(range: MirrorRange) -> Self {
        Self::new(SearchOrder::Descending, range, None, Some(0))
    }

    pub fn mode(&self) -> SearchOrder {
        self.order
    }

    /// Candidates in priority order, never containing `exclude`
    pub fn candidates(&self, exclude: Option<MirrorId>) -> Vec<MirrorId> {
        let mut ids: Vec<MirrorId> = match self.order {
            SearchOrder::Descending => self.range.descending().collect(),
            SearchOrder::WeightedRandom => self.weighted_permutation(),
            SearchOrder::Forced => self
                .forced
                .filter(|id| self.range.contains(*id))
                .into_iter()
                .collect(),
        };
        ids.retain(|id| Some(*id) != exclude);
        ids
    }

    /// Efraimidis-Spirakis weighted shuffle: key = u^(1/w), sorted descending
    fn weighted_permutation(&self) -> Vec<MirrorId> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut keyed: Vec<(f64, MirrorId)> = self
            .range
            .descending()
            .map(|id| {
                let weight = f64::from(id.0 - self.range.min + 1);
                let u: f64 = rng.gen_range(f64::EPSILON..1.0);
                (u.powf(1.0 / weight), id)
            })
            .collect();
        keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
        keyed.into_iter().map(|(_, id)| id).collect()
    }
}
