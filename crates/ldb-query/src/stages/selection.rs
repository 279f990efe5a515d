use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::candidate::Candidate;
use crate::error::QueryResult;
use crate::filter::FilterKind;
use crate::stage::{FilterContext, FilterStage};

/// `limit`: the first N candidates.
pub struct LimitStage {
    pub n: usize,
}

impl FilterStage for LimitStage {
    fn kind(&self) -> FilterKind {
        FilterKind::Limit
    }

    fn apply(&self, mut candidates: Vec<Candidate>, _ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        candidates.truncate(self.n);
        Ok(candidates)
    }
}

/// `sample`: N candidates drawn uniformly without replacement, kept in their
/// original relative order.
pub struct SampleStage {
    pub n: usize,
    pub seed: Option<u64>,
}

impl FilterStage for SampleStage {
    fn kind(&self) -> FilterKind {
        FilterKind::Sample
    }

    fn apply(&self, candidates: Vec<Candidate>, _ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        if self.n >= candidates.len() {
            return Ok(candidates);
        }
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut picked = rand::seq::index::sample(&mut rng, candidates.len(), self.n).into_vec();
        picked.sort_unstable();
        Ok(picked.into_iter().map(|i| candidates[i]).collect())
    }
}
