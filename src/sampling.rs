use crate::evolution::portfolio_evolution::EvolutionError;
use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Dirichlet, Distribution};

/// If seed is None, we generate one from OsRng so it can be recorded and the
/// run replayed later.
pub fn seeded_rng(seed: Option<u64>) -> (ChaCha20Rng, u64) {
    let seed = seed.unwrap_or_else(|| OsRng.next_u64());
    (ChaCha20Rng::seed_from_u64(seed), seed)
}

/// Draws allocations uniformly over the simplex, i.e. from a symmetric
/// Dirichlet with every concentration parameter set to one.
#[derive(Debug, Clone)]
pub struct SimplexSampler {
    dirichlet: Dirichlet<f64>,
}

impl SimplexSampler {
    pub fn new(assets_under_management: usize) -> Result<Self, EvolutionError> {
        let dirichlet = Dirichlet::new_with_size(1.0, assets_under_management)
            .map_err(|e| EvolutionError::InvalidDimensions(format!("simplex sampler: {e}")))?;
        Ok(SimplexSampler { dirichlet })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let mut weights: Vec<f64> = self.dirichlet.sample(rng);
        // the gamma draws are normalized already, this only removes rounding drift
        let total = weights.iter().sum::<f64>();
        weights.iter_mut().for_each(|w| *w /= total);
        weights
    }
}
