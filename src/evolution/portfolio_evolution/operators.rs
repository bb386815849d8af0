use super::{EvolutionDiagnostics, EvolutionError};
use crate::consts::{FLOAT_COMPARISON_EPSILON, MAX_CUT_POINTS, PERTURBATION, SEED_SUM_TOLERANCE};
use crate::portfolio::Portfolio;
use rand::seq::index;
use rand::Rng;
use tracing::warn;

// mass below this is treated as nothing left to rescale
const RESCALE_EPSILON: f64 = 1e-12;

pub fn uniform_allocation(assets_under_management: usize) -> Vec<f64> {
    vec![1. / assets_under_management as f64; assets_under_management]
}

/// Every weight in `[0, cap]` and the weights sum to 1.
pub fn is_feasible_allocation(weights: &[f64], cap: f64) -> bool {
    let within_cap = weights
        .iter()
        .all(|&w| w >= 0.0 && w <= cap + FLOAT_COMPARISON_EPSILON);
    within_cap && (weights.iter().sum::<f64>() - 1.0).abs() <= SEED_SUM_TOLERANCE
}

/// Clips every weight to `[0, cap]` and rescales so the weights sum to 1.
///
/// When the clipped weights sum to more than 1 they are simply divided by
/// their sum. When they sum to less, the weights still below the cap are
/// scaled up to absorb the missing mass; any weight pushed over the cap is
/// pinned at the cap and the remainder is spread over the others again, so
/// the result never exceeds the cap.
///
/// Fails with [`EvolutionError::DegenerateAllocation`] when nothing is left
/// to rescale: all weights clip to zero, or the non-zero weights are too few
/// to reach 1 while staying under the cap.
pub fn adjust_allocation(weights: &[f64], cap: f64) -> Result<Vec<f64>, EvolutionError> {
    let mut adjusted = weights
        .iter()
        .map(|&w| if w.is_nan() { 0.0 } else { w.clamp(0.0, cap) })
        .collect::<Vec<f64>>();

    let total = adjusted.iter().sum::<f64>();
    if total <= RESCALE_EPSILON {
        return Err(EvolutionError::DegenerateAllocation);
    }
    if total >= 1.0 {
        adjusted.iter_mut().for_each(|w| *w /= total);
        return Ok(adjusted);
    }

    // every pass pins at least one more weight, so this ends within n passes
    loop {
        let pinned = adjusted.iter().filter(|&&w| w >= cap).count();
        let missing = 1.0 - cap * pinned as f64;
        if missing <= RESCALE_EPSILON {
            break;
        }
        let free_mass = adjusted.iter().filter(|&&w| w < cap).sum::<f64>();
        if free_mass <= RESCALE_EPSILON {
            return Err(EvolutionError::DegenerateAllocation);
        }

        let scale = missing / free_mass;
        let mut overflowed = false;
        for w in adjusted.iter_mut().filter(|w| **w < cap) {
            *w *= scale;
            if *w >= cap {
                *w = cap;
                overflowed = true;
            }
        }
        if !overflowed {
            break;
        }
    }
    Ok(adjusted)
}

/// [`adjust_allocation`], replacing a degenerate candidate with the uniform
/// allocation. Valid because `n * cap >= 1` is checked before any run.
pub(crate) fn adjust_or_fallback(
    weights: &[f64],
    cap: f64,
    diagnostics: &mut EvolutionDiagnostics,
) -> Vec<f64> {
    match adjust_allocation(weights, cap) {
        Ok(adjusted) => adjusted,
        Err(e) => {
            diagnostics.degenerate_allocation_fallbacks += 1;
            warn!(
                "{e}; replacing candidate with the uniform allocation ({} so far)",
                diagnostics.degenerate_allocation_fallbacks
            );
            uniform_allocation(weights.len())
        }
    }
}

/// Winner index for every slot of the next mating pool.
///
/// Each tournament draws `tournament_size` distinct indices (capped at the
/// population size) and keeps the fittest; on ties the first one drawn wins.
pub fn tournament_indices<R: Rng + ?Sized>(
    fitness: &[f64],
    tournament_size: usize,
    rng: &mut R,
) -> Vec<usize> {
    let population_size = fitness.len();
    if population_size == 0 {
        return vec![];
    }
    let contestants_per_tournament = tournament_size.clamp(1, population_size);

    (0..population_size)
        .map(|_| {
            let contestants =
                index::sample(&mut *rng, population_size, contestants_per_tournament);
            contestants
                .iter()
                .skip(1)
                .fold(contestants.index(0), |winner, contestant| {
                    if fitness[contestant] > fitness[winner] {
                        contestant
                    } else {
                        winner
                    }
                })
        })
        .collect()
}

pub fn tournament_selection<R: Rng + ?Sized>(
    population: &[Vec<f64>],
    fitness: &[f64],
    tournament_size: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    tournament_indices(fitness, tournament_size, rng)
        .into_iter()
        .map(|winner| population[winner].clone())
        .collect()
}

/// Between 1 and 3 distinct cut points in `[1, genes - 1]`, ascending.
pub fn sample_cut_points<R: Rng + ?Sized>(genes: usize, rng: &mut R) -> Vec<usize> {
    if genes < 2 {
        return vec![];
    }
    let count = rng.gen_range(1..=MAX_CUT_POINTS).min(genes - 1);
    let mut cut_points = index::sample(rng, genes - 1, count)
        .into_iter()
        .map(|i| i + 1)
        .collect::<Vec<usize>>();
    cut_points.sort_unstable();
    cut_points
}

/// Swaps the segments `[cut0, cut1)`, `[cut2, cut3)`, ... between the parents.
/// An unpaired trailing cut point swaps nothing.
pub(crate) fn swap_segments(
    parent_1: &[f64],
    parent_2: &[f64],
    cut_points: &[usize],
) -> (Vec<f64>, Vec<f64>) {
    let mut child_1 = parent_1.to_vec();
    let mut child_2 = parent_2.to_vec();
    for segment in cut_points.chunks_exact(2) {
        let (start, end) = (segment[0], segment[1]);
        child_1[start..end].copy_from_slice(&parent_2[start..end]);
        child_2[start..end].copy_from_slice(&parent_1[start..end]);
    }
    (child_1, child_2)
}

/// Multi-point crossover; both children come back capped and normalized.
pub fn crossover<R: Rng + ?Sized>(
    parent_1: &[f64],
    parent_2: &[f64],
    cap: f64,
    rng: &mut R,
    diagnostics: &mut EvolutionDiagnostics,
) -> (Vec<f64>, Vec<f64>) {
    let cut_points = sample_cut_points(parent_1.len(), rng);
    let (child_1, child_2) = swap_segments(parent_1, parent_2, &cut_points);
    (
        adjust_or_fallback(&child_1, cap, diagnostics),
        adjust_or_fallback(&child_2, cap, diagnostics),
    )
}

/// With probability `mutation_rate`, nudges one weight by up to
/// `PERTURBATION` either way and re-adjusts. Otherwise returns the weights
/// untouched.
pub fn mutate<R: Rng + ?Sized>(
    weights: Vec<f64>,
    mutation_rate: f64,
    cap: f64,
    rng: &mut R,
    diagnostics: &mut EvolutionDiagnostics,
) -> Vec<f64> {
    if weights.is_empty() || !rng.gen_bool(mutation_rate) {
        return weights;
    }
    let mut weights = weights;
    let gene = rng.gen_range(0..weights.len());
    weights[gene] += rng.gen_range(-PERTURBATION..=PERTURBATION);
    adjust_or_fallback(&weights, cap, diagnostics)
}

/// Elitism gate: the best-known allocation takes slot 0 of the next generation.
pub fn apply_elitism(next_generation: &mut [Vec<f64>], best_known: &Portfolio) {
    if let Some(slot) = next_generation.first_mut() {
        slot.clone_from(&best_known.weights);
    }
}
