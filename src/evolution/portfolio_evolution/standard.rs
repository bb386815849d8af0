use super::operators::{
    adjust_or_fallback, apply_elitism, crossover, is_feasible_allocation, mutate,
    tournament_selection,
};
use super::{
    initialize_population, validate_seed, EvolutionConfig, EvolutionDiagnostics, EvolutionError,
    EvolutionObserver, EvolutionResult, EvolutionStatus, GenerationReport, RunControl,
};
use crate::evolution::objective::OptimizationObjective;
use crate::portfolio::Portfolio;
use crate::sampling::{seeded_rng, SimplexSampler};
use rayon::prelude::*;
use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

// Strategy Definition
pub trait EvolutionStrategy {
    fn evolve<O, B>(
        &self,
        objective: &O,
        seed: &[f64],
        observer: &mut B,
    ) -> Result<EvolutionResult, EvolutionError>
    where
        O: OptimizationObjective,
        B: EvolutionObserver;
}

/// Single-objective generational GA: tournament selection, multi-point
/// crossover, single-gene mutation and an optional one-slot elitism gate.
#[derive(Debug, Clone)]
pub struct StandardEvolution {
    config: EvolutionConfig,
    control: RunControl,
}

impl StandardEvolution {
    pub fn new(config: EvolutionConfig) -> Self {
        StandardEvolution {
            config,
            control: RunControl::default(),
        }
    }

    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

}

/// Index and value of the fittest member that satisfies the allocation
/// constraints; the first one wins ties. Unadjusted initial draws can break
/// the cap, so they compete in selection but never become the best-known.
fn fittest_feasible(population: &[Vec<f64>], fitness: &[f64], cap: f64) -> (usize, f64) {
    population
        .iter()
        .zip(fitness.iter())
        .enumerate()
        .filter(|(_, (weights, _))| is_feasible_allocation(weights, cap))
        .fold(
            (0, f64::NEG_INFINITY),
            |(best_index, best), (index, (_, &value))| {
                if value > best {
                    (index, value)
                } else {
                    (best_index, best)
                }
            },
        )
}

impl EvolutionStrategy for StandardEvolution {
    fn evolve<O, B>(
        &self,
        objective: &O,
        seed: &[f64],
        observer: &mut B,
    ) -> Result<EvolutionResult, EvolutionError>
    where
        O: OptimizationObjective,
        B: EvolutionObserver,
    {
        // Initialization Phase
        let config = &self.config;
        let assets_under_management = seed.len();
        let cap = config.allocation_cap;
        config.validate(assets_under_management)?;
        validate_seed(seed, assets_under_management)?;

        let population_size = config.population_size;
        let tournament_size = config.tournament_size.min(population_size);
        if tournament_size < config.tournament_size {
            warn!(
                "Tournament size {} exceeds the population size, using {}.",
                config.tournament_size, tournament_size
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .build()?;
        let (mut rng, rng_seed) = seeded_rng(config.global_seed);
        let sampler = SimplexSampler::new(assets_under_management)?;
        let mut diagnostics = EvolutionDiagnostics {
            tournament_size_used: tournament_size,
            ..EvolutionDiagnostics::default()
        };

        let seed = if is_feasible_allocation(seed, cap) {
            seed.to_vec()
        } else {
            info!("Seed allocation exceeds the cap {}, adjusting it.", cap);
            adjust_or_fallback(seed, cap, &mut diagnostics)
        };
        let mut population = initialize_population(&seed, population_size, &sampler, &mut rng);
        let seed_fitness = objective.compute(&seed);
        let mut best_known = Portfolio::new(seed, seed_fitness, None);
        let mut generations_without_improvement = 0;

        let mut convergence_trace: Vec<(usize, f64)> = Vec::with_capacity(config.generations);
        let mut average_fitness_per_generation: Vec<f64> = Vec::with_capacity(config.generations);
        let mut status = EvolutionStatus::Running;
        let mut generations_run = 0;

        info!(
            assets = assets_under_management,
            population_size,
            generations = config.generations,
            seed = rng_seed,
            "Starting evolution from a seed with fitness {:.4}",
            best_known.fitness
        );

        for generation in 0..config.generations {
            if self.control.should_stop() {
                info!("Evolution cancelled before generation {}.", generation);
                status = EvolutionStatus::Cancelled;
                break;
            }

            // fork-join: members are independent, results come back in population order
            let fitness: Vec<f64> = pool.install(|| {
                population
                    .par_iter()
                    .map(|weights| objective.compute(weights))
                    .collect()
            });

            let (fittest_index, generation_best) = fittest_feasible(&population, &fitness, cap);
            if generation_best > best_known.fitness {
                best_known = Portfolio::new(
                    population[fittest_index].clone(),
                    generation_best,
                    Some(generation),
                );
                generations_without_improvement = 0;
            } else {
                generations_without_improvement += 1;
            }

            convergence_trace.push((generation, best_known.fitness));
            average_fitness_per_generation.push(fitness.iter().mean());
            generations_run = generation + 1;

            observer.on_generation(&GenerationReport {
                generation,
                population: &population,
                fitness: &fitness,
                best_known: &best_known,
                generations_without_improvement,
            });
            debug!(
                generation,
                best_known = best_known.fitness,
                generation_best,
                stagnation = generations_without_improvement,
                "Generation evaluated"
            );

            // Breeding
            let mating_pool = tournament_selection(&population, &fitness, tournament_size, &mut rng);
            let mut next_generation: Vec<Vec<f64>> = Vec::with_capacity(population_size);
            for parents in mating_pool.chunks_exact(2) {
                let (child_1, child_2) =
                    crossover(&parents[0], &parents[1], cap, &mut rng, &mut diagnostics);
                next_generation.push(mutate(
                    child_1,
                    config.mutation_rate,
                    cap,
                    &mut rng,
                    &mut diagnostics,
                ));
                next_generation.push(mutate(
                    child_2,
                    config.mutation_rate,
                    cap,
                    &mut rng,
                    &mut diagnostics,
                ));
            }

            if config.use_elitism {
                apply_elitism(&mut next_generation, &best_known);
            }
            population = next_generation;

            if generations_without_improvement >= config.stagnation_limit {
                status = EvolutionStatus::Converged;
                break;
            }
        }

        if status == EvolutionStatus::Running {
            status = EvolutionStatus::Exhausted;
        }

        info!(
            ?status,
            generations_run,
            fallbacks = diagnostics.degenerate_allocation_fallbacks,
            "Evolution finished with best fitness {:.4}",
            best_known.fitness
        );

        Ok(EvolutionResult {
            best_portfolio: best_known,
            convergence_trace,
            average_fitness_per_generation,
            status,
            generations_run,
            seed: rng_seed,
            diagnostics,
        })
    }
}
