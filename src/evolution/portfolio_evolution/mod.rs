use crate::consts::{
    DEFAULT_ALLOCATION_CAP, DEFAULT_GENERATIONS, DEFAULT_MIN_PORTFOLIO_RISK,
    DEFAULT_MUTATION_RATE, DEFAULT_POPULATION_SIZE, DEFAULT_STAGNATION_LIMIT,
    DEFAULT_TOURNAMENT_SIZE, SEED_SUM_TOLERANCE,
};
use crate::portfolio::Portfolio;
use crate::sampling::SimplexSampler;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

pub mod operators;
pub mod standard;

pub use operators::{
    adjust_allocation, apply_elitism, crossover, is_feasible_allocation, mutate,
    sample_cut_points, tournament_indices, tournament_selection, uniform_allocation,
};
pub use standard::StandardEvolution;

#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
    #[error("Population size must be even and at least 2, got {0}")]
    InvalidPopulationSize(usize),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Allocation cannot be rescaled to sum to 1 within the cap")]
    DegenerateAllocation,
    #[error("Failed to build the evaluation worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

fn default_population_size() -> usize {
    DEFAULT_POPULATION_SIZE
}
fn default_generations() -> usize {
    DEFAULT_GENERATIONS
}
fn default_use_elitism() -> bool {
    true
}
fn default_mutation_rate() -> f64 {
    DEFAULT_MUTATION_RATE
}
fn default_stagnation_limit() -> usize {
    DEFAULT_STAGNATION_LIMIT
}
fn default_allocation_cap() -> f64 {
    DEFAULT_ALLOCATION_CAP
}
fn default_tournament_size() -> usize {
    DEFAULT_TOURNAMENT_SIZE
}
fn default_min_portfolio_risk() -> f64 {
    DEFAULT_MIN_PORTFOLIO_RISK
}
fn default_max_concurrency() -> usize {
    num_cpus::get()
}

/// Parameters of a single run. Only `risk_free_rate` has no default.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EvolutionConfig {
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    #[serde(default = "default_generations")]
    pub generations: usize,
    #[serde(default = "default_use_elitism")]
    pub use_elitism: bool,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Generations without improvement of the best-known fitness before the run stops.
    #[serde(default = "default_stagnation_limit")]
    pub stagnation_limit: usize,
    #[serde(default = "default_allocation_cap")]
    pub allocation_cap: f64,
    pub risk_free_rate: f64,
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    #[serde(default = "default_min_portfolio_risk")]
    pub min_portfolio_risk: f64,
    #[serde(default)]
    pub global_seed: Option<u64>,
    /// Threads used to evaluate a generation. Zero lets rayon decide.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl EvolutionConfig {
    pub fn new(risk_free_rate: f64) -> Self {
        EvolutionConfig {
            population_size: default_population_size(),
            generations: default_generations(),
            use_elitism: default_use_elitism(),
            mutation_rate: default_mutation_rate(),
            stagnation_limit: default_stagnation_limit(),
            allocation_cap: default_allocation_cap(),
            risk_free_rate,
            tournament_size: default_tournament_size(),
            min_portfolio_risk: default_min_portfolio_risk(),
            global_seed: None,
            max_concurrency: default_max_concurrency(),
        }
    }

    /// Checks every run parameter against a universe of `assets_under_management` assets.
    pub fn validate(&self, assets_under_management: usize) -> Result<(), EvolutionError> {
        if assets_under_management < 2 {
            return Err(EvolutionError::InvalidDimensions(format!(
                "at least 2 assets are needed, got {}",
                assets_under_management
            )));
        }
        if self.population_size == 0 || self.population_size % 2 != 0 {
            return Err(EvolutionError::InvalidPopulationSize(self.population_size));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EvolutionError::InvalidParameter(format!(
                "mutation_rate must be in [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if !(self.allocation_cap > 0.0 && self.allocation_cap <= 1.0) {
            return Err(EvolutionError::InvalidParameter(format!(
                "allocation_cap must be in (0, 1], got {}",
                self.allocation_cap
            )));
        }
        if (assets_under_management as f64) * self.allocation_cap < 1.0 {
            return Err(EvolutionError::InvalidParameter(format!(
                "{} assets capped at {} cannot hold a full allocation",
                assets_under_management, self.allocation_cap
            )));
        }
        if self.generations == 0 {
            return Err(EvolutionError::InvalidParameter(
                "generations must be at least 1".into(),
            ));
        }
        if self.stagnation_limit == 0 {
            return Err(EvolutionError::InvalidParameter(
                "stagnation_limit must be at least 1".into(),
            ));
        }
        if self.tournament_size == 0 {
            return Err(EvolutionError::InvalidParameter(
                "tournament_size must be at least 1".into(),
            ));
        }
        if !(self.min_portfolio_risk.is_finite() && self.min_portfolio_risk > 0.0) {
            return Err(EvolutionError::InvalidParameter(format!(
                "min_portfolio_risk must be positive, got {}",
                self.min_portfolio_risk
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(EvolutionError::InvalidParameter(
                "risk_free_rate must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// The seed genome must lie on the simplex. The cap is not checked here, the
/// run adjusts an over-cap seed before it enters the population.
pub fn validate_seed(seed: &[f64], assets_under_management: usize) -> Result<(), EvolutionError> {
    if seed.len() != assets_under_management {
        return Err(EvolutionError::InvalidDimensions(format!(
            "seed has {} entries, expected {}",
            seed.len(),
            assets_under_management
        )));
    }
    if seed.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(EvolutionError::InvalidParameter(
            "seed weights must be finite and non-negative".into(),
        ));
    }
    let total = seed.iter().sum::<f64>();
    if (total - 1.0).abs() > SEED_SUM_TOLERANCE {
        return Err(EvolutionError::InvalidParameter(format!(
            "seed weights must sum to 1, got {}",
            total
        )));
    }
    Ok(())
}

/// Slot 0 holds the seed, every other slot a fresh draw from the simplex.
pub fn initialize_population<R: Rng + ?Sized>(
    seed: &[f64],
    population_size: usize,
    sampler: &SimplexSampler,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let mut population = Vec::with_capacity(population_size);
    if population_size == 0 {
        return population;
    }
    population.push(seed.to_vec());
    population.extend((1..population_size).map(|_| sampler.sample(&mut *rng)));
    population
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvolutionStatus {
    Running,
    /// Stagnation limit reached.
    Converged,
    /// Generation cap reached.
    Exhausted,
    /// Stopped from outside between two generations.
    Cancelled,
}

/// Recoverable events that happened during a run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EvolutionDiagnostics {
    /// Candidates replaced by the uniform allocation because they could not be rescaled.
    pub degenerate_allocation_fallbacks: usize,
    /// Tournament size after clamping to the population size.
    pub tournament_size_used: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EvolutionResult {
    pub best_portfolio: Portfolio,
    /// `(generation, best-known fitness)` after each generation.
    pub convergence_trace: Vec<(usize, f64)>,
    pub average_fitness_per_generation: Vec<f64>,
    pub status: EvolutionStatus,
    pub generations_run: usize,
    /// Seed of the run's random generator; pass it back as `global_seed` to replay.
    pub seed: u64,
    pub diagnostics: EvolutionDiagnostics,
}

/// What an observer sees once per generation, right after fitness evaluation
/// and the best-known update.
#[derive(Debug)]
pub struct GenerationReport<'a> {
    pub generation: usize,
    pub population: &'a [Vec<f64>],
    pub fitness: &'a [f64],
    pub best_known: &'a Portfolio,
    pub generations_without_improvement: usize,
}

pub trait EvolutionObserver {
    fn on_generation(&mut self, report: &GenerationReport<'_>);
}

impl<F> EvolutionObserver for F
where
    F: FnMut(&GenerationReport<'_>),
{
    fn on_generation(&mut self, report: &GenerationReport<'_>) {
        self(report)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl EvolutionObserver for NoopObserver {
    fn on_generation(&mut self, _report: &GenerationReport<'_>) {}
}

/// External stop signals, checked between generations.
#[derive(Debug, Default, Clone)]
pub struct RunControl {
    running: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// The run stops once `running` is set to false.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_time_limit(self, time_limit: Duration) -> Self {
        self.with_deadline(Instant::now() + time_limit)
    }

    pub fn should_stop(&self) -> bool {
        let cancelled = self
            .running
            .as_ref()
            .is_some_and(|running| !running.load(Ordering::Relaxed));
        let timed_out = self
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline);
        cancelled || timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::seeded_rng;

    fn config() -> EvolutionConfig {
        EvolutionConfig::new(0.02)
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.population_size, 100);
        assert_eq!(config.generations, 100);
        assert!(config.use_elitism);
        assert_eq!(config.mutation_rate, 0.05);
        assert_eq!(config.stagnation_limit, 20);
        assert_eq!(config.allocation_cap, 0.25);
        assert_eq!(config.tournament_size, 3);
        assert_eq!(config.min_portfolio_risk, 0.01);
        assert!(config.validate(4).is_ok());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: EvolutionConfig =
            serde_json::from_str(r#"{ "risk_free_rate": 0.1075, "mutation_rate": 0.1 }"#).unwrap();
        assert_eq!(config.risk_free_rate, 0.1075);
        assert_eq!(config.mutation_rate, 0.1);
        assert_eq!(config.population_size, 100);
        assert!(config.global_seed.is_none());
    }

    #[test]
    fn test_validate_population_size() {
        for population_size in [0, 1, 7, 99] {
            let config = EvolutionConfig {
                population_size,
                ..config()
            };
            assert!(
                matches!(
                    config.validate(4),
                    Err(EvolutionError::InvalidPopulationSize(size)) if size == population_size
                ),
                "Population size {} should be rejected",
                population_size
            );
        }
        let config = EvolutionConfig {
            population_size: 2,
            ..config()
        };
        assert!(config.validate(4).is_ok());
    }

    #[test]
    fn test_validate_parameters() {
        let bad = [
            EvolutionConfig {
                mutation_rate: 1.5,
                ..config()
            },
            EvolutionConfig {
                mutation_rate: -0.1,
                ..config()
            },
            EvolutionConfig {
                allocation_cap: 0.0,
                ..config()
            },
            EvolutionConfig {
                allocation_cap: 1.1,
                ..config()
            },
            EvolutionConfig {
                allocation_cap: 0.2,
                ..config()
            },
            EvolutionConfig {
                generations: 0,
                ..config()
            },
            EvolutionConfig {
                stagnation_limit: 0,
                ..config()
            },
            EvolutionConfig {
                min_portfolio_risk: 0.0,
                ..config()
            },
        ];
        for config in bad.iter() {
            assert!(
                matches!(config.validate(4), Err(EvolutionError::InvalidParameter(_))),
                "{:?} should be rejected",
                config
            );
        }
        assert!(matches!(
            config().validate(1),
            Err(EvolutionError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_validate_seed() {
        assert!(validate_seed(&[0.5, 0.5], 2).is_ok());
        assert!(validate_seed(&[0.25; 4], 4).is_ok());
        // above any reasonable cap, still a point of the simplex
        assert!(validate_seed(&[0.7, 0.1, 0.1, 0.1], 4).is_ok());
        assert!(matches!(
            validate_seed(&[0.5, 0.5], 3),
            Err(EvolutionError::InvalidDimensions(_))
        ));
        assert!(matches!(
            validate_seed(&[1.5, -0.5], 2),
            Err(EvolutionError::InvalidParameter(_))
        ));
        assert!(matches!(
            validate_seed(&[0.3, 0.3], 2),
            Err(EvolutionError::InvalidParameter(_))
        ));
        assert!(matches!(
            validate_seed(&[f64::NAN, 0.5], 2),
            Err(EvolutionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_initialize_population_keeps_seed_first() {
        let (mut rng, _) = seeded_rng(Some(3));
        let sampler = SimplexSampler::new(4).unwrap();
        let seed = vec![0.25; 4];
        let population = initialize_population(&seed, 10, &sampler, &mut rng);

        assert_eq!(population.len(), 10);
        assert_eq!(population[0], seed);
        for weights in population.iter() {
            assert_eq!(weights.len(), 4);
            let sum: f64 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "Weights should sum to 1. Got {}", sum);
        }
    }

    #[test]
    fn test_run_control() {
        assert!(!RunControl::new().should_stop());

        let running = Arc::new(AtomicBool::new(true));
        let control = RunControl::new().with_running_flag(running.clone());
        assert!(!control.should_stop());
        running.store(false, Ordering::Relaxed);
        assert!(control.should_stop());

        let expired = RunControl::new().with_deadline(Instant::now());
        assert!(expired.should_stop());
        let later = RunControl::new().with_time_limit(Duration::from_secs(3600));
        assert!(!later.should_stop());
    }
}
