// Tolerances
pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-9;
/// How far a seed vector may drift from summing to one before it is rejected.
pub const SEED_SUM_TOLERANCE: f64 = 1e-6;

// Operators
pub const PERTURBATION: f64 = 0.1;
pub const MAX_CUT_POINTS: usize = 3;
pub const DEFAULT_TOURNAMENT_SIZE: usize = 3;

// Run defaults
pub const DEFAULT_POPULATION_SIZE: usize = 100;
pub const DEFAULT_GENERATIONS: usize = 100;
pub const DEFAULT_MUTATION_RATE: f64 = 0.05;
pub const DEFAULT_STAGNATION_LIMIT: usize = 20;
pub const DEFAULT_ALLOCATION_CAP: f64 = 0.25;
/// Floor applied to portfolio risk before dividing by it.
pub const DEFAULT_MIN_PORTFOLIO_RISK: f64 = 0.01;

// Reporting
pub const DEFAULT_MONEY_TO_INVEST: f64 = 100_000.0;
