// Modules
pub mod consts;
pub mod evolution;
pub mod handlers;
pub mod portfolio;
pub mod sampling;

pub use evolution::objective::{OptimizationObjective, SharpeRatio};
pub use evolution::portfolio_evolution::{
    EvolutionConfig, EvolutionError, EvolutionResult, EvolutionStatus, RunControl,
};
pub use evolution::{optimize, optimize_with, OptimizationOutcome};
pub use portfolio::{AssetStatistics, Portfolio, PortfolioPerformance};
