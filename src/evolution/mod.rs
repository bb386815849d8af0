use crate::portfolio::{allocation_breakdown, AllocationLine, AssetStatistics, PortfolioPerformance};
use objective::SharpeRatio;
use portfolio_evolution::standard::EvolutionStrategy;
use portfolio_evolution::{
    EvolutionConfig, EvolutionError, EvolutionObserver, EvolutionResult, NoopObserver,
    RunControl, StandardEvolution,
};
use serde::{Deserialize, Serialize};

pub mod objective;
pub mod portfolio_evolution;

/// Result of a Sharpe-ratio search: the evolution result plus the return and
/// risk of the best allocation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OptimizationOutcome {
    #[serde(flatten)]
    pub evolution: EvolutionResult,
    pub performance: PortfolioPerformance,
}

impl OptimizationOutcome {
    pub fn best_allocation(&self) -> &[f64] {
        &self.evolution.best_portfolio.weights
    }

    pub fn best_fitness(&self) -> f64 {
        self.evolution.best_portfolio.fitness
    }

    pub fn trace(&self) -> &[(usize, f64)] {
        &self.evolution.convergence_trace
    }

    pub fn breakdown(
        &self,
        money_to_invest: f64,
        asset_names: Option<&[String]>,
    ) -> Vec<AllocationLine> {
        allocation_breakdown(self.best_allocation(), money_to_invest, asset_names)
    }
}

/// Searches for the allocation with the highest Sharpe ratio.
///
/// `returns`, `risks` and `seed` must have the same length (at least 2) and
/// `seed` must already be a valid allocation under `config.allocation_cap`.
/// Every precondition is checked before the first generation runs.
pub fn optimize(
    returns: &[f64],
    risks: &[f64],
    seed: &[f64],
    config: &EvolutionConfig,
) -> Result<OptimizationOutcome, EvolutionError> {
    optimize_with(
        returns,
        risks,
        seed,
        config,
        RunControl::default(),
        &mut NoopObserver,
    )
}

/// [`optimize`] with external stop signals and a per-generation observer.
pub fn optimize_with<B: EvolutionObserver>(
    returns: &[f64],
    risks: &[f64],
    seed: &[f64],
    config: &EvolutionConfig,
    control: RunControl,
    observer: &mut B,
) -> Result<OptimizationOutcome, EvolutionError> {
    let statistics = AssetStatistics::new(returns.to_vec(), risks.to_vec())?;
    if seed.len() != statistics.assets_under_management() {
        return Err(EvolutionError::InvalidDimensions(format!(
            "seed has {} entries, expected {}",
            seed.len(),
            statistics.assets_under_management()
        )));
    }
    let objective = SharpeRatio::new(statistics, config.risk_free_rate)
        .with_min_portfolio_risk(config.min_portfolio_risk);

    let evolution = StandardEvolution::new(config.clone())
        .with_control(control)
        .evolve(&objective, seed, observer)?;
    let performance = objective.performance(&evolution.best_portfolio.weights);

    Ok(OptimizationOutcome {
        evolution,
        performance,
    })
}
