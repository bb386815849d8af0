use crate::consts::DEFAULT_MONEY_TO_INVEST;
use crate::evolution::portfolio_evolution::{
    EvolutionConfig, EvolutionError, NoopObserver, RunControl,
};
use crate::evolution::{optimize_with, OptimizationOutcome};
use crate::portfolio::AllocationLine;
use crate::sampling::{seeded_rng, SimplexSampler};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_money_to_invest() -> f64 {
    DEFAULT_MONEY_TO_INVEST
}

/// A full optimization job as read from JSON: asset figures, an optional seed
/// allocation and the run parameters inline.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OptimizationRequest {
    pub returns: Vec<f64>,
    pub risks: Vec<f64>,
    #[serde(default)]
    pub seed: Option<Vec<f64>>,
    #[serde(default)]
    pub asset_names: Option<Vec<String>>,
    #[serde(default = "default_money_to_invest")]
    pub money_to_invest: f64,
    #[serde(flatten)]
    pub config: EvolutionConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OptimizationReport {
    #[serde(flatten)]
    pub outcome: OptimizationOutcome,
    pub seed_allocation: Vec<f64>,
    /// Largest allocation first.
    pub allocation: Vec<AllocationLine>,
}

pub fn handle_optimization_request(
    request: &OptimizationRequest,
    control: RunControl,
) -> Result<OptimizationReport, EvolutionError> {
    let mut config = request.config.clone();

    // Initialize or load the seed allocation
    let seed_allocation = match &request.seed {
        Some(seed) => seed.clone(),
        None => {
            let sampler = SimplexSampler::new(request.returns.len())?;
            let (mut rng, _) = seeded_rng(config.global_seed);
            let drawn = sampler.sample(&mut rng);
            // keep the whole request replayable from one seed
            config.global_seed = Some(rng.gen());
            info!("No seed allocation given, drew one from the simplex.");
            drawn
        }
    };

    let outcome = optimize_with(
        &request.returns,
        &request.risks,
        &seed_allocation,
        &config,
        control,
        &mut NoopObserver,
    )?;
    let allocation = outcome.breakdown(request.money_to_invest, request.asset_names.as_deref());

    Ok(OptimizationReport {
        outcome,
        seed_allocation,
        allocation,
    })
}
