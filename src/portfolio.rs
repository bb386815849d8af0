use crate::evolution::portfolio_evolution::EvolutionError;
use itertools::izip;
use serde::{Deserialize, Serialize};

/// Expected return and risk (volatility) per asset.
///
/// Both sequences have the same length and hold only finite values, which is
/// checked once here so that every later computation can index them freely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetStatistics {
    returns: Vec<f64>,
    risks: Vec<f64>,
}

impl AssetStatistics {
    pub fn new(returns: Vec<f64>, risks: Vec<f64>) -> Result<Self, EvolutionError> {
        if returns.len() != risks.len() {
            return Err(EvolutionError::InvalidDimensions(format!(
                "returns has {} entries but risks has {}",
                returns.len(),
                risks.len()
            )));
        }
        if returns.len() < 2 {
            return Err(EvolutionError::InvalidDimensions(format!(
                "at least 2 assets are needed, got {}",
                returns.len()
            )));
        }
        if returns.iter().chain(risks.iter()).any(|x| !x.is_finite()) {
            return Err(EvolutionError::InvalidParameter(
                "returns and risks must be finite".into(),
            ));
        }
        Ok(AssetStatistics { returns, risks })
    }

    pub fn assets_under_management(&self) -> usize {
        self.returns.len()
    }
}

/// A candidate allocation together with its fitness.
///
/// `generation` is the generation in which the allocation was found, `None`
/// when it is the caller supplied seed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub weights: Vec<f64>,
    pub fitness: f64,
    pub generation: Option<usize>,
}

impl Portfolio {
    pub fn new(weights: Vec<f64>, fitness: f64, generation: Option<usize>) -> Self {
        Portfolio {
            weights,
            fitness,
            generation,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PortfolioPerformance {
    pub expected_return: f64,
    /// Risk after the floor was applied.
    pub risk: f64,
    pub sharpe_ratio: f64,
}

/// Portfolio return is `w·r`, portfolio risk is `sqrt(w·σ²)` (assets are
/// treated as uncorrelated). Risk below `min_portfolio_risk` is raised to it.
pub fn compute_portfolio_performance(
    statistics: &AssetStatistics,
    weights: &[f64],
    risk_free_rate: f64,
    min_portfolio_risk: f64,
) -> PortfolioPerformance {
    let (expected_return, variance) = izip!(weights, &statistics.returns, &statistics.risks)
        .fold((0.0, 0.0), |(ret, var), (w, r, sigma)| {
            (ret + w * r, var + w * sigma * sigma)
        });

    let risk = variance.sqrt().max(min_portfolio_risk);

    PortfolioPerformance {
        expected_return,
        risk,
        sharpe_ratio: (expected_return - risk_free_rate) / risk,
    }
}

/// One row of an allocation breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationLine {
    pub asset_index: usize,
    pub asset_name: Option<String>,
    pub allocation_percent: f64,
    pub amount_invested: f64,
}

/// Splits `money_to_invest` along `weights`, largest allocation first.
pub fn allocation_breakdown(
    weights: &[f64],
    money_to_invest: f64,
    asset_names: Option<&[String]>,
) -> Vec<AllocationLine> {
    let mut lines = weights
        .iter()
        .enumerate()
        .map(|(asset_index, &weight)| AllocationLine {
            asset_index,
            asset_name: asset_names.and_then(|names| names.get(asset_index).cloned()),
            allocation_percent: weight * 100.,
            amount_invested: weight * money_to_invest,
        })
        .collect::<Vec<_>>();

    // stable sort keeps asset order among equal weights
    lines.sort_by(|a, b| b.allocation_percent.total_cmp(&a.allocation_percent));
    lines
}
