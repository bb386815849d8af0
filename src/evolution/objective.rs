use crate::consts::DEFAULT_MIN_PORTFOLIO_RISK;
use crate::portfolio::{compute_portfolio_performance, AssetStatistics, PortfolioPerformance};

/// Scalar fitness of an allocation; higher is better.
///
/// Implementations must be pure: the evolution loop evaluates a whole
/// generation in parallel and relies on identical inputs giving identical
/// outputs for replay.
pub trait OptimizationObjective: Send + Sync {
    fn compute(&self, weights: &[f64]) -> f64;
}

impl<F> OptimizationObjective for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn compute(&self, weights: &[f64]) -> f64 {
        self(weights)
    }
}

#[derive(Debug, Clone)]
pub struct SharpeRatio {
    statistics: AssetStatistics,
    risk_free_rate: f64,
    min_portfolio_risk: f64,
}

impl SharpeRatio {
    pub fn new(statistics: AssetStatistics, risk_free_rate: f64) -> Self {
        SharpeRatio {
            statistics,
            risk_free_rate,
            min_portfolio_risk: DEFAULT_MIN_PORTFOLIO_RISK,
        }
    }

    pub fn with_min_portfolio_risk(mut self, min_portfolio_risk: f64) -> Self {
        self.min_portfolio_risk = min_portfolio_risk;
        self
    }

    pub fn performance(&self, weights: &[f64]) -> PortfolioPerformance {
        compute_portfolio_performance(
            &self.statistics,
            weights,
            self.risk_free_rate,
            self.min_portfolio_risk,
        )
    }
}

impl OptimizationObjective for SharpeRatio {
    fn compute(&self, weights: &[f64]) -> f64 {
        self.performance(weights).sharpe_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharpe_ratio_of_equal_weights() {
        let statistics =
            AssetStatistics::new(vec![0.10, 0.05, 0.20], vec![0.15, 0.05, 0.30]).unwrap();
        let objective = SharpeRatio::new(statistics, 0.02);
        let third = 1. / 3.;
        let weights = [third, third, third];

        let expected = (0.35 / 3. - 0.02) / (0.115_f64 / 3.).sqrt();
        let fitness = objective.compute(&weights);
        assert!((fitness - expected).abs() < 1e-12, "Got {}", fitness);
        // pure: same input, same output
        assert_eq!(fitness, objective.compute(&weights));
    }

    #[test]
    fn test_configurable_risk_floor() {
        let statistics = AssetStatistics::new(vec![0.03, 0.03], vec![0.001, 0.001]).unwrap();
        let default_floor = SharpeRatio::new(statistics.clone(), 0.01);
        let higher_floor = SharpeRatio::new(statistics, 0.01).with_min_portfolio_risk(0.1);

        assert!((default_floor.compute(&[0.5, 0.5]) - 2.0).abs() < 1e-9);
        assert!((higher_floor.compute(&[0.5, 0.5]) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_closures_are_objectives() {
        let first_weight = |weights: &[f64]| weights[0];
        assert_eq!(first_weight.compute(&[0.7, 0.3]), 0.7);
    }
}
