//! Point-pair weights for point-to-point minimization.

use super::rejection::median;
use super::{PointPair, WeightingStrategy};

/// Weighting state carried across the iterations of one registration run.
///
/// [`WeightingStrategy::Distance`] tracks the largest pair distance seen so
/// far and [`WeightingStrategy::Welsch`] anneals its scale `ν`; both are
/// cleared by [`PairWeighting::reset`] at the start of every run.
#[derive(Debug, Clone)]
pub struct PairWeighting {
    strategy: WeightingStrategy,
    nu_min: f64,
    max_observed_distance: f64,
    nu: Option<f64>,
}

impl PairWeighting {
    /// New weighting state. `nu_min` floors the Welsch scale.
    pub fn new(strategy: WeightingStrategy, nu_min: f64) -> Self {
        Self {
            strategy,
            nu_min,
            max_observed_distance: 0.0,
            nu: None,
        }
    }

    /// Forget the distance maximum and the Welsch schedule.
    pub fn reset(&mut self) {
        self.max_observed_distance = 0.0;
        self.nu = None;
    }

    /// Current Welsch scale, if one has been set.
    pub fn nu(&self) -> Option<f64> {
        self.nu
    }

    /// Largest pair distance seen since the last reset.
    pub fn max_observed_distance(&self) -> f64 {
        self.max_observed_distance
    }

    /// Weights for one iteration's pairs, all in `[0, 1]`.
    ///
    /// Distance weights fall back to uniform when every pair lies at the
    /// running maximum, since they would all be zero.
    ///
    /// Pair distances are residuals under the transform estimated so far,
    /// because samples are taken in world space.
    pub fn weights(&mut self, pairs: &[PointPair]) -> Vec<f64> {
        match self.strategy {
            WeightingStrategy::None => vec![1.0; pairs.len()],
            WeightingStrategy::NormalSimilarity => pairs
                .iter()
                .map(|p| p.normal_agreement().clamp(0.0, 1.0))
                .collect(),
            WeightingStrategy::Distance => {
                let iteration_max = pairs.iter().map(|p| p.distance).fold(0.0, f64::max);
                self.max_observed_distance = self.max_observed_distance.max(iteration_max);
                let max = self.max_observed_distance;
                let weights: Vec<f64> = pairs
                    .iter()
                    .map(|p| if max > 0.0 { 1.0 - p.distance / max } else { 1.0 })
                    .collect();
                // Every pair sits at the maximum (a single pair, or a uniform offset)
                if weights.iter().all(|&w| w <= 0.0) {
                    vec![1.0; pairs.len()]
                } else {
                    weights
                }
            }
            WeightingStrategy::Welsch => {
                let nu = self.next_nu(pairs);
                let scale = 2.0 * nu * nu;
                pairs.iter().map(|p| (-p.distance / scale).exp()).collect()
            }
        }
    }

    /// `3 * median` on first use, then halved every call, never below `nu_min`.
    fn next_nu(&mut self, pairs: &[PointPair]) -> f64 {
        let nu = match self.nu {
            Some(nu) => 0.5 * nu,
            None => {
                let distances: Vec<f64> = pairs.iter().map(|p| p.distance).collect();
                3.0 * median(&distances).unwrap_or(0.0)
            }
        }
        .max(self.nu_min);
        self.nu = Some(nu);
        nu
    }
}
