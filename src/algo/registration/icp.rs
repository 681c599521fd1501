//! The ICP iteration loop.

use std::time::{Duration, Instant};

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{
    point_to_plane, point_to_point, reject_pairs, sample_indices, DistanceMetric, FixedIndex,
    Minimization, OrientedPoint, PairWeighting, RejectionCriterion, RigidTransform,
    SamplingStrategy, WeightingStrategy,
};
use crate::error::{MeshError, Result};
use crate::mesh::MeshSnapshot;

/// Options for ICP registration.
#[derive(Debug, Clone)]
pub struct IcpOptions {
    /// Maximum number of iterations (at least 1).
    pub max_iterations: usize,

    /// Convergence threshold: the run stops once an iteration's increment has
    /// `‖t‖ <= epsilon` and every rotation entry within `epsilon` of identity.
    pub epsilon: f64,

    /// Maximum number of moving-mesh vertices sampled per iteration.
    pub max_points: usize,

    /// How samples are drawn.
    pub sampling: SamplingStrategy,

    /// Metric used for closest-point matching.
    pub metric: DistanceMetric,

    /// Outlier rejection policy.
    pub rejection: RejectionCriterion,

    /// Factor for [`RejectionCriterion::KMedian`] (at least 1).
    pub k: f64,

    /// Threshold on `1 - dot(n_p, n_q)` for
    /// [`RejectionCriterion::DissimilarNormals`], in `[0, 2]`. Zero keeps only
    /// pairs with identical normals. Ignored by the other criteria.
    pub normal_dissimilarity_threshold: f64,

    /// Pair weighting, used by point-to-point minimization only.
    pub weighting: WeightingStrategy,

    /// Floor for the Welsch scale.
    pub nu_min: f64,

    /// Error function minimized each iteration.
    pub minimization: Minimization,

    /// World transform of the moving mesh before the first iteration.
    pub initial_transform: RigidTransform,

    /// Seed for the sampling generator. `None` draws one from the OS.
    pub seed: Option<u64>,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for IcpOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            epsilon: 0.01,
            max_points: 1000,
            sampling: SamplingStrategy::default(),
            metric: DistanceMetric::default(),
            rejection: RejectionCriterion::default(),
            k: 2.5,
            normal_dissimilarity_threshold: 0.5,
            weighting: WeightingStrategy::default(),
            nu_min: 1.0,
            minimization: Minimization::default(),
            initial_transform: RigidTransform::identity(),
            seed: None,
            parallel: true,
        }
    }
}

impl IcpOptions {
    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence threshold.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the per-iteration sample budget.
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    /// Set the sampling strategy.
    pub fn with_sampling(mut self, sampling: SamplingStrategy) -> Self {
        self.sampling = sampling;
        self
    }

    /// Set the matching metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the rejection criterion.
    pub fn with_rejection(mut self, rejection: RejectionCriterion) -> Self {
        self.rejection = rejection;
        self
    }

    /// Set the k-median factor.
    pub fn with_k(mut self, k: f64) -> Self {
        self.k = k;
        self
    }

    /// Set the normal dissimilarity threshold.
    pub fn with_normal_dissimilarity_threshold(mut self, threshold: f64) -> Self {
        self.normal_dissimilarity_threshold = threshold;
        self
    }

    /// Set the weighting strategy.
    pub fn with_weighting(mut self, weighting: WeightingStrategy) -> Self {
        self.weighting = weighting;
        self
    }

    /// Set the Welsch scale floor.
    pub fn with_nu_min(mut self, nu_min: f64) -> Self {
        self.nu_min = nu_min;
        self
    }

    /// Set the minimization.
    pub fn with_minimization(mut self, minimization: Minimization) -> Self {
        self.minimization = minimization;
        self
    }

    /// Set the moving mesh's starting world transform.
    pub fn with_initial_transform(mut self, transform: RigidTransform) -> Self {
        self.initial_transform = transform;
        self
    }

    /// Seed the sampling generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(MeshError::invalid_param(
                "max_iterations",
                self.max_iterations,
                "must be at least 1",
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(MeshError::invalid_param(
                "epsilon",
                self.epsilon,
                "must be finite and non-negative",
            ));
        }
        if self.max_points == 0 {
            return Err(MeshError::invalid_param(
                "max_points",
                self.max_points,
                "must be at least 1",
            ));
        }
        if !self.k.is_finite() || self.k < 1.0 {
            return Err(MeshError::invalid_param("k", self.k, "must be finite and at least 1"));
        }
        let threshold = self.normal_dissimilarity_threshold;
        if self.rejection == RejectionCriterion::DissimilarNormals
            && !(0.0..=2.0).contains(&threshold)
        {
            return Err(MeshError::invalid_param(
                "normal_dissimilarity_threshold",
                threshold,
                "must lie in [0, 2]",
            ));
        }
        if !self.nu_min.is_finite() || self.nu_min <= 0.0 {
            return Err(MeshError::invalid_param(
                "nu_min",
                self.nu_min,
                "must be finite and positive",
            ));
        }
        if !self.initial_transform.is_finite() {
            return Err(MeshError::NonFiniteValue {
                context: "initial transform",
            });
        }
        Ok(())
    }
}

/// Alignment error after one iteration, recorded when an evaluation target
/// is supplied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationRecord {
    /// RMSE between the moved vertices and the target vertices.
    pub error: f64,
    /// Time since the run started.
    pub elapsed: Duration,
}

/// Outcome of a registration run.
#[derive(Debug, Clone)]
pub struct IcpResult {
    /// Accumulated world transform for the moving mesh, including
    /// [`IcpOptions::initial_transform`].
    pub transform: RigidTransform,
    /// Whether an increment fell below `epsilon`.
    pub converged: bool,
    /// Iterations performed.
    pub iterations: usize,
    /// Pairs that survived rejection in the last iteration.
    pub pairs_used: usize,
    /// Per-iteration errors, empty unless a target was supplied.
    pub history: Vec<IterationRecord>,
}

impl IcpResult {
    /// The transform if the run converged.
    ///
    /// # Errors
    ///
    /// [`MeshError::ConvergenceFailed`] if `max_iterations` ran out first.
    pub fn into_converged(self) -> Result<RigidTransform> {
        if self.converged {
            Ok(self.transform)
        } else {
            Err(MeshError::ConvergenceFailed {
                iterations: self.iterations,
            })
        }
    }
}

/// Root mean square distance between corresponding points.
///
/// # Errors
///
/// [`MeshError::SizeMismatch`] if the slices differ in length,
/// [`MeshError::EmptyMesh`] if they are empty.
pub fn rmse(a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(MeshError::SizeMismatch {
            what: "rmse point sets",
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    let sum: f64 = a.iter().zip(b).map(|(p, q)| (p - q).norm_squared()).sum();
    Ok((sum / a.len() as f64).sqrt())
}

/// Reusable ICP driver.
///
/// Holds the options and the pair weighting state. The weighting state is
/// reset at the start of every run, so a solver can register many mesh pairs.
#[derive(Debug, Clone)]
pub struct IcpSolver {
    options: IcpOptions,
    weighting: PairWeighting,
}

impl IcpSolver {
    /// Create a solver.
    pub fn new(options: IcpOptions) -> Self {
        let weighting = PairWeighting::new(options.weighting, options.nu_min);
        Self { options, weighting }
    }

    /// The solver's options.
    pub fn options(&self) -> &IcpOptions {
        &self.options
    }

    /// Weighting state as left by the last run.
    pub fn weighting(&self) -> &PairWeighting {
        &self.weighting
    }

    /// Register `moving` onto `fixed`.
    ///
    /// # Errors
    ///
    /// Invalid options, an empty mesh, an iteration where rejection leaves no
    /// pairs, or a failed transform solve. A failed iteration aborts the run.
    pub fn register(&mut self, moving: &MeshSnapshot, fixed: &MeshSnapshot) -> Result<IcpResult> {
        self.run(moving, fixed, None)
    }

    /// Like [`register`](Self::register), recording after every iteration the
    /// RMSE between the moved vertices of `moving` and the vertices of
    /// `target`, which must correspond one to one.
    pub fn register_with_target(
        &mut self,
        moving: &MeshSnapshot,
        fixed: &MeshSnapshot,
        target: &MeshSnapshot,
    ) -> Result<IcpResult> {
        if target.num_vertices() != moving.num_vertices() {
            return Err(MeshError::SizeMismatch {
                what: "evaluation target vertices",
                expected: moving.num_vertices(),
                actual: target.num_vertices(),
            });
        }
        self.run(moving, fixed, Some(target))
    }

    fn run(
        &mut self,
        moving: &MeshSnapshot,
        fixed: &MeshSnapshot,
        target: Option<&MeshSnapshot>,
    ) -> Result<IcpResult> {
        let options = &self.options;
        options.validate()?;
        if moving.num_vertices() == 0 || fixed.num_vertices() == 0 {
            return Err(MeshError::EmptyMesh);
        }

        self.weighting = PairWeighting::new(options.weighting, options.nu_min);
        let index = FixedIndex::new(fixed, options.metric);
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let start = Instant::now();
        let mut current = options.initial_transform;
        let mut history = Vec::new();
        let mut pairs_used = 0;

        for iteration in 1..=options.max_iterations {
            let indices = sample_indices(
                moving.normals(),
                options.sampling,
                options.max_points,
                &mut rng,
            );
            let samples: Vec<(usize, OrientedPoint)> = indices
                .into_iter()
                .map(|i| {
                    let sample = OrientedPoint {
                        position: current.transform_point(moving.position(i)),
                        normal: current.transform_vector(moving.normal(i)),
                    };
                    (i, sample)
                })
                .collect();

            let pairs = index.match_all(&samples, options.parallel);
            let pairs = reject_pairs(
                pairs,
                options.rejection,
                options.k,
                options.normal_dissimilarity_threshold,
            );
            if pairs.is_empty() {
                return Err(MeshError::NoValidPointPairs);
            }

            let increment = match options.minimization {
                Minimization::PointToPoint => {
                    let weights = self.weighting.weights(&pairs);
                    point_to_point(&pairs, &weights)?
                }
                Minimization::PointToPlane => point_to_plane(&pairs)?,
            };
            if !increment.is_finite() {
                return Err(MeshError::NonFiniteValue {
                    context: "ICP increment",
                });
            }

            current = increment.compose(&current);
            pairs_used = pairs.len();

            if let Some(target) = target {
                let moved: Vec<Point3<f64>> = moving
                    .positions()
                    .iter()
                    .map(|p| current.transform_point(p))
                    .collect();
                history.push(IterationRecord {
                    error: rmse(&moved, target.positions())?,
                    elapsed: start.elapsed(),
                });
            }

            log::debug!(
                "ICP iteration {}: {} pairs, |t| = {:.3e}, rotation deviation = {:.3e}",
                iteration,
                pairs_used,
                increment.translation.norm(),
                increment.rotation_deviation()
            );

            if increment.is_near_identity(options.epsilon) {
                log::info!("ICP converged after {} iterations", iteration);
                return Ok(IcpResult {
                    transform: current,
                    converged: true,
                    iterations: iteration,
                    pairs_used,
                    history,
                });
            }
        }

        log::info!(
            "ICP stopped after {} iterations without converging",
            options.max_iterations
        );
        Ok(IcpResult {
            transform: current,
            converged: false,
            iterations: options.max_iterations,
            pairs_used,
            history,
        })
    }
}
