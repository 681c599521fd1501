//! Policy enums selecting each ICP stage.
//!
//! Every enum parses from and displays as its upper-snake name
//! (`"RANDOM_POINT"`, `"K_MEDIAN"`, ...). Unknown names are an error.

use std::fmt;
use std::str::FromStr;

use crate::error::{MeshError, Result};

/// How points of the moving mesh are sampled each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplingStrategy {
    /// Uniform random subset of the vertices.
    #[default]
    RandomPoint,
    /// Random vertex from a randomly chosen normal bucket per slot.
    Normal,
    /// Round-robin over normal buckets.
    StratifiedNormal,
}

/// Which point pairs are discarded as outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RejectionCriterion {
    /// Drop pairs farther apart than `k` times the median distance.
    #[default]
    KMedian,
    /// Drop pairs with `1 - dot(n_p, n_q)` above a threshold.
    DissimilarNormals,
    /// Keep everything.
    None,
}

/// How point pairs are weighted in point-to-point minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WeightingStrategy {
    /// Uniform weights.
    #[default]
    None,
    /// Dot product of the pair's normals.
    NormalSimilarity,
    /// `1 - d / d_max` (Godin 1994).
    Distance,
    /// Welsch M-estimator with an annealed scale.
    Welsch,
}

/// Distance used to match a sample to its closest fixed-mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DistanceMetric {
    /// Plain Euclidean distance.
    #[default]
    Euclidean,
    /// Euclidean distance scaled by `2 - dot(n_a, n_b)`, with the dot product
    /// clamped to `[-1, 1]`.
    ///
    /// This differs from the plain `dot × distance` weighting: the product
    /// turns negative for opposing normals, which would let a wrong match
    /// beat every real one and breaks k-d tree pruning. The scaled form is
    /// never below the Euclidean distance, equals it for agreeing normals and
    /// grows to three times it for opposing ones.
    NormalWeighted,
}

/// Error function minimized per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Minimization {
    /// Sum of squared point distances (weighted Kabsch).
    #[default]
    PointToPoint,
    /// Sum of squared distances to the target tangent planes.
    PointToPlane,
}

impl SamplingStrategy {
    /// Upper-snake name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomPoint => "RANDOM_POINT",
            Self::Normal => "NORMAL",
            Self::StratifiedNormal => "STRATIFIED_NORMAL",
        }
    }
}

impl FromStr for SamplingStrategy {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RANDOM_POINT" => Ok(Self::RandomPoint),
            "NORMAL" => Ok(Self::Normal),
            "STRATIFIED_NORMAL" => Ok(Self::StratifiedNormal),
            _ => Err(MeshError::unknown_strategy("sampling strategy", s)),
        }
    }
}

impl RejectionCriterion {
    /// Upper-snake name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KMedian => "K_MEDIAN",
            Self::DissimilarNormals => "DISSIMILAR_NORMALS",
            Self::None => "NONE",
        }
    }
}

impl FromStr for RejectionCriterion {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "K_MEDIAN" => Ok(Self::KMedian),
            "DISSIMILAR_NORMALS" => Ok(Self::DissimilarNormals),
            "NONE" => Ok(Self::None),
            _ => Err(MeshError::unknown_strategy("rejection criterion", s)),
        }
    }
}

impl WeightingStrategy {
    /// Upper-snake name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::NormalSimilarity => "NORMAL_SIMILARITY",
            Self::Distance => "DISTANCE",
            Self::Welsch => "WELSCH",
        }
    }
}

impl FromStr for WeightingStrategy {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NONE" => Ok(Self::None),
            "NORMAL_SIMILARITY" => Ok(Self::NormalSimilarity),
            "DISTANCE" => Ok(Self::Distance),
            "WELSCH" => Ok(Self::Welsch),
            _ => Err(MeshError::unknown_strategy("weighting strategy", s)),
        }
    }
}

impl DistanceMetric {
    /// Upper-snake name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Euclidean => "EUCLIDEAN",
            Self::NormalWeighted => "NORMAL_WEIGHTED",
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EUCLIDEAN" => Ok(Self::Euclidean),
            "NORMAL_WEIGHTED" => Ok(Self::NormalWeighted),
            _ => Err(MeshError::unknown_strategy("distance metric", s)),
        }
    }
}

impl Minimization {
    /// Upper-snake name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointToPoint => "POINT_TO_POINT",
            Self::PointToPlane => "POINT_TO_PLANE",
        }
    }
}

impl FromStr for Minimization {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "POINT_TO_POINT" => Ok(Self::PointToPoint),
            "POINT_TO_PLANE" => Ok(Self::PointToPlane),
            _ => Err(MeshError::unknown_strategy("minimization", s)),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(
    SamplingStrategy,
    RejectionCriterion,
    WeightingStrategy,
    DistanceMetric,
    Minimization
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for s in [
            SamplingStrategy::RandomPoint,
            SamplingStrategy::Normal,
            SamplingStrategy::StratifiedNormal,
        ] {
            assert_eq!(s.to_string().parse::<SamplingStrategy>().unwrap(), s);
        }
        for r in [
            RejectionCriterion::KMedian,
            RejectionCriterion::DissimilarNormals,
            RejectionCriterion::None,
        ] {
            assert_eq!(r.to_string().parse::<RejectionCriterion>().unwrap(), r);
        }
        for w in [
            WeightingStrategy::None,
            WeightingStrategy::NormalSimilarity,
            WeightingStrategy::Distance,
            WeightingStrategy::Welsch,
        ] {
            assert_eq!(w.to_string().parse::<WeightingStrategy>().unwrap(), w);
        }
        assert_eq!(
            "NORMAL_WEIGHTED".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::NormalWeighted
        );
        assert_eq!("POINT_TO_PLANE".parse::<Minimization>().unwrap(), Minimization::PointToPlane);
    }

    #[test]
    fn test_unknown_names_are_errors() {
        assert!(matches!(
            "random_point".parse::<SamplingStrategy>(),
            Err(MeshError::UnknownStrategy { kind: "sampling strategy", .. })
        ));
        assert!("MEDIAN".parse::<RejectionCriterion>().is_err());
        assert!("HUBER".parse::<WeightingStrategy>().is_err());
        assert!("MANHATTAN".parse::<DistanceMetric>().is_err());
        assert!("".parse::<Minimization>().is_err());
    }
}
