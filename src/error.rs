//! Error types for tessera.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no vertices or no faces where some are required.
    #[error("mesh is empty")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices (degenerate triangle).
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A face is not a triangle.
    #[error("face {face} has {sides} sides, only triangles are supported")]
    NonTriangularFace {
        /// The face index.
        face: usize,
        /// Number of corners of the offending face.
        sides: usize,
    },

    /// A face has zero area, so gradients and mass are undefined on it.
    #[error("face {face} has zero area")]
    ZeroAreaFace {
        /// The face index.
        face: usize,
    },

    /// A caller-supplied index is out of range.
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// What the index refers to ("vertex", "face", ...).
        what: &'static str,
        /// The offending index.
        index: usize,
        /// Length of the indexed collection.
        len: usize,
    },

    /// Two inputs that must have the same size do not.
    #[error("size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Description of the compared inputs.
        what: &'static str,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// A strategy name could not be parsed.
    #[error("unknown {kind} '{value}'")]
    UnknownStrategy {
        /// The kind of strategy ("sampling strategy", ...).
        kind: &'static str,
        /// The rejected name.
        value: String,
    },

    /// Outlier rejection left no point pairs to solve with.
    #[error("no valid point pairs")]
    NoValidPointPairs,

    /// A linear system could not be solved or factorized.
    #[error("singular system: {context}")]
    SingularSystem {
        /// Which system failed.
        context: &'static str,
    },

    /// A computation produced NaN or infinity.
    #[error("non-finite value in {context}")]
    NonFiniteValue {
        /// Where the value appeared.
        context: &'static str,
    },

    /// Algorithm failed to converge.
    #[error("algorithm failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create an unknown strategy error.
    pub fn unknown_strategy(kind: &'static str, value: &str) -> Self {
        MeshError::UnknownStrategy {
            kind,
            value: value.to_string(),
        }
    }
}

/// Checks that `index < len`, reporting `what` on failure.
pub(crate) fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(MeshError::IndexOutOfRange { what, index, len })
    }
}
