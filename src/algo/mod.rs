//! Geometry processing algorithms.
//!
//! - **Operators**: gradient, mass, cotangent and graph Laplacian matrices
//! - **Smoothing**: iterated averaging and implicit Euler Laplacian smoothing
//! - **Deformation**: gradient- and Laplacian-domain brushes, handle-based
//!   least-squares deformation
//! - **Registration**: Iterative Closest Point with pluggable sampling,
//!   rejection, weighting and minimization policies
//!
//! All of them work on [`MeshSnapshot`](crate::mesh::MeshSnapshot) values and
//! return new positions or transforms rather than mutating the input.

pub mod deform;
pub mod operators;
pub mod registration;
pub mod smooth;
pub mod sparse;
