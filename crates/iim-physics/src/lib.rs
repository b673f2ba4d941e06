// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Ising Physics Engine
// (C) 2026 Mean-Field IIM contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Numerical core of the mean-field Ising influence game: adjacency
//! model, Steffensen equilibrium solver, susceptibility gradient and
//! L1-ball budget projection.
//!
//! Everything here is single-threaded and allocation-light; matrices
//! are dense n×n row-major `Vec<f64>`.

pub mod equilibrium;
pub mod graph;
pub mod projection;
pub mod susceptibility;

pub use equilibrium::{mean, self_consistency_residual, Equilibrium, EquilibriumSolver};
pub use graph::Graph;
pub use projection::{l1_norm, project_to_simplex};
pub use susceptibility::{invert_matrix, susceptibility_gradient, SATURATION_TOL};
