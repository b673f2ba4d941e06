// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Susceptibility Gradient
// ─────────────────────────────────────────────────────────────────────
//! Linear-response gradient of total magnetisation w.r.t. the field:
//!
//!   D = diag(1 − m_i²)
//!   χ = β · (I − β·D·A)⁻¹ · D
//!   g_i = Σ_j χ_ij,   ĝ = g / ‖g‖₂
//!
//! Includes a pure-Rust Gauss-Jordan inverse with partial pivoting.

use iim_types::{IimError, IimResult};

use crate::graph::Graph;

/// Saturation tolerance: all m_i within this of 1.0 → zero gradient.
pub const SATURATION_TOL: f64 = 1e-5;

/// Pivot magnitude below which the matrix is treated as singular.
const PIVOT_EPS: f64 = 1e-12;

/// Invert an n×n row-major matrix by Gauss-Jordan elimination.
///
/// Fails with `IimError::Numerical` if a pivot falls below 1e-12
/// or the result is not finite.
pub fn invert_matrix(m: &[f64], n: usize) -> IimResult<Vec<f64>> {
    if m.len() != n * n {
        return Err(IimError::Validation(format!(
            "matrix length {} does not match {n}x{n}",
            m.len()
        )));
    }

    // Augmented [M | I], n × 2n row-major
    let w = 2 * n;
    let mut aug = vec![0.0; n * w];
    for i in 0..n {
        aug[i * w..i * w + n].copy_from_slice(&m[i * n..(i + 1) * n]);
        aug[i * w + n + i] = 1.0;
    }

    for col in 0..n {
        // Partial pivoting
        let mut pivot_row = col;
        let mut pivot_abs = aug[col * w + col].abs();
        for row in (col + 1)..n {
            let v = aug[row * w + col].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = row;
            }
        }
        if pivot_abs < PIVOT_EPS {
            return Err(IimError::Numerical(format!(
                "singular matrix: pivot {pivot_abs:e} in column {col}"
            )));
        }
        if pivot_row != col {
            for k in 0..w {
                aug.swap(col * w + k, pivot_row * w + k);
            }
        }

        let pivot = aug[col * w + col];
        for k in 0..w {
            aug[col * w + k] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row * w + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..w {
                aug[row * w + k] -= factor * aug[col * w + k];
            }
        }
    }

    let mut inv = vec![0.0; n * n];
    for i in 0..n {
        inv[i * n..(i + 1) * n].copy_from_slice(&aug[i * w + n..(i + 1) * w]);
    }
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(IimError::Numerical(
            "matrix inverse contains NaN or Inf".to_string(),
        ));
    }
    Ok(inv)
}

/// Unit-norm susceptibility gradient at magnetisation `m`.
///
/// Returns the zero vector at full positive saturation. A zero raw
/// gradient anywhere else is a numerical error, not a NaN.
pub fn susceptibility_gradient(graph: &Graph, beta: f64, m: &[f64]) -> IimResult<Vec<f64>> {
    let n = graph.node_count();
    if m.len() != n {
        return Err(IimError::Validation(format!(
            "magnetisation length {} does not match {n} nodes",
            m.len()
        )));
    }
    if !(beta.is_finite() && beta > 0.0) {
        return Err(IimError::Validation(format!(
            "beta must be finite and > 0, got {beta}"
        )));
    }

    if m.iter().all(|&mi| (mi - 1.0).abs() <= SATURATION_TOL) {
        return Ok(vec![0.0; n]);
    }

    let d: Vec<f64> = m.iter().map(|&mi| 1.0 - mi * mi).collect();

    // I − β·D·A
    let a = graph.adjacency();
    let mut lhs = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            lhs[i * n + j] = -beta * d[i] * a[i * n + j];
        }
        lhs[i * n + i] += 1.0;
    }
    let inv = invert_matrix(&lhs, n)?;

    // Row sums of β · inv · D
    let mut grad: Vec<f64> = (0..n)
        .map(|i| beta * (0..n).map(|j| inv[i * n + j] * d[j]).sum::<f64>())
        .collect();

    let norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
    if !norm.is_finite() {
        return Err(IimError::Numerical(
            "susceptibility gradient is not finite".to_string(),
        ));
    }
    if norm == 0.0 {
        return Err(IimError::Numerical(
            "susceptibility gradient is zero, cannot normalise".to_string(),
        ));
    }
    for g in grad.iter_mut() {
        *g /= norm;
    }
    Ok(grad)
}
