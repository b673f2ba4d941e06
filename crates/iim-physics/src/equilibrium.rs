// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Equilibrium Solver
// ─────────────────────────────────────────────────────────────────────
//! Self-consistent mean-field magnetisation:
//!
//!   m_i = tanh(β · (Σ_j A_ij m_j + f_i))
//!
//! solved by Steffensen-accelerated fixed-point iteration
//! (Burden & Faires, Numerical Analysis 9th ed., p. 107):
//!
//!   m1 = M(m0),  m2 = M(m1)
//!   m_acc = m0 − (m1 − m0)² / (m0 + m2 − 2·m1)
//!
//! If any component of the denominator is exactly zero the whole
//! vector falls back to m1.
//!
//! A solve converges when the means of m1 and m_acc agree within `tol`
//! and every component of m_acc satisfies the self-consistency equation
//! within `tol`. Under `Rebind` the next pass starts from whichever of
//! m_acc and m2 has the smaller self-consistency residual.

use serde::{Deserialize, Serialize};

use iim_types::{IimConfig, IimError, IimResult, SteffensenUpdate};

use crate::graph::Graph;

/// Result of one equilibrium solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equilibrium {
    /// Magnetisation per node, each in [-1, 1].
    pub magnetisation: Vec<f64>,
    /// Steffensen passes consumed.
    pub iterations: usize,
    /// False if the pass budget ran out; `magnetisation` is then the last m1.
    pub converged: bool,
}

/// Arithmetic mean, 0.0 for an empty slice.
#[inline]
pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Max-norm distance between m and tanh(β·(A·m + f)).
pub fn self_consistency_residual(graph: &Graph, beta: f64, field: &[f64], m: &[f64]) -> f64 {
    (0..graph.node_count())
        .map(|i| {
            let spin_field: f64 = graph.row(i).iter().zip(m).map(|(a, mj)| a * mj).sum();
            (m[i] - (beta * (spin_field + field[i])).tanh()).abs()
        })
        .fold(0.0, f64::max)
}

/// Steffensen fixed-point solver for the mean-field equation.
#[derive(Debug, Clone)]
pub struct EquilibriumSolver {
    pub max_iter: usize,
    pub tol: f64,
    /// γ in m' = (1-γ)·m + γ·tanh(...). 1.0 means undamped.
    pub damping: f64,
    pub update: SteffensenUpdate,
}

impl EquilibriumSolver {
    pub fn new(max_iter: usize, tol: f64, damping: f64, update: SteffensenUpdate) -> Self {
        Self {
            max_iter,
            tol,
            damping,
            update,
        }
    }

    pub fn from_config(cfg: &IimConfig) -> Self {
        Self::new(
            cfg.fixed_point_iter,
            cfg.fp_tol_fac,
            cfg.damping,
            cfg.steffensen_update,
        )
    }

    /// Default: 50000 passes, tol = 1e-6, undamped, rebinding.
    pub fn default_params() -> Self {
        Self::new(50_000, 1e-6, 1.0, SteffensenUpdate::Rebind)
    }

    /// One application of the magnetisation map, written into `out`.
    pub fn magnetisation_map(
        &self,
        graph: &Graph,
        beta: f64,
        field: &[f64],
        m: &[f64],
        out: &mut [f64],
    ) {
        let gamma = self.damping;
        for (i, next) in out.iter_mut().enumerate() {
            let spin_field: f64 = graph.row(i).iter().zip(m).map(|(a, mj)| a * mj).sum();
            let term = (beta * (spin_field + field[i])).tanh();
            *next = (1.0 - gamma) * m[i] + gamma * term;
        }
    }

    fn validate(&self, graph: &Graph, beta: f64, field: &[f64], m0: &[f64]) -> IimResult<()> {
        let n = graph.node_count();
        if !(beta.is_finite() && beta > 0.0) {
            return Err(IimError::Validation(format!(
                "beta must be finite and > 0, got {beta}"
            )));
        }
        if field.len() != n {
            return Err(IimError::Validation(format!(
                "field length {} does not match {n} nodes",
                field.len()
            )));
        }
        if m0.len() != n {
            return Err(IimError::Validation(format!(
                "initial magnetisation length {} does not match {n} nodes",
                m0.len()
            )));
        }
        if field.iter().chain(m0).any(|v| !v.is_finite()) {
            return Err(IimError::Numerical(
                "field or initial magnetisation contains NaN or Inf".to_string(),
            ));
        }
        Ok(())
    }

    /// Solve for the equilibrium magnetisation starting from `m0`.
    ///
    /// Running out of passes is not an error: a warning is logged and
    /// the last plain iterate m1 is returned with `converged = false`.
    pub fn solve(
        &self,
        graph: &Graph,
        beta: f64,
        field: &[f64],
        m0: &[f64],
    ) -> IimResult<Equilibrium> {
        self.validate(graph, beta, field, m0)?;
        let n = graph.node_count();

        let mut base = m0.to_vec();
        let mut m1 = vec![0.0; n];
        let mut m2 = vec![0.0; n];
        let mut acc = vec![0.0; n];
        let mut passes = 0;

        while passes < self.max_iter {
            passes += 1;
            self.magnetisation_map(graph, beta, field, &base, &mut m1);
            self.magnetisation_map(graph, beta, field, &m1, &mut m2);

            let accelerate = (0..n).all(|i| base[i] + m2[i] - 2.0 * m1[i] != 0.0);
            if accelerate {
                for i in 0..n {
                    let d1 = m1[i] - base[i];
                    acc[i] = base[i] - d1 * d1 / (base[i] + m2[i] - 2.0 * m1[i]);
                }
                if acc.iter().any(|v| !v.is_finite()) {
                    log::warn!("Steffensen estimate not finite, falling back to plain iterate");
                    acc.copy_from_slice(&m1);
                }
            } else {
                acc.copy_from_slice(&m1);
            }
            for v in acc.iter_mut() {
                *v = v.clamp(-1.0, 1.0);
            }

            let acc_residual = self_consistency_residual(graph, beta, field, &acc);
            if (mean(&m1) - mean(&acc)).abs() < self.tol && acc_residual < self.tol {
                log::trace!("equilibrium converged after {passes} passes");
                return Ok(Equilibrium {
                    magnetisation: acc,
                    iterations: passes,
                    converged: true,
                });
            }

            match self.update {
                SteffensenUpdate::Rebind => {
                    if acc_residual <= self_consistency_residual(graph, beta, field, &m2) {
                        base.copy_from_slice(&acc);
                    } else {
                        base.copy_from_slice(&m2);
                    }
                }
                // Base never moves, so every later pass repeats this one.
                SteffensenUpdate::FixedBase => break,
            }
        }

        log::warn!(
            "Failed to solve self-consistency equation after {passes} passes; \
             consider increasing fixed_point_iter"
        );
        Ok(Equilibrium {
            magnetisation: m1,
            iterations: passes,
            converged: false,
        })
    }
}
