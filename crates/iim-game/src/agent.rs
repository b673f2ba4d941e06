// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Budget-Constrained Agent Update
// ─────────────────────────────────────────────────────────────────────
//! Projected gradient step for each agent:
//!
//!   positive:  c⁺ ← P_B⁺(c⁺ + Δ)
//!   negative:  c⁻ ← −P_B⁻(−(c⁻ − Δ))
//!
//! where P_B is the L1-ball projection and Δ is either η·g (SGD) or
//! the momentum term Δ_k = η·g + μ·Δ_{k-1} (SGDM).

use serde::{Deserialize, Serialize};

use iim_physics::project_to_simplex;
use iim_types::{IimConfig, IimError, IimResult, OptimiserType};

/// Which side of the game an update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentRole {
    /// Pushes total magnetisation up.
    Positive,
    /// Pushes total magnetisation down.
    Negative,
}

/// Momentum sequence shared by both agents for one game run.
///
/// Seeded with a single zero vector. Update call k (positive agent at
/// 2·it, negative at 2·it + 1) reads entry k and appends entry k + 1,
/// so the latest entry is always the one read next.
#[derive(Debug, Clone, Default)]
pub struct MomentumBuffer {
    changes: Vec<Vec<f64>>,
}

impl MomentumBuffer {
    pub fn seeded(n: usize) -> Self {
        Self {
            changes: vec![vec![0.0; n]],
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, k: usize) -> Option<&[f64]> {
        self.changes.get(k).map(Vec::as_slice)
    }

    pub fn entries(&self) -> &[Vec<f64>] {
        &self.changes
    }

    /// Δ = step_size·g + momentum·Δ_prev; appended and returned.
    pub fn accumulate(&mut self, grad: &[f64], step_size: f64, momentum: f64) -> IimResult<Vec<f64>> {
        let prev = self.changes.last().ok_or_else(|| {
            IimError::Validation("momentum buffer must be seeded before use".to_string())
        })?;
        if prev.len() != grad.len() {
            return Err(IimError::Validation(format!(
                "momentum length {} does not match gradient length {}",
                prev.len(),
                grad.len()
            )));
        }
        let change: Vec<f64> = grad
            .iter()
            .zip(prev)
            .map(|(g, p)| step_size * g + momentum * p)
            .collect();
        self.changes.push(change.clone());
        Ok(change)
    }
}

/// Stateless update rule; per-run state lives in `MomentumBuffer`.
#[derive(Debug, Clone)]
pub struct AgentUpdater {
    pub optimiser: OptimiserType,
    pub step_size: f64,
    pub momentum: f64,
}

impl AgentUpdater {
    pub fn new(optimiser: OptimiserType, step_size: f64, momentum: f64) -> Self {
        Self {
            optimiser,
            step_size,
            momentum,
        }
    }

    pub fn from_config(cfg: &IimConfig) -> Self {
        Self::new(cfg.optimiser_type, cfg.step_size, cfg.momentum)
    }

    /// Gradient-direction step Δ. Only `Sgdm` touches the buffer.
    pub fn step(&self, grad: &[f64], buffer: &mut MomentumBuffer) -> IimResult<Vec<f64>> {
        match self.optimiser {
            OptimiserType::Sgd => Ok(grad.iter().map(|g| self.step_size * g).collect()),
            OptimiserType::Sgdm => buffer.accumulate(grad, self.step_size, self.momentum),
        }
    }

    /// Next allocation for `role`, with L1 norm at most `budget`.
    pub fn update(
        &self,
        role: AgentRole,
        grad: &[f64],
        current: &[f64],
        budget: f64,
        buffer: &mut MomentumBuffer,
    ) -> IimResult<Vec<f64>> {
        if grad.len() != current.len() {
            return Err(IimError::Validation(format!(
                "gradient length {} does not match allocation length {}",
                grad.len(),
                current.len()
            )));
        }
        let delta = self.step(grad, buffer)?;

        match role {
            AgentRole::Positive => {
                let proposed: Vec<f64> = current.iter().zip(&delta).map(|(c, d)| c + d).collect();
                project_to_simplex(&proposed, budget)
            }
            AgentRole::Negative => {
                // Reflect into the agent's own frame, project, reflect back.
                let reflected: Vec<f64> =
                    current.iter().zip(&delta).map(|(c, d)| -(c - d)).collect();
                let projected = project_to_simplex(&reflected, budget)?;
                Ok(projected.into_iter().map(|x| -x).collect())
            }
        }
    }
}
