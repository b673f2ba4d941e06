// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Bilevel Game Loop
// ─────────────────────────────────────────────────────────────────────
//! Alternating two-agent game on the mean-field equilibrium:
//!   0. Seed c⁺ = +B⁺/N, c⁻ = −B⁻/N, solve m from the initial spins
//!   1. Positive agent: gradient at m, projected step on c⁺
//!   2. Re-solve equilibrium with (b + c⁺_new + c⁻)
//!   3. Negative agent: gradient at the new m, projected step on c⁻
//!   4. Re-solve equilibrium with (b + c⁺_new + c⁻_new)
//!   5. Stop when Σ|Δc⁺| and Σ|Δc⁻| are both within tolerance
//!   6. Log step

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use iim_physics::{
    mean, project_to_simplex, susceptibility_gradient, Equilibrium, EquilibriumSolver, Graph,
};
use iim_types::{IimConfig, IimError, IimResult, InitMag};

use crate::agent::{AgentRole, AgentUpdater, MomentumBuffer};

/// Log entry for one outer iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStepLog {
    pub step: usize,
    /// Σ|c⁺_new − c⁺_prev|.
    pub pos_diff: f64,
    /// Σ|c⁻_new − c⁻_prev|.
    pub neg_diff: f64,
    /// Mean magnetisation after the negative agent's re-solve.
    pub mean_magnetisation: f64,
    /// Steffensen passes spent in this iteration's two solves.
    pub inner_iterations: usize,
}

/// Result of `run_game`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOutcome {
    pub positive: Vec<f64>,
    pub negative: Vec<f64>,
    /// `None` when the outer loop ran out of iterations.
    pub magnetisation: Option<Vec<f64>>,
    pub iterations: usize,
    pub converged: bool,
}

/// Mean-field Ising system hosting the two-agent game.
///
/// Graph, background field and initial spins are fixed at construction.
/// Histories, the momentum buffer and the step log are reset at the
/// start of every `run_game` and grow for its duration. Not reentrant:
/// one run at a time per instance, enforced by `&mut self`.
pub struct MfIsingSystem {
    pub cfg: IimConfig,
    graph: Graph,
    background_field: Vec<f64>,
    init_mag: Vec<f64>,
    solver: EquilibriumSolver,
    agents: AgentUpdater,
    positive_history: Vec<Vec<f64>>,
    negative_history: Vec<Vec<f64>>,
    magnetisation_history: Vec<Vec<f64>>,
    momentum: MomentumBuffer,
    pub log: Vec<GameStepLog>,
}

impl MfIsingSystem {
    /// Create a system; `InitMag::Random` draws from a ChaCha8 stream
    /// seeded with `config.seed`.
    pub fn new(graph: Graph, background_field: Vec<f64>, config: IimConfig) -> IimResult<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::with_rng(graph, background_field, config, &mut rng)
    }

    /// Create a system drawing random initial spins from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        graph: Graph,
        background_field: Vec<f64>,
        config: IimConfig,
        rng: &mut R,
    ) -> IimResult<Self> {
        config.validate()?;
        let n = graph.node_count();

        if background_field.len() != n {
            return Err(IimError::Validation(format!(
                "background_field length {} does not match {n} nodes",
                background_field.len()
            )));
        }
        if background_field.iter().any(|b| !b.is_finite()) {
            return Err(IimError::Validation(
                "background_field contains NaN or Inf".to_string(),
            ));
        }

        let init_mag = match config.init_mag {
            InitMag::AlignedNeg => vec![-1.0; n],
            InitMag::AlignedPos => vec![1.0; n],
            InitMag::Random => (0..n)
                .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
                .collect(),
            InitMag::Explicit(ref m) => {
                if m.len() != n {
                    return Err(IimError::Config(format!(
                        "explicit init_mag length {} does not match {n} nodes",
                        m.len()
                    )));
                }
                m.clone()
            }
        };

        Ok(Self {
            solver: EquilibriumSolver::from_config(&config),
            agents: AgentUpdater::from_config(&config),
            graph,
            background_field,
            init_mag,
            positive_history: Vec::new(),
            negative_history: Vec::new(),
            magnetisation_history: Vec::new(),
            momentum: MomentumBuffer::default(),
            log: Vec::new(),
            cfg: config,
        })
    }

    pub fn default_params(graph: Graph, background_field: Vec<f64>) -> IimResult<Self> {
        Self::new(graph, background_field, IimConfig::default())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn background_field(&self) -> &[f64] {
        &self.background_field
    }

    /// Resolved initial spins (after `InitMag` expansion).
    pub fn init_mag(&self) -> &[f64] {
        &self.init_mag
    }

    /// Positive allocations of the last run: seed first, then one per iteration.
    pub fn positive_history(&self) -> &[Vec<f64>] {
        &self.positive_history
    }

    /// Negative allocations of the last run: seed first, then one per iteration.
    pub fn negative_history(&self) -> &[Vec<f64>] {
        &self.negative_history
    }

    /// Every equilibrium solved during the last run, in order.
    pub fn magnetisation_history(&self) -> &[Vec<f64>] {
        &self.magnetisation_history
    }

    pub fn momentum(&self) -> &MomentumBuffer {
        &self.momentum
    }

    // ------------------------------------------------------------------
    // Equilibrium
    // ------------------------------------------------------------------

    fn total_field(&self, positive: &[f64], negative: &[f64]) -> Vec<f64> {
        self.background_field
            .iter()
            .zip(positive)
            .zip(negative)
            .map(|((b, p), q)| b + p + q)
            .collect()
    }

    /// Solve the equilibrium for `field` from `m0` and record it.
    pub fn solve_equilibrium(&mut self, beta: f64, field: &[f64], m0: &[f64]) -> IimResult<Equilibrium> {
        let eq = self.solver.solve(&self.graph, beta, field, m0)?;
        self.magnetisation_history.push(eq.magnetisation.clone());
        Ok(eq)
    }

    // ------------------------------------------------------------------
    // Game
    // ------------------------------------------------------------------

    fn reset_run(&mut self, positive: &[f64], negative: &[f64]) {
        let n = self.graph.node_count();
        self.positive_history = vec![positive.to_vec()];
        self.negative_history = vec![negative.to_vec()];
        self.magnetisation_history.clear();
        self.momentum = MomentumBuffer::seeded(n);
        self.log.clear();
    }

    /// Play the game until both allocations settle or `iim_iter` runs out.
    ///
    /// Non-convergence is not an error: a warning is logged and the
    /// outcome carries `magnetisation = None`; histories stay available.
    pub fn run_game(&mut self, pos_budget: f64, neg_budget: f64, beta: f64) -> IimResult<GameOutcome> {
        for (name, b) in [("pos_budget", pos_budget), ("neg_budget", neg_budget)] {
            if !(b.is_finite() && b > 0.0) {
                return Err(IimError::Validation(format!(
                    "{name} must be finite and > 0, got {b}"
                )));
            }
        }
        if !(beta.is_finite() && beta > 0.0) {
            return Err(IimError::Validation(format!(
                "beta must be finite and > 0, got {beta}"
            )));
        }

        let n = self.graph.node_count();
        // Uniform split, projected so rounding in B/N cannot exceed B.
        let mut positive = project_to_simplex(&vec![pos_budget / n as f64; n], pos_budget)?;
        let mut negative: Vec<f64> =
            project_to_simplex(&vec![neg_budget / n as f64; n], neg_budget)?
                .into_iter()
                .map(|x| -x)
                .collect();
        self.reset_run(&positive, &negative);

        let field = self.total_field(&positive, &negative);
        let init_mag = self.init_mag.clone();
        let mut mag = self.solve_equilibrium(beta, &field, &init_mag)?.magnetisation;

        let tol = self.cfg.iim_tol_fac;
        let mut converged = false;
        let mut iterations = 0;

        for it in 0..self.cfg.iim_iter {
            iterations = it + 1;

            // Positive agent
            let grad = susceptibility_gradient(&self.graph, beta, &mag)?;
            let new_positive = self.agents.update(
                AgentRole::Positive,
                &grad,
                &positive,
                pos_budget,
                &mut self.momentum,
            )?;
            let field = self.total_field(&new_positive, &negative);
            let eq_pos = self.solve_equilibrium(beta, &field, &mag)?;

            // Negative agent
            let grad = susceptibility_gradient(&self.graph, beta, &eq_pos.magnetisation)?;
            let new_negative = self.agents.update(
                AgentRole::Negative,
                &grad,
                &negative,
                neg_budget,
                &mut self.momentum,
            )?;
            let field = self.total_field(&new_positive, &new_negative);
            let eq_neg = self.solve_equilibrium(beta, &field, &eq_pos.magnetisation)?;

            let pos_diff: f64 = positive
                .iter()
                .zip(&new_positive)
                .map(|(a, b)| (a - b).abs())
                .sum();
            let neg_diff: f64 = negative
                .iter()
                .zip(&new_negative)
                .map(|(a, b)| (a - b).abs())
                .sum();

            let step = GameStepLog {
                step: it,
                pos_diff,
                neg_diff,
                mean_magnetisation: mean(&eq_neg.magnetisation),
                inner_iterations: eq_pos.iterations + eq_neg.iterations,
            };
            log::debug!(
                "iim step {it}: pos_diff={pos_diff:.3e} neg_diff={neg_diff:.3e} <m>={:.6}",
                step.mean_magnetisation
            );
            self.log.push(step);

            self.positive_history.push(new_positive.clone());
            self.negative_history.push(new_negative.clone());
            positive = new_positive;
            negative = new_negative;
            mag = eq_neg.magnetisation;

            if pos_diff <= tol && neg_diff <= tol {
                converged = true;
                break;
            }
        }

        if converged {
            log::debug!("iim converged after {iterations} iterations");
        } else {
            log::warn!("Failed to converge after {} iterations", self.cfg.iim_iter);
        }

        Ok(GameOutcome {
            positive,
            negative,
            magnetisation: converged.then_some(mag),
            iterations,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iim_types::OptimiserType;

    fn path3() -> Graph {
        Graph::from_edges(3, &[(0, 1), (1, 2)]).unwrap()
    }

    fn make_system(init_mag: InitMag, optimiser_type: OptimiserType) -> MfIsingSystem {
        MfIsingSystem::new(
            path3(),
            vec![0.0; 3],
            IimConfig {
                init_mag,
                optimiser_type,
                ..IimConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_init_aligned() {
        let sys = make_system(InitMag::AlignedNeg, OptimiserType::Sgd);
        assert_eq!(sys.init_mag(), &[-1.0, -1.0, -1.0]);
        let sys = make_system(InitMag::AlignedPos, OptimiserType::Sgd);
        assert_eq!(sys.init_mag(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_init_random_is_seeded() {
        let g = Graph::empty(32).unwrap();
        let cfg = IimConfig {
            seed: 5,
            ..IimConfig::default()
        };
        let a = MfIsingSystem::new(g.clone(), vec![0.0; 32], cfg.clone()).unwrap();
        let b = MfIsingSystem::new(g, vec![0.0; 32], cfg).unwrap();
        assert_eq!(a.init_mag(), b.init_mag());
        assert!(a.init_mag().iter().all(|&m| m == 1.0 || m == -1.0));
    }

    #[test]
    fn test_init_random_uses_injected_rng() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let sys =
            MfIsingSystem::with_rng(path3(), vec![0.0; 3], IimConfig::default(), &mut rng).unwrap();
        let mut replay = ChaCha8Rng::seed_from_u64(99);
        let expected: Vec<f64> = (0..3)
            .map(|_| if replay.gen_bool(0.5) { 1.0 } else { -1.0 })
            .collect();
        assert_eq!(sys.init_mag(), expected.as_slice());
    }

    #[test]
    fn test_explicit_init_length_checked() {
        let cfg = IimConfig {
            init_mag: InitMag::Explicit(vec![0.0, 0.1]),
            ..IimConfig::default()
        };
        assert!(matches!(
            MfIsingSystem::new(path3(), vec![0.0; 3], cfg),
            Err(IimError::Config(_))
        ));
    }

    #[test]
    fn test_background_length_checked() {
        assert!(MfIsingSystem::default_params(path3(), vec![0.0; 2]).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = IimConfig {
            step_size: 0.0,
            ..IimConfig::default()
        };
        assert!(MfIsingSystem::new(path3(), vec![0.0; 3], cfg).is_err());
    }

    #[test]
    fn test_invalid_budgets_rejected() {
        let mut sys = make_system(InitMag::AlignedPos, OptimiserType::Sgd);
        assert!(sys.run_game(0.0, 1.0, 1.0).is_err());
        assert!(sys.run_game(1.0, -1.0, 1.0).is_err());
        assert!(sys.run_game(1.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_run_converges_on_path() {
        let mut sys = make_system(InitMag::AlignedPos, OptimiserType::Sgd);
        let out = sys.run_game(1.0, 1.0, 1.0).unwrap();
        assert!(out.converged);
        assert!(out.iterations < 50, "took {} iterations", out.iterations);
        let mag = out.magnetisation.expect("converged run reports magnetisation");
        assert!(mag.iter().all(|m| (-1.0..=1.0).contains(m)));
    }

    #[test]
    fn test_histories_and_log_lengths() {
        let mut sys = make_system(InitMag::AlignedPos, OptimiserType::Sgdm);
        let out = sys.run_game(1.0, 1.0, 1.0).unwrap();
        assert_eq!(sys.positive_history().len(), out.iterations + 1);
        assert_eq!(sys.negative_history().len(), out.iterations + 1);
        assert_eq!(sys.magnetisation_history().len(), 2 * out.iterations + 1);
        assert_eq!(sys.log.len(), out.iterations);
        assert_eq!(sys.positive_history().last(), Some(&out.positive));
        // Seed + one entry per agent update.
        let changes = sys.momentum().entries();
        assert_eq!(changes.len(), 2 * out.iterations + 1);
        assert!(changes[0].iter().all(|&c| c == 0.0));
        assert!(changes.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn test_seed_allocations_within_budget() {
        // Nine shares of 1/9 sum past 1.0 before projection.
        let mut sys = MfIsingSystem::new(
            Graph::empty(9).unwrap(),
            vec![0.0; 9],
            IimConfig {
                init_mag: InitMag::AlignedPos,
                iim_iter: 1,
                ..IimConfig::default()
            },
        )
        .unwrap();
        sys.run_game(1.0, 1.0, 1.0).unwrap();
        for c in sys.positive_history().iter().chain(sys.negative_history()) {
            assert!(iim_physics::l1_norm(c) <= 1.0, "{c:?}");
        }
        assert!(sys.positive_history()[0].iter().all(|&x| x > 0.0));
        assert!(sys.negative_history()[0].iter().all(|&x| x < 0.0));
    }

    #[test]
    fn test_sgd_never_touches_momentum() {
        let mut sys = make_system(InitMag::AlignedPos, OptimiserType::Sgd);
        sys.run_game(1.0, 1.0, 1.0).unwrap();
        assert_eq!(sys.momentum().len(), 1);
    }

    #[test]
    fn test_exhausted_loop_reports_no_magnetisation() {
        let mut sys = MfIsingSystem::new(
            path3(),
            vec![0.0; 3],
            IimConfig {
                init_mag: InitMag::AlignedPos,
                iim_iter: 1,
                ..IimConfig::default()
            },
        )
        .unwrap();
        let out = sys.run_game(1.0, 1.0, 1.0).unwrap();
        assert!(!out.converged);
        assert!(out.magnetisation.is_none());
        assert_eq!(out.iterations, 1);
        assert_eq!(sys.positive_history().len(), 2);
        assert_eq!(sys.negative_history().len(), 2);
    }

    #[test]
    fn test_rerun_resets_state() {
        let mut sys = make_system(InitMag::AlignedPos, OptimiserType::Sgdm);
        let first = sys.run_game(1.0, 1.0, 1.0).unwrap();
        let second = sys.run_game(1.0, 1.0, 1.0).unwrap();
        assert_eq!(first.positive, second.positive);
        assert_eq!(sys.positive_history().len(), second.iterations + 1);
        assert_eq!(sys.momentum().len(), 2 * second.iterations + 1);
    }

    #[test]
    fn test_outcome_serialises() {
        let mut sys = make_system(InitMag::AlignedPos, OptimiserType::Sgd);
        let out = sys.run_game(1.0, 1.0, 1.0).unwrap();
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"converged\":true"));
    }
}
