// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Kernel Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{IimError, IimResult};

/// Initial magnetisation used for the first equilibrium solve of a run.
///
/// This is the spin state *without* any external field; the first solve
/// relaxes it under the seeded allocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMag {
    /// Every spin at -1.
    AlignedNeg,
    /// Every spin at +1.
    AlignedPos,
    /// Each spin drawn uniformly from {-1, +1} with the configured seed.
    Random,
    /// Caller-supplied vector, one entry per node, each in [-1, 1].
    Explicit(Vec<f64>),
}

/// Update rule used by both agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimiserType {
    /// Plain projected gradient step: Δ = η·g.
    Sgd,
    /// Momentum step: Δ_k = η·g + μ·Δ_{k-1}.
    Sgdm,
}

/// Base-iterate policy of the Steffensen loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteffensenUpdate {
    /// Classic Steffensen: the accelerated estimate becomes the next base.
    Rebind,
    /// Every pass restarts from the initial guess. Without early
    /// agreement this degenerates to a single application of the map.
    FixedBase,
}

/// Runtime configuration for one `MfIsingSystem`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IimConfig {
    /// Maximum Steffensen passes per equilibrium solve.
    /// Default: 50000.
    pub fixed_point_iter: usize,

    /// Initial magnetisation for the first solve of a run.
    /// Default: `Random`.
    pub init_mag: InitMag,

    /// Stop the inner solve once |mean(m1) - mean(m_acc)| < this.
    /// Default: 1e-6.
    pub fp_tol_fac: f64,

    /// Maximum outer game iterations.
    /// Default: 1000.
    pub iim_iter: usize,

    /// Gradient step scale η.
    /// Default: 1.0.
    pub step_size: f64,

    /// Outer convergence: both agents' L1 allocation change must be <= this.
    /// Default: 1e-5.
    pub iim_tol_fac: f64,

    /// Momentum coefficient μ, only read by `Sgdm`.
    /// Default: 0.4.
    pub momentum: f64,

    /// Default: `Sgdm`.
    pub optimiser_type: OptimiserType,

    /// Damping γ of the magnetisation map: m' = (1-γ)·m + γ·tanh(...).
    /// Default: 1.0 (undamped).
    pub damping: f64,

    /// Default: `Rebind`.
    pub steffensen_update: SteffensenUpdate,

    /// Seed for `InitMag::Random`.
    /// Default: 42.
    pub seed: u64,
}

impl Default for IimConfig {
    fn default() -> Self {
        Self {
            fixed_point_iter: 50_000,
            init_mag: InitMag::Random,
            fp_tol_fac: 1e-6,
            iim_iter: 1000,
            step_size: 1.0,
            iim_tol_fac: 1e-5,
            momentum: 0.4,
            optimiser_type: OptimiserType::Sgdm,
            damping: 1.0,
            steffensen_update: SteffensenUpdate::Rebind,
            seed: 42,
        }
    }
}

impl IimConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> IimResult<()> {
        if self.fixed_point_iter == 0 {
            return Err(IimError::Config(
                "fixed_point_iter must be >= 1".to_string(),
            ));
        }
        if self.iim_iter == 0 {
            return Err(IimError::Config("iim_iter must be >= 1".to_string()));
        }
        if !(self.fp_tol_fac.is_finite() && self.fp_tol_fac > 0.0) {
            return Err(IimError::Config(format!(
                "fp_tol_fac must be finite and > 0, got {}",
                self.fp_tol_fac
            )));
        }
        if !(self.iim_tol_fac.is_finite() && self.iim_tol_fac > 0.0) {
            return Err(IimError::Config(format!(
                "iim_tol_fac must be finite and > 0, got {}",
                self.iim_tol_fac
            )));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(IimError::Config(format!(
                "step_size must be finite and > 0, got {}",
                self.step_size
            )));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(IimError::Config(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(IimError::Config(format!(
                "damping must be in (0, 1], got {}",
                self.damping
            )));
        }
        if let InitMag::Explicit(ref m) = self.init_mag {
            if m.is_empty() {
                return Err(IimError::Config(
                    "explicit init_mag must not be empty".to_string(),
                ));
            }
            if let Some(bad) = m.iter().find(|v| !(-1.0..=1.0).contains(*v)) {
                return Err(IimError::Config(format!(
                    "explicit init_mag entries must be in [-1, 1], got {bad}"
                )));
            }
        }
        Ok(())
    }

    /// Load from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> IimResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| IimError::Config(format!("JSON parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(IimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let cfg = IimConfig::default();
        assert_eq!(cfg.fixed_point_iter, 50_000);
        assert_eq!(cfg.iim_iter, 1000);
        assert_eq!(cfg.optimiser_type, OptimiserType::Sgdm);
        assert_eq!(cfg.steffensen_update, SteffensenUpdate::Rebind);
        assert_eq!(cfg.damping, 1.0);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let cfg = IimConfig {
            iim_iter: 0,
            ..IimConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(IimError::Config(_))));
    }

    #[test]
    fn test_negative_step_rejected() {
        let cfg = IimConfig {
            step_size: -0.5,
            ..IimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_nan_tolerance_rejected() {
        let cfg = IimConfig {
            fp_tol_fac: f64::NAN,
            ..IimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_momentum_out_of_range() {
        let cfg = IimConfig {
            momentum: 1.0,
            ..IimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_damping_zero_rejected() {
        let cfg = IimConfig {
            damping: 0.0,
            ..IimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_explicit_init_out_of_range() {
        let cfg = IimConfig {
            init_mag: InitMag::Explicit(vec![0.5, 1.5]),
            ..IimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = IimConfig::from_json(
            r#"{"optimiser_type": "sgd", "init_mag": "aligned_pos", "iim_iter": 50}"#,
        )
        .unwrap();
        assert_eq!(cfg.optimiser_type, OptimiserType::Sgd);
        assert_eq!(cfg.init_mag, InitMag::AlignedPos);
        assert_eq!(cfg.iim_iter, 50);
        assert_eq!(cfg.fixed_point_iter, 50_000);
    }

    #[test]
    fn test_from_json_explicit_init() {
        let cfg = IimConfig::from_json(r#"{"init_mag": {"explicit": [0.1, -0.2]}}"#).unwrap();
        assert_eq!(cfg.init_mag, InitMag::Explicit(vec![0.1, -0.2]));
    }

    #[test]
    fn test_from_json_unknown_optimiser() {
        let err = IimConfig::from_json(r#"{"optimiser_type": "adam"}"#).unwrap_err();
        assert!(matches!(err, IimError::Config(_)));
    }

    #[test]
    fn test_from_json_invalid_values() {
        assert!(IimConfig::from_json(r#"{"step_size": 0.0}"#).is_err());
    }
}
