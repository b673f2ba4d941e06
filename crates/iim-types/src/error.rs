// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all IIM kernel failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IimError {
    /// Configuration rejected at construction time.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid input (budgets, temperature, vector sizes, graph).
    #[error("validation error: {0}")]
    Validation(String),

    /// Numerical error (singular matrix, zero gradient, NaN/Inf).
    #[error("numerical error: {0}")]
    Numerical(String),
}

pub type IimResult<T> = Result<T, IimError>;
