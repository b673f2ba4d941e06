// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Budget Projection
// ─────────────────────────────────────────────────────────────────────
//! Euclidean projection onto the L1 ball { x : Σ|x_i| ≤ B }.
//!
//! Feasible inputs are returned unchanged. Otherwise |v| is projected
//! onto the scaled simplex { w ≥ 0, Σ w = B } with the O(n log n)
//! sort-and-threshold method, and the signs of v are restored. The
//! output never exceeds the budget in floating point, so projecting it
//! again returns it unchanged.

use iim_types::{IimError, IimResult};

/// L1 norm Σ|v_i|.
#[inline]
pub fn l1_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

/// Project non-negative `v` onto { w ≥ 0, Σ w = z }.
fn project_nonneg_simplex(v: &[f64], z: f64) -> Vec<f64> {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumsum = 0.0;
    let mut threshold = 0.0;
    for (k, &val) in sorted.iter().enumerate() {
        cumsum += val;
        let t = (cumsum - z) / (k as f64 + 1.0);
        if val - t > 0.0 {
            threshold = t;
        }
    }

    let mut w: Vec<f64> = v.iter().map(|&x| (x - threshold).max(0.0)).collect();

    // Rounding in the subtraction can leave Σw a few ulps above z.
    // Trim the largest entry until the sum fits; every round strictly
    // lowers a positive entry, so this terminates.
    loop {
        let total = l1_norm(&w);
        if total <= z {
            break;
        }
        let Some(idx) = (0..w.len()).max_by(|&a, &b| w[a].total_cmp(&w[b])) else {
            break;
        };
        let trimmed = (w[idx] - (total - z)).max(0.0);
        w[idx] = if trimmed < w[idx] {
            trimmed
        } else {
            f64::from_bits(w[idx].to_bits() - 1)
        };
    }
    w
}

/// Closest point to `v` with L1 norm at most `budget`.
///
/// Deterministic and idempotent on feasible input.
pub fn project_to_simplex(v: &[f64], budget: f64) -> IimResult<Vec<f64>> {
    if !(budget.is_finite() && budget > 0.0) {
        return Err(IimError::Validation(format!(
            "budget must be finite and > 0, got {budget}"
        )));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(IimError::Numerical(
            "projection input contains NaN or Inf".to_string(),
        ));
    }
    if l1_norm(v) <= budget {
        return Ok(v.to_vec());
    }

    let magnitudes: Vec<f64> = v.iter().map(|x| x.abs()).collect();
    let w = project_nonneg_simplex(&magnitudes, budget);
    Ok(w.iter().zip(v).map(|(&wi, &vi)| wi.copysign(vi)).collect())
}
