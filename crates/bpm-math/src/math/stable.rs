//! Numerically stable primitives for log-domain probability math.

/// Relative tolerance below which a precision difference is treated as zero.
pub const PRECISION_REL_TOL: f64 = 1e-12;

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Normalize unnormalized log weights into log probabilities.
///
/// When every weight is -inf there is no information to normalize; the
/// result is the uniform distribution rather than a vector of NaNs.
pub fn normalize_log_probs(log_weights: &[f64]) -> Vec<f64> {
    if log_weights.is_empty() {
        return Vec::new();
    }
    let total = log_sum_exp(log_weights);
    if !total.is_finite() {
        let uniform = -(log_weights.len() as f64).ln();
        return vec![uniform; log_weights.len()];
    }
    log_weights.iter().map(|w| w - total).collect()
}

/// Exponentiate log weights into probabilities that sum to one.
///
/// A second linear renormalization removes the rounding left by `exp`.
pub fn probs_from_log_weights(log_weights: &[f64]) -> Vec<f64> {
    let mut probs: Vec<f64> = normalize_log_probs(log_weights)
        .into_iter()
        .map(f64::exp)
        .collect();
    let sum: f64 = probs.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        for p in &mut probs {
            *p /= sum;
        }
    }
    probs
}

/// True when `value` is zero relative to `scale`.
pub fn is_negligible(value: f64, scale: f64) -> bool {
    value.abs() <= PRECISION_REL_TOL * scale.abs().max(1.0)
}
