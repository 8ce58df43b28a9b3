//! Standard normal density, CDF, and the truncated-Gaussian moments used by
//! ranking constraints.
//!
//! The CDF goes through `statrs`' complementary error function. Below
//! `ASYMPTOTIC_THRESHOLD` the Mills-ratio asymptotic series takes over so the
//! log CDF and the pdf/cdf ratio stay finite and monotone far into the tail.

use statrs::function::erf::erfc;

/// z below which the asymptotic tail expansion is used.
pub const ASYMPTOTIC_THRESHOLD: f64 = -20.0;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Standard normal density.
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z - LN_SQRT_2PI).exp()
}

/// Log of the standard normal density.
pub fn normal_log_pdf(z: f64) -> f64 {
    -0.5 * z * z - LN_SQRT_2PI
}

/// Standard normal CDF.
pub fn normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Terms of the tail series `S(z) = 1 - 1/z^2 + 3/z^4 - 15/z^6 + 105/z^8`,
/// returned as `S - 1` to avoid cancellation.
fn tail_series_minus_one(z: f64) -> f64 {
    let r = 1.0 / (z * z);
    r * (-1.0 + r * (3.0 + r * (-15.0 + r * 105.0)))
}

/// Log of the standard normal CDF, accurate in both tails.
pub fn normal_log_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return 0.0;
    }
    if z == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if z < ASYMPTOTIC_THRESHOLD {
        // Phi(z) ~ phi(z) / (-z) * S(z)
        let s = 1.0 + tail_series_minus_one(z);
        return normal_log_pdf(z) - (-z).ln() + s.ln();
    }
    if z > 0.0 {
        return (-normal_cdf(-z)).ln_1p();
    }
    normal_cdf(z).ln()
}

/// The inverse Mills ratio `phi(z) / Phi(z)`.
pub fn normal_pdf_over_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return 0.0;
    }
    if z < ASYMPTOTIC_THRESHOLD {
        let s = 1.0 + tail_series_minus_one(z);
        return -z / s;
    }
    (normal_log_pdf(z) - normal_log_cdf(z)).exp()
}

/// `(lambda, w)` for a unit Gaussian truncated to positive values at offset z:
/// `lambda = phi(z)/Phi(z)` and `w = lambda * (lambda + z)`, with `w` in `[0, 1]`.
pub fn truncation_factors(z: f64) -> (f64, f64) {
    if z < ASYMPTOTIC_THRESHOLD {
        let sm1 = tail_series_minus_one(z);
        let s = 1.0 + sm1;
        let lambda = -z / s;
        // lambda + z = z * (s - 1) / s
        let w = lambda * z * sm1 / s;
        return (lambda, w.clamp(0.0, 1.0));
    }
    let lambda = normal_pdf_over_cdf(z);
    let w = lambda * (lambda + z);
    (lambda, w.clamp(0.0, 1.0))
}

/// Moments of `N(mean, variance)` restricted to the positive half-line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncatedMoments {
    pub mean: f64,
    pub variance: f64,
    /// `log P(x > 0)` under the untruncated Gaussian.
    pub log_normalizer: f64,
}

/// Moment-match `N(mean, variance)` truncated to `x > 0`.
///
/// Returns `None` for non-positive or non-finite variance.
pub fn truncate_positive(mean: f64, variance: f64) -> Option<TruncatedMoments> {
    if !(variance > 0.0) || !variance.is_finite() || !mean.is_finite() {
        return None;
    }
    let sd = variance.sqrt();
    let z = mean / sd;
    let (lambda, w) = truncation_factors(z);
    Some(TruncatedMoments {
        mean: mean + sd * lambda,
        variance: variance * (1.0 - w),
        log_normalizer: normal_log_cdf(z),
    })
}
