//! Scalar Gaussian beliefs in natural-parameter form.
//!
//! A belief is held as `(precision, precision * mean)`. Zero precision is the
//! uniform (uninformative) belief. Infinite precision marks a point mass, in
//! which case `mean_times_precision` stores the location directly.

use serde::{Deserialize, Serialize};

use super::error::BeliefError;
use super::stable::is_negligible;

/// Mean and variance of a proper Gaussian belief.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianMoments {
    pub mean: f64,
    pub variance: f64,
}

/// Scalar Gaussian belief.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    precision: f64,
    mean_times_precision: f64,
}

impl Default for Gaussian {
    fn default() -> Self {
        Self::uniform()
    }
}

impl Gaussian {
    pub fn uniform() -> Self {
        Self {
            precision: 0.0,
            mean_times_precision: 0.0,
        }
    }

    pub fn point_mass(location: f64) -> Self {
        Self {
            precision: f64::INFINITY,
            mean_times_precision: location,
        }
    }

    /// Build from natural parameters. A negative precision is rejected.
    pub fn from_natural(precision: f64, mean_times_precision: f64) -> Result<Self, BeliefError> {
        if precision < 0.0 || precision.is_nan() {
            return Err(BeliefError::NegativePrecision { precision });
        }
        if precision == 0.0 {
            return Ok(Self::uniform());
        }
        Ok(Self {
            precision,
            mean_times_precision,
        })
    }

    pub fn from_mean_and_precision(mean: f64, precision: f64) -> Result<Self, BeliefError> {
        if precision == f64::INFINITY {
            return Ok(Self::point_mass(mean));
        }
        Self::from_natural(precision, mean * precision)
    }

    /// Zero variance gives a point mass; infinite variance the uniform belief.
    pub fn from_mean_and_variance(mean: f64, variance: f64) -> Result<Self, BeliefError> {
        if variance == 0.0 {
            return Ok(Self::point_mass(mean));
        }
        if variance == f64::INFINITY {
            return Ok(Self::uniform());
        }
        if !(variance > 0.0) {
            return Err(BeliefError::NegativePrecision {
                precision: 1.0 / variance,
            });
        }
        Ok(Self {
            precision: 1.0 / variance,
            mean_times_precision: mean / variance,
        })
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Natural mean parameter. For a point mass this is the location.
    pub fn mean_times_precision(&self) -> f64 {
        self.mean_times_precision
    }

    /// Mean of the belief; zero for the uniform belief.
    pub fn mean(&self) -> f64 {
        if self.is_point_mass() {
            self.mean_times_precision
        } else if self.precision == 0.0 {
            0.0
        } else {
            self.mean_times_precision / self.precision
        }
    }

    pub fn variance(&self) -> f64 {
        if self.is_point_mass() {
            0.0
        } else {
            1.0 / self.precision
        }
    }

    pub fn is_point_mass(&self) -> bool {
        self.precision == f64::INFINITY
    }

    pub fn is_uniform(&self) -> bool {
        self.precision == 0.0
    }

    pub fn is_proper(&self) -> bool {
        self.precision > 0.0
    }

    /// Product of two beliefs. A point mass absorbs anything it is multiplied by.
    pub fn multiply(&self, other: &Gaussian) -> Gaussian {
        if self.is_point_mass() {
            return *self;
        }
        if other.is_point_mass() {
            return *other;
        }
        Gaussian {
            precision: self.precision + other.precision,
            mean_times_precision: self.mean_times_precision + other.mean_times_precision,
        }
    }

    /// Ratio of two beliefs.
    ///
    /// Dividing by the uniform belief is the identity and a point mass divided
    /// by itself is uniform. Negative precision within a relative tolerance
    /// of the operands snaps to uniform; beyond it the division fails.
    pub fn divide(&self, other: &Gaussian) -> Result<Gaussian, BeliefError> {
        if other.is_uniform() {
            return Ok(*self);
        }
        if other.is_point_mass() {
            if self.is_point_mass() && self.mean_times_precision == other.mean_times_precision {
                return Ok(Gaussian::uniform());
            }
            return Err(BeliefError::PointMassDivision);
        }
        if self.is_point_mass() {
            return Ok(*self);
        }
        let precision = self.precision - other.precision;
        let mean_times_precision = self.mean_times_precision - other.mean_times_precision;
        if precision < 0.0 {
            if is_negligible(precision, self.precision.max(other.precision)) {
                return Ok(Gaussian::uniform());
            }
            return Err(BeliefError::NegativePrecision { precision });
        }
        if precision == 0.0 {
            return Ok(Gaussian::uniform());
        }
        Ok(Gaussian {
            precision,
            mean_times_precision,
        })
    }

    /// Ratio of two beliefs that never fails on negative precision: the
    /// result is raised to `floor` at its own mean instead.
    pub fn divide_clamped(&self, other: &Gaussian, floor: f64) -> Result<Gaussian, BeliefError> {
        match self.divide(other) {
            Err(BeliefError::NegativePrecision { precision }) => {
                let mean_times_precision = self.mean_times_precision - other.mean_times_precision;
                let mean = if precision != 0.0 {
                    mean_times_precision / precision
                } else {
                    0.0
                };
                Gaussian::from_mean_and_precision(mean, floor)
            }
            other => other,
        }
    }

    /// Convolve with zero-mean noise of the given variance.
    ///
    /// `tau' = tau / (1 + tau * extra)` and `nu' = nu / (1 + tau * extra)`.
    pub fn add_variance(&self, extra: f64) -> Gaussian {
        if extra == 0.0 || self.is_uniform() {
            return *self;
        }
        if self.is_point_mass() {
            return Gaussian {
                precision: 1.0 / extra,
                mean_times_precision: self.mean_times_precision / extra,
            };
        }
        let scale = 1.0 + self.precision * extra;
        Gaussian {
            precision: self.precision / scale,
            mean_times_precision: self.mean_times_precision / scale,
        }
    }

    pub fn to_moments(&self) -> Result<GaussianMoments, BeliefError> {
        if !self.is_proper() {
            return Err(BeliefError::Improper);
        }
        Ok(GaussianMoments {
            mean: self.mean(),
            variance: self.variance(),
        })
    }

    /// Largest absolute difference in natural parameters; point masses compare
    /// by location.
    pub fn max_abs_diff(&self, other: &Gaussian) -> f64 {
        match (self.is_point_mass(), other.is_point_mass()) {
            (true, true) => (self.mean_times_precision - other.mean_times_precision).abs(),
            (false, false) => (self.precision - other.precision)
                .abs()
                .max((self.mean_times_precision - other.mean_times_precision).abs()),
            _ => f64::INFINITY,
        }
    }
}

impl TryFrom<GaussianMoments> for Gaussian {
    type Error = BeliefError;

    fn try_from(m: GaussianMoments) -> Result<Self, Self::Error> {
        Gaussian::from_mean_and_variance(m.mean, m.variance)
    }
}
