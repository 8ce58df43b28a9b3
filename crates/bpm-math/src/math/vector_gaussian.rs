//! Multivariate Gaussian beliefs in natural-parameter form.
//!
//! Held as a precision matrix and a precision-times-mean vector. A point
//! mass carries its location separately since its precision is unbounded.

use nalgebra::linalg::{Cholesky, SymmetricEigen};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::error::BeliefError;
use super::gaussian::Gaussian;
use super::stable::is_negligible;

/// Mean and covariance of a proper multivariate belief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMoments {
    pub mean: Vec<f64>,
    /// Row-major covariance.
    pub covariance: Vec<Vec<f64>>,
}

/// Multivariate Gaussian belief over a weight vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorGaussian {
    precision: DMatrix<f64>,
    mean_times_precision: DVector<f64>,
    point: Option<DVector<f64>>,
}

impl VectorGaussian {
    pub fn uniform(dimension: usize) -> Self {
        Self {
            precision: DMatrix::zeros(dimension, dimension),
            mean_times_precision: DVector::zeros(dimension),
            point: None,
        }
    }

    pub fn point_mass(location: DVector<f64>) -> Self {
        let dimension = location.len();
        Self {
            precision: DMatrix::zeros(dimension, dimension),
            mean_times_precision: DVector::zeros(dimension),
            point: Some(location),
        }
    }

    /// Independent coordinates sharing one mean and precision.
    pub fn isotropic(dimension: usize, mean: f64, precision: f64) -> Self {
        if precision == f64::INFINITY {
            return Self::point_mass(DVector::from_element(dimension, mean));
        }
        Self {
            precision: DMatrix::identity(dimension, dimension) * precision,
            mean_times_precision: DVector::from_element(dimension, mean * precision),
            point: None,
        }
    }

    pub fn from_mean_and_precision(
        mean: DVector<f64>,
        precision: DMatrix<f64>,
    ) -> Result<Self, BeliefError> {
        if precision.nrows() != mean.len() || precision.ncols() != mean.len() {
            return Err(BeliefError::DimensionMismatch {
                expected: mean.len(),
                actual: precision.nrows(),
            });
        }
        let mean_times_precision = &precision * &mean;
        Ok(Self {
            precision,
            mean_times_precision,
            point: None,
        })
    }

    pub fn dimension(&self) -> usize {
        self.mean_times_precision.len()
    }

    pub fn precision(&self) -> &DMatrix<f64> {
        &self.precision
    }

    pub fn mean_times_precision(&self) -> &DVector<f64> {
        &self.mean_times_precision
    }

    pub fn point(&self) -> Option<&DVector<f64>> {
        self.point.as_ref()
    }

    pub fn is_point_mass(&self) -> bool {
        self.point.is_some()
    }

    pub fn is_uniform(&self) -> bool {
        self.point.is_none() && self.precision.iter().all(|p| *p == 0.0)
    }

    /// True when the precision matrix is positive definite.
    pub fn is_proper(&self) -> bool {
        self.point.is_none() && Cholesky::new(self.precision.clone()).is_some()
    }

    fn check_dimension(&self, other: &VectorGaussian) -> Result<(), BeliefError> {
        if self.dimension() != other.dimension() {
            return Err(BeliefError::DimensionMismatch {
                expected: self.dimension(),
                actual: other.dimension(),
            });
        }
        Ok(())
    }

    pub fn multiply(&self, other: &VectorGaussian) -> Result<VectorGaussian, BeliefError> {
        self.check_dimension(other)?;
        if self.is_point_mass() {
            return Ok(self.clone());
        }
        if other.is_point_mass() {
            return Ok(other.clone());
        }
        Ok(VectorGaussian {
            precision: &self.precision + &other.precision,
            mean_times_precision: &self.mean_times_precision + &other.mean_times_precision,
            point: None,
        })
    }

    /// Ratio of two beliefs.
    ///
    /// The resulting precision must be positive semidefinite. Eigenvalues
    /// that are negative only within a relative tolerance are snapped to zero.
    pub fn divide(&self, other: &VectorGaussian) -> Result<VectorGaussian, BeliefError> {
        self.check_dimension(other)?;
        if let Some(divisor) = &other.point {
            return match &self.point {
                Some(location) if location == divisor => {
                    Ok(VectorGaussian::uniform(self.dimension()))
                }
                _ => Err(BeliefError::PointMassDivision),
            };
        }
        if other.is_uniform() || self.is_point_mass() {
            return Ok(self.clone());
        }
        let mut precision = &self.precision - &other.precision;
        let mean_times_precision = &self.mean_times_precision - &other.mean_times_precision;
        let scale = self.precision.amax().max(other.precision.amax());
        let eigen = SymmetricEigen::new(precision.clone());
        let min_eigenvalue = eigen.eigenvalues.min();
        if min_eigenvalue < 0.0 {
            if !is_negligible(min_eigenvalue, scale) {
                return Err(BeliefError::NotPositiveSemidefinite { min_eigenvalue });
            }
            let mut eigen = eigen;
            eigen.eigenvalues.iter_mut().for_each(|l| *l = l.max(0.0));
            precision = eigen.recompose();
        }
        Ok(VectorGaussian {
            precision,
            mean_times_precision,
            point: None,
        })
    }

    /// Ratio of two beliefs whose precision eigenvalues are raised to
    /// `floor` when the plain ratio is not positive semidefinite.
    pub fn divide_clamped(
        &self,
        other: &VectorGaussian,
        floor: f64,
    ) -> Result<VectorGaussian, BeliefError> {
        match self.divide(other) {
            Err(BeliefError::NotPositiveSemidefinite { .. }) => {
                let raw = VectorGaussian {
                    precision: &self.precision - &other.precision,
                    mean_times_precision: &self.mean_times_precision - &other.mean_times_precision,
                    point: None,
                };
                Ok(raw.clamp_precision(floor))
            }
            other => other,
        }
    }

    pub fn mean(&self) -> Result<DVector<f64>, BeliefError> {
        if let Some(location) = &self.point {
            return Ok(location.clone());
        }
        let chol = Cholesky::new(self.precision.clone()).ok_or(BeliefError::Improper)?;
        Ok(chol.solve(&self.mean_times_precision))
    }

    pub fn to_moments(&self) -> Result<VectorMoments, BeliefError> {
        let d = self.dimension();
        let (mean, covariance) = match &self.point {
            Some(location) => (location.clone(), DMatrix::zeros(d, d)),
            None => {
                let chol = Cholesky::new(self.precision.clone()).ok_or(BeliefError::Improper)?;
                (chol.solve(&self.mean_times_precision), chol.inverse())
            }
        };
        Ok(VectorMoments {
            mean: mean.iter().copied().collect(),
            covariance: (0..d)
                .map(|r| (0..d).map(|c| covariance[(r, c)]).collect())
                .collect(),
        })
    }

    fn direction(&self, indices: &[usize], values: &[f64]) -> Result<DVector<f64>, BeliefError> {
        if indices.len() != values.len() {
            return Err(BeliefError::DimensionMismatch {
                expected: indices.len(),
                actual: values.len(),
            });
        }
        let dimension = self.dimension();
        let mut x = DVector::zeros(dimension);
        for (&index, &value) in indices.iter().zip(values) {
            if index >= dimension {
                return Err(BeliefError::IndexOutOfRange { index, dimension });
            }
            x[index] += value;
        }
        Ok(x)
    }

    /// Belief of the scalar `x^T w` where `x` is zero outside `indices`.
    ///
    /// A zero direction gives a point mass at zero. An improper belief
    /// gives the uniform score belief.
    pub fn project(&self, indices: &[usize], values: &[f64]) -> Result<Gaussian, BeliefError> {
        let x = self.direction(indices, values)?;
        if let Some(location) = &self.point {
            return Ok(Gaussian::point_mass(x.dot(location)));
        }
        if x.iter().all(|v| *v == 0.0) {
            return Ok(Gaussian::point_mass(0.0));
        }
        let Some(chol) = Cholesky::new(self.precision.clone()) else {
            return Ok(Gaussian::uniform());
        };
        let solved = chol.solve(&x);
        let variance = x.dot(&solved);
        let mean = solved.dot(&self.mean_times_precision);
        Gaussian::from_mean_and_variance(mean, variance)
    }

    /// Rank-one update `precision += dp * x x^T`, `mean_times_precision += dm * x`
    /// over the named coordinates only. Point masses are left untouched.
    pub fn absorb_projected(
        &mut self,
        indices: &[usize],
        values: &[f64],
        delta_precision: f64,
        delta_mean_times_precision: f64,
    ) -> Result<(), BeliefError> {
        let _ = self.direction(indices, values)?;
        if self.is_point_mass() {
            return Ok(());
        }
        for (&i, &xi) in indices.iter().zip(values) {
            self.mean_times_precision[i] += delta_mean_times_precision * xi;
            for (&j, &xj) in indices.iter().zip(values) {
                self.precision[(i, j)] += delta_precision * xi * xj;
            }
        }
        Ok(())
    }

    pub fn min_eigenvalue(&self) -> f64 {
        if self.is_point_mass() {
            return f64::INFINITY;
        }
        SymmetricEigen::new(self.precision.clone()).eigenvalues.min()
    }

    /// Raise every precision eigenvalue to at least `floor`, keeping the mean
    /// along directions that were already informative.
    pub fn clamp_precision(&self, floor: f64) -> VectorGaussian {
        if self.is_point_mass() {
            return self.clone();
        }
        let SymmetricEigen {
            eigenvectors,
            eigenvalues,
        } = SymmetricEigen::new(self.precision.clone());
        let coords = eigenvectors.transpose() * &self.mean_times_precision;
        let mut clamped = eigenvalues.clone();
        let mut new_coords = DVector::zeros(coords.len());
        for i in 0..eigenvalues.len() {
            let lambda = eigenvalues[i];
            let mean_coord = if lambda > 0.0 { coords[i] / lambda } else { 0.0 };
            clamped[i] = lambda.max(floor);
            new_coords[i] = clamped[i] * mean_coord;
        }
        let precision = &eigenvectors * DMatrix::from_diagonal(&clamped) * eigenvectors.transpose();
        VectorGaussian {
            precision,
            mean_times_precision: &eigenvectors * new_coords,
            point: None,
        }
    }

    /// Largest absolute difference in natural parameters; point masses
    /// compare by location.
    pub fn max_abs_diff(&self, other: &VectorGaussian) -> f64 {
        if self.dimension() != other.dimension() {
            return f64::INFINITY;
        }
        match (&self.point, &other.point) {
            (Some(a), Some(b)) => (a - b).amax(),
            (None, None) => (&self.precision - &other.precision)
                .amax()
                .max((&self.mean_times_precision - &other.mean_times_precision).amax()),
            _ => f64::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn sample() -> VectorGaussian {
        let precision = DMatrix::from_row_slice(3, 3, &[2.0, 0.5, 0.0, 0.5, 1.5, 0.2, 0.0, 0.2, 1.0]);
        VectorGaussian::from_mean_and_precision(DVector::from_vec(vec![1.0, -0.5, 0.25]), precision)
            .unwrap()
    }

    #[test]
    fn mean_recovers_construction() {
        let m = sample().mean().unwrap();
        assert!(approx_eq(m[0], 1.0, 1e-12));
        assert!(approx_eq(m[1], -0.5, 1e-12));
        assert!(approx_eq(m[2], 0.25, 1e-12));
    }

    #[test]
    fn divide_undoes_multiply() {
        let a = sample();
        let b = VectorGaussian::isotropic(3, 0.3, 0.7);
        let back = a.multiply(&b).unwrap().divide(&b).unwrap();
        assert!(back.max_abs_diff(&a) < 1e-12);
    }

    #[test]
    fn point_mass_rules() {
        let pm = VectorGaussian::point_mass(DVector::zeros(3));
        assert_eq!(pm.multiply(&sample()).unwrap(), pm);
        assert!(pm.divide(&pm).unwrap().is_uniform());
        assert_eq!(
            sample().divide(&pm),
            Err(BeliefError::PointMassDivision)
        );
        assert_eq!(pm.divide(&VectorGaussian::uniform(3)).unwrap(), pm);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let err = sample().multiply(&VectorGaussian::uniform(2)).unwrap_err();
        assert_eq!(
            err,
            BeliefError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn indefinite_division_rejected() {
        let small = VectorGaussian::isotropic(3, 0.0, 1.0);
        let large = VectorGaussian::isotropic(3, 0.0, 2.0);
        assert!(matches!(
            small.divide(&large),
            Err(BeliefError::NotPositiveSemidefinite { .. })
        ));
    }

    #[test]
    fn clamped_division_floors_eigenvalues() {
        let small = VectorGaussian::isotropic(3, 0.0, 1.0);
        let large = VectorGaussian::isotropic(3, 0.0, 2.0);
        let clamped = small.divide_clamped(&large, 1e-6).unwrap();
        assert!(approx_eq(clamped.min_eigenvalue(), 1e-6, 1e-12));
        let back = small.multiply(&large).unwrap().divide_clamped(&large, 1e-6).unwrap();
        assert!(back.max_abs_diff(&small) < 1e-12);
    }

    #[test]
    fn projection_matches_moments() {
        let belief = sample();
        let moments = belief.to_moments().unwrap();
        let score = belief.project(&[0, 2], &[2.0, -1.0]).unwrap();
        let expected_mean = 2.0 * moments.mean[0] - moments.mean[2];
        let c = &moments.covariance;
        let expected_var = 4.0 * c[0][0] - 4.0 * c[0][2] + c[2][2];
        assert!(approx_eq(score.mean(), expected_mean, 1e-12));
        assert!(approx_eq(score.variance(), expected_var, 1e-12));
    }

    #[test]
    fn projection_edge_cases() {
        assert!(sample().project(&[], &[]).unwrap().is_point_mass());
        assert!(VectorGaussian::uniform(3)
            .project(&[1], &[1.0])
            .unwrap()
            .is_uniform());
        assert_eq!(
            sample().project(&[3], &[1.0]),
            Err(BeliefError::IndexOutOfRange {
                index: 3,
                dimension: 3
            })
        );
    }

    #[test]
    fn absorb_projected_is_rank_one_product() {
        let mut belief = sample();
        belief.absorb_projected(&[0, 1], &[1.0, 2.0], 0.5, 0.25).unwrap();
        let mut precision = DMatrix::zeros(3, 3);
        precision[(0, 0)] = 0.5;
        precision[(0, 1)] = 1.0;
        precision[(1, 0)] = 1.0;
        precision[(1, 1)] = 2.0;
        let expected = sample()
            .multiply(&VectorGaussian {
                precision,
                mean_times_precision: DVector::from_vec(vec![0.25, 0.5, 0.0]),
                point: None,
            })
            .unwrap();
        assert!(belief.max_abs_diff(&expected) < 1e-12);
    }

    #[test]
    fn clamp_raises_small_eigenvalues_only() {
        let belief = sample();
        let clamped = belief.clamp_precision(1e-10);
        assert!(clamped.max_abs_diff(&belief) < 1e-10);

        let improper = VectorGaussian::uniform(2);
        let floored = improper.clamp_precision(0.5);
        assert!(approx_eq(floored.min_eigenvalue(), 0.5, 1e-12));
        let mean = floored.mean().unwrap();
        assert!(approx_eq(mean[0], 0.0, 1e-12));
    }
}
