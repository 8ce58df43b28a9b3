//! Per-class weight beliefs.
//!
//! Each class owns one belief over its weight vector, either a full
//! multivariate Gaussian (`Dense`) or one independent scalar Gaussian per
//! feature (`Factorized`). The anchor class is a point mass at the origin
//! and stays there: multiplying a point mass by anything returns it.

use bpm_common::{Error, Result};
use bpm_config::{ModelConfig, WeightRepresentation};
use bpm_math::{BeliefError, Gaussian, GaussianMoments, VectorGaussian};
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::guard::{DivergenceGuard, GuardAction};

/// Serializable moments of one class's weight belief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "representation", rename_all = "snake_case")]
pub enum WeightMoments {
    /// Zero covariance marks a point mass.
    Dense {
        mean: Vec<f64>,
        covariance: Vec<Vec<f64>>,
    },
    Factorized {
        features: Vec<GaussianMoments>,
    },
}

/// Belief over one class's weight vector.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightBelief {
    Dense(VectorGaussian),
    Factorized(Vec<Gaussian>),
}

fn representation_mismatch(a: &WeightBelief, b: &WeightBelief) -> Error {
    Error::InvalidConfig(format!(
        "cannot combine {} and {} weight beliefs",
        a.representation().as_str(),
        b.representation().as_str()
    ))
}

impl WeightBelief {
    /// Independent `N(mean, 1/precision)` on every feature.
    pub fn prior(
        representation: WeightRepresentation,
        feature_count: usize,
        mean: f64,
        precision: f64,
    ) -> Result<Self> {
        Ok(match representation {
            WeightRepresentation::Dense => {
                WeightBelief::Dense(VectorGaussian::isotropic(feature_count, mean, precision))
            }
            WeightRepresentation::Factorized => {
                let g = Gaussian::from_mean_and_precision(mean, precision)?;
                WeightBelief::Factorized(vec![g; feature_count])
            }
        })
    }

    /// Point mass at the zero vector.
    pub fn anchor(representation: WeightRepresentation, feature_count: usize) -> Self {
        match representation {
            WeightRepresentation::Dense => {
                WeightBelief::Dense(VectorGaussian::point_mass(DVector::zeros(feature_count)))
            }
            WeightRepresentation::Factorized => {
                WeightBelief::Factorized(vec![Gaussian::point_mass(0.0); feature_count])
            }
        }
    }

    /// The identity for multiplication.
    pub fn uniform(representation: WeightRepresentation, feature_count: usize) -> Self {
        match representation {
            WeightRepresentation::Dense => {
                WeightBelief::Dense(VectorGaussian::uniform(feature_count))
            }
            WeightRepresentation::Factorized => {
                WeightBelief::Factorized(vec![Gaussian::uniform(); feature_count])
            }
        }
    }

    pub fn representation(&self) -> WeightRepresentation {
        match self {
            WeightBelief::Dense(_) => WeightRepresentation::Dense,
            WeightBelief::Factorized(_) => WeightRepresentation::Factorized,
        }
    }

    pub fn feature_count(&self) -> usize {
        match self {
            WeightBelief::Dense(v) => v.dimension(),
            WeightBelief::Factorized(features) => features.len(),
        }
    }

    /// True for a belief that no update can move.
    pub fn is_pinned(&self) -> bool {
        match self {
            WeightBelief::Dense(v) => v.is_point_mass(),
            WeightBelief::Factorized(features) => {
                !features.is_empty() && features.iter().all(Gaussian::is_point_mass)
            }
        }
    }

    pub fn is_uniform(&self) -> bool {
        match self {
            WeightBelief::Dense(v) => v.is_uniform(),
            WeightBelief::Factorized(features) => features.iter().all(Gaussian::is_uniform),
        }
    }

    pub fn multiply(&self, other: &WeightBelief) -> Result<WeightBelief> {
        match (self, other) {
            (WeightBelief::Dense(a), WeightBelief::Dense(b)) => Ok(WeightBelief::Dense(a.multiply(b)?)),
            (WeightBelief::Factorized(a), WeightBelief::Factorized(b)) => {
                check_len(a, b)?;
                Ok(WeightBelief::Factorized(
                    a.iter().zip(b).map(|(x, y)| x.multiply(y)).collect(),
                ))
            }
            _ => Err(representation_mismatch(self, other)),
        }
    }

    pub fn divide(&self, other: &WeightBelief) -> Result<WeightBelief> {
        match (self, other) {
            (WeightBelief::Dense(a), WeightBelief::Dense(b)) => Ok(WeightBelief::Dense(a.divide(b)?)),
            (WeightBelief::Factorized(a), WeightBelief::Factorized(b)) => {
                check_len(a, b)?;
                let features = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| x.divide(y))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(WeightBelief::Factorized(features))
            }
            _ => Err(representation_mismatch(self, other)),
        }
    }

    /// Division whose non-positive-definite results are floored at
    /// `floor` precision instead of failing.
    pub fn divide_clamped(&self, other: &WeightBelief, floor: f64) -> Result<WeightBelief> {
        match (self, other) {
            (WeightBelief::Dense(a), WeightBelief::Dense(b)) => {
                Ok(WeightBelief::Dense(a.divide_clamped(b, floor)?))
            }
            (WeightBelief::Factorized(a), WeightBelief::Factorized(b)) => {
                check_len(a, b)?;
                let features = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| x.divide_clamped(y, floor))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(WeightBelief::Factorized(features))
            }
            _ => Err(representation_mismatch(self, other)),
        }
    }

    /// Division routed through the divergence policy. `None` means the
    /// policy skipped the update.
    pub fn divide_guarded(
        &self,
        other: &WeightBelief,
        guard: &mut DivergenceGuard,
        context: &str,
    ) -> Result<Option<WeightBelief>> {
        match self.divide(other) {
            Ok(ratio) => Ok(Some(ratio)),
            Err(Error::Belief(err)) if err.is_divergence() => {
                let precision = err.divergent_precision().unwrap_or(f64::NAN);
                match guard.on_divergence(context, precision)? {
                    GuardAction::Clamp(floor) => self.divide_clamped(other, floor).map(Some),
                    GuardAction::Skip => Ok(None),
                }
            }
            Err(err) => Err(err),
        }
    }

    pub fn max_abs_diff(&self, other: &WeightBelief) -> f64 {
        match (self, other) {
            (WeightBelief::Dense(a), WeightBelief::Dense(b)) => a.max_abs_diff(b),
            (WeightBelief::Factorized(a), WeightBelief::Factorized(b)) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.max_abs_diff(y))
                .fold(0.0, f64::max),
            _ => f64::INFINITY,
        }
    }

    /// Posterior mean of every weight.
    pub fn means(&self) -> Result<Vec<f64>> {
        match self {
            WeightBelief::Dense(v) => Ok(v.mean()?.iter().copied().collect()),
            WeightBelief::Factorized(features) => {
                if features.iter().any(Gaussian::is_uniform) {
                    return Err(BeliefError::Improper.into());
                }
                Ok(features.iter().map(Gaussian::mean).collect())
            }
        }
    }

    pub fn to_moments(&self) -> Result<WeightMoments> {
        match self {
            WeightBelief::Dense(v) => {
                let m = v.to_moments()?;
                Ok(WeightMoments::Dense {
                    mean: m.mean,
                    covariance: m.covariance,
                })
            }
            WeightBelief::Factorized(features) => {
                let features = features
                    .iter()
                    .map(|g| {
                        if g.is_point_mass() {
                            Ok(GaussianMoments {
                                mean: g.mean(),
                                variance: 0.0,
                            })
                        } else {
                            g.to_moments()
                        }
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(WeightMoments::Factorized { features })
            }
        }
    }

    pub fn from_moments(moments: &WeightMoments) -> Result<WeightBelief> {
        match moments {
            WeightMoments::Dense { mean, covariance } => {
                let d = mean.len();
                if covariance.len() != d {
                    return Err(BeliefError::DimensionMismatch {
                        expected: d,
                        actual: covariance.len(),
                    }
                    .into());
                }
                if let Some(row) = covariance.iter().find(|row| row.len() != d) {
                    return Err(BeliefError::DimensionMismatch {
                        expected: d,
                        actual: row.len(),
                    }
                    .into());
                }
                let location = DVector::from_column_slice(mean);
                if covariance.iter().flatten().all(|c| *c == 0.0) {
                    return Ok(WeightBelief::Dense(VectorGaussian::point_mass(location)));
                }
                let cov = DMatrix::from_fn(d, d, |r, c| covariance[r][c]);
                let precision = Cholesky::new(cov).ok_or(BeliefError::Improper)?.inverse();
                Ok(WeightBelief::Dense(VectorGaussian::from_mean_and_precision(
                    location, precision,
                )?))
            }
            WeightMoments::Factorized { features } => {
                let features = features
                    .iter()
                    .map(|m| Gaussian::try_from(*m))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(WeightBelief::Factorized(features))
            }
        }
    }
}

fn check_len(a: &[Gaussian], b: &[Gaussian]) -> std::result::Result<(), BeliefError> {
    if a.len() != b.len() {
        return Err(BeliefError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// One weight belief per class, all of the same representation and size.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassWeights {
    classes: Vec<WeightBelief>,
    representation: WeightRepresentation,
    feature_count: usize,
}

impl ClassWeights {
    /// Canonical priors: `N(prior.mean, 1/prior.precision)` per feature and
    /// the anchor class pinned at the origin.
    pub fn canonical(config: &ModelConfig) -> Result<Self> {
        let classes = (0..config.class_count)
            .map(|k| {
                if k == config.anchor_class {
                    Ok(WeightBelief::anchor(config.representation, config.feature_count))
                } else {
                    WeightBelief::prior(
                        config.representation,
                        config.feature_count,
                        config.prior.mean,
                        config.prior.precision,
                    )
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            classes,
            representation: config.representation,
            feature_count: config.feature_count,
        })
    }

    /// Uniform beliefs for every class; the identity for [`ClassWeights::multiply`].
    pub fn uniform(
        class_count: usize,
        feature_count: usize,
        representation: WeightRepresentation,
    ) -> Self {
        Self {
            classes: vec![WeightBelief::uniform(representation, feature_count); class_count],
            representation,
            feature_count,
        }
    }

    pub fn from_beliefs(classes: Vec<WeightBelief>) -> Result<Self> {
        let first = classes.first().ok_or_else(|| {
            Error::InvalidConfig("class weights need at least one class".to_string())
        })?;
        let representation = first.representation();
        let feature_count = first.feature_count();
        for belief in &classes {
            if belief.representation() != representation {
                return Err(representation_mismatch(first, belief));
            }
            if belief.feature_count() != feature_count {
                return Err(BeliefError::DimensionMismatch {
                    expected: feature_count,
                    actual: belief.feature_count(),
                }
                .into());
            }
        }
        Ok(Self {
            classes,
            representation,
            feature_count,
        })
    }

    pub fn from_moments(moments: &[WeightMoments]) -> Result<Self> {
        let classes = moments
            .iter()
            .map(WeightBelief::from_moments)
            .collect::<Result<Vec<_>>>()?;
        Self::from_beliefs(classes)
    }

    pub fn to_moments(&self) -> Result<Vec<WeightMoments>> {
        self.classes.iter().map(WeightBelief::to_moments).collect()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn representation(&self) -> WeightRepresentation {
        self.representation
    }

    pub fn classes(&self) -> &[WeightBelief] {
        &self.classes
    }

    pub fn class(&self, k: usize) -> Option<&WeightBelief> {
        self.classes.get(k)
    }

    pub(crate) fn classes_mut(&mut self) -> &mut [WeightBelief] {
        &mut self.classes
    }

    fn check_shape(&self, other: &ClassWeights) -> Result<()> {
        if self.class_count() != other.class_count() {
            return Err(Error::ClassCountMismatch {
                expected: self.class_count(),
                actual: other.class_count(),
            });
        }
        Ok(())
    }

    pub fn multiply(&self, other: &ClassWeights) -> Result<ClassWeights> {
        self.check_shape(other)?;
        let classes = self
            .classes
            .iter()
            .zip(&other.classes)
            .map(|(a, b)| a.multiply(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_classes(classes))
    }

    pub fn divide(&self, other: &ClassWeights) -> Result<ClassWeights> {
        self.check_shape(other)?;
        let classes = self
            .classes
            .iter()
            .zip(&other.classes)
            .map(|(a, b)| a.divide(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_classes(classes))
    }

    /// Per-class guarded division; `None` when the policy skipped any class.
    pub fn divide_guarded(
        &self,
        other: &ClassWeights,
        guard: &mut DivergenceGuard,
        context: &str,
    ) -> Result<Option<ClassWeights>> {
        self.check_shape(other)?;
        let mut classes = Vec::with_capacity(self.classes.len());
        for (k, (a, b)) in self.classes.iter().zip(&other.classes).enumerate() {
            match a.divide_guarded(b, guard, &format!("{context} class {k}"))? {
                Some(ratio) => classes.push(ratio),
                None => return Ok(None),
            }
        }
        Ok(Some(self.with_classes(classes)))
    }

    fn with_classes(&self, classes: Vec<WeightBelief>) -> ClassWeights {
        ClassWeights {
            classes,
            representation: self.representation,
            feature_count: self.feature_count,
        }
    }

    /// Largest natural-parameter difference across all classes.
    pub fn max_abs_diff(&self, other: &ClassWeights) -> f64 {
        if self.class_count() != other.class_count() {
            return f64::INFINITY;
        }
        self.classes
            .iter()
            .zip(&other.classes)
            .map(|(a, b)| a.max_abs_diff(b))
            .fold(0.0, f64::max)
    }

    /// Posterior weight means, one row per class.
    pub fn means(&self) -> Result<Vec<Vec<f64>>> {
        self.classes.iter().map(WeightBelief::means).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(representation: WeightRepresentation) -> ModelConfig {
        ModelConfig::new(3, 2).with_representation(representation)
    }

    #[test]
    fn canonical_pins_anchor() {
        for representation in [WeightRepresentation::Dense, WeightRepresentation::Factorized] {
            let weights = ClassWeights::canonical(&config(representation)).unwrap();
            assert_eq!(weights.class_count(), 3);
            assert!(weights.class(0).unwrap().is_pinned());
            assert!(!weights.class(1).unwrap().is_pinned());
            assert_eq!(weights.means().unwrap()[0], vec![0.0, 0.0]);
        }
    }

    #[test]
    fn uniform_is_multiplicative_identity() {
        let weights = ClassWeights::canonical(&config(WeightRepresentation::Dense)).unwrap();
        let identity = ClassWeights::uniform(3, 2, WeightRepresentation::Dense);
        assert_eq!(weights.multiply(&identity).unwrap(), weights);
        assert_eq!(weights.divide(&identity).unwrap(), weights);
    }

    #[test]
    fn anchor_over_anchor_is_uniform() {
        let weights = ClassWeights::canonical(&config(WeightRepresentation::Factorized)).unwrap();
        let ratio = weights.divide(&weights).unwrap();
        assert!(ratio.classes().iter().all(WeightBelief::is_uniform));
    }

    #[test]
    fn mixed_representations_rejected() {
        let dense = WeightBelief::uniform(WeightRepresentation::Dense, 2);
        let factorized = WeightBelief::uniform(WeightRepresentation::Factorized, 2);
        assert!(dense.multiply(&factorized).is_err());
        assert!(ClassWeights::from_beliefs(vec![dense, factorized]).is_err());
    }

    #[test]
    fn class_count_mismatch_reported() {
        let a = ClassWeights::uniform(3, 2, WeightRepresentation::Dense);
        let b = ClassWeights::uniform(2, 2, WeightRepresentation::Dense);
        assert!(matches!(
            a.multiply(&b),
            Err(Error::ClassCountMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn moments_roundtrip_keeps_point_mass() {
        for representation in [WeightRepresentation::Dense, WeightRepresentation::Factorized] {
            let weights = ClassWeights::canonical(&config(representation).with_prior(0.5, 4.0))
                .unwrap();
            let moments = weights.to_moments().unwrap();
            let json = serde_json::to_string(&moments).unwrap();
            let back: Vec<WeightMoments> = serde_json::from_str(&json).unwrap();
            let restored = ClassWeights::from_moments(&back).unwrap();
            assert!(restored.class(0).unwrap().is_pinned());
            assert!(restored.max_abs_diff(&weights) < 1e-12);
        }
    }

    #[test]
    fn moments_tagged_by_representation() {
        let belief = WeightBelief::prior(WeightRepresentation::Factorized, 1, 0.0, 1.0).unwrap();
        let json = serde_json::to_value(belief.to_moments().unwrap()).unwrap();
        assert_eq!(json["representation"], "factorized");
    }
}
