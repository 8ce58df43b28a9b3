//! Categorical distribution over class indices.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::stable::probs_from_log_weights;

/// Probability vector over `0..len()` that sums to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrete {
    probs: Vec<f64>,
}

impl Discrete {
    pub fn uniform(len: usize) -> Self {
        let p = if len == 0 { 0.0 } else { 1.0 / len as f64 };
        Self {
            probs: vec![p; len],
        }
    }

    /// Normalize non-negative weights. Returns `None` for empty input, a
    /// negative or non-finite weight, or an all-zero vector.
    pub fn from_probs(weights: Vec<f64>) -> Option<Self> {
        if weights.is_empty() || weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return None;
        }
        Some(Self {
            probs: weights.into_iter().map(|w| w / sum).collect(),
        })
    }

    /// Normalize unnormalized log weights. Returns `None` for empty or NaN input.
    pub fn from_log_weights(log_weights: &[f64]) -> Option<Self> {
        if log_weights.is_empty() || log_weights.iter().any(|w| w.is_nan()) {
            return None;
        }
        Some(Self {
            probs: probs_from_log_weights(log_weights),
        })
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    pub fn prob(&self, index: usize) -> f64 {
        self.probs.get(index).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Most probable index; ties resolve to the lowest index.
    pub fn mode(&self) -> usize {
        let mut best = 0;
        for (i, p) in self.probs.iter().enumerate() {
            if *p > self.probs[best] {
                best = i;
            }
        }
        best
    }

    /// Shannon entropy in nats.
    pub fn entropy(&self) -> f64 {
        self.probs
            .iter()
            .filter(|p| **p > 0.0)
            .map(|p| -p * p.ln())
            .sum()
    }
}

impl fmt::Display for Discrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Discrete(")?;
        for (i, p) in self.probs.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{p:.4}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sums_to_one() {
        let d = Discrete::uniform(4);
        assert_eq!(d.len(), 4);
        assert!((d.probs().iter().sum::<f64>() - 1.0).abs() < 1e-15);
        assert!((d.entropy() - 4.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn from_probs_validates() {
        assert!(Discrete::from_probs(vec![]).is_none());
        assert!(Discrete::from_probs(vec![0.0, 0.0]).is_none());
        assert!(Discrete::from_probs(vec![1.0, -0.5]).is_none());
        let d = Discrete::from_probs(vec![1.0, 3.0]).unwrap();
        assert!((d.prob(1) - 0.75).abs() < 1e-15);
        assert_eq!(d.prob(7), 0.0);
    }

    #[test]
    fn mode_prefers_lowest_on_ties() {
        let d = Discrete::from_probs(vec![0.4, 0.4, 0.2]).unwrap();
        assert_eq!(d.mode(), 0);
        let d = Discrete::from_log_weights(&[-2.0, -0.5, -1.0]).unwrap();
        assert_eq!(d.mode(), 1);
    }

    #[test]
    fn display_is_compact() {
        let d = Discrete::from_probs(vec![1.0, 1.0]).unwrap();
        assert_eq!(d.to_string(), "Discrete(0.5000 0.5000)");
    }
}
