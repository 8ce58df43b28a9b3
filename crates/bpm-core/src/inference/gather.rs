//! Sparse feature gather.
//!
//! Forward: a class's weight belief and an item's (indices, values) give the
//! belief of the score `sum_i values[i] * w[indices[i]]`, touching only the
//! named features. Reverse: a message on that score becomes a message on the
//! weights, kept so a later sweep can retract it.

use bpm_common::{Error, FeatureView, Result};
use bpm_math::{BeliefError, Gaussian};

use super::guard::{DivergenceGuard, GuardAction};
use super::weights::WeightBelief;

/// Message from one item's score onto one class's weights.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightMessage {
    /// Rank-one update along the item direction.
    Projected {
        precision: f64,
        mean_times_precision: f64,
    },
    /// One scalar message per touched feature.
    Features(Vec<(usize, Gaussian)>),
}

/// Belief of the score `x^T w` for one class.
pub fn score_belief(weights: &WeightBelief, features: &FeatureView<'_>) -> Result<Gaussian> {
    match weights {
        WeightBelief::Dense(belief) => Ok(belief.project(&features.indices, features.values)?),
        WeightBelief::Factorized(beliefs) => {
            let mut mean = 0.0;
            let mut variance = 0.0;
            for (&index, &x) in features.indices.iter().zip(features.values) {
                if x == 0.0 {
                    continue;
                }
                let w = beliefs.get(index).ok_or(BeliefError::IndexOutOfRange {
                    index,
                    dimension: beliefs.len(),
                })?;
                if w.is_uniform() {
                    return Ok(Gaussian::uniform());
                }
                mean += x * w.mean();
                variance += x * x * w.variance();
            }
            Ok(Gaussian::from_mean_and_variance(mean, variance)?)
        }
    }
}

/// Per-feature messages for a factorized belief.
///
/// For feature f with `x_f != 0` the message has mean
/// `(m - sum_{j != f} x_j mu_j) / x_f` and variance
/// `(v + sum_{j != f} x_j^2 v_j) / x_f^2`, where `(m, v)` are the moments of
/// the score message. Zero-valued and pinned features get no message.
pub fn feature_messages(
    cavity: &[Gaussian],
    features: &FeatureView<'_>,
    score_message: &Gaussian,
) -> std::result::Result<Vec<(usize, Gaussian)>, BeliefError> {
    if score_message.is_uniform() {
        return Ok(Vec::new());
    }
    let message_mean = score_message.mean();
    let message_variance = score_message.variance();

    let mut active = Vec::with_capacity(features.values.len());
    for (&index, &x) in features.indices.iter().zip(features.values) {
        if x == 0.0 {
            continue;
        }
        let belief = cavity.get(index).ok_or(BeliefError::IndexOutOfRange {
            index,
            dimension: cavity.len(),
        })?;
        active.push((index, x, belief.mean(), belief.variance()));
    }

    let total_mean: f64 = active.iter().map(|(_, x, mu, _)| x * mu).sum();
    let total_variance: f64 = active.iter().map(|(_, x, _, v)| x * x * v).sum();

    let mut messages = Vec::with_capacity(active.len());
    for (pos, &(index, x, mu, v)) in active.iter().enumerate() {
        if v == 0.0 {
            continue;
        }
        let (others_mean, others_variance) = if total_variance.is_finite() {
            (total_mean - x * mu, (total_variance - x * x * v).max(0.0))
        } else {
            // a uniform feature somewhere: sum the others explicitly
            active
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != pos)
                .fold((0.0, 0.0), |(m, s), (_, &(_, xj, muj, vj))| {
                    (m + xj * muj, s + xj * xj * vj)
                })
        };
        if !others_variance.is_finite() {
            continue;
        }
        let message = Gaussian::from_mean_and_variance(
            (message_mean - others_mean) / x,
            (message_variance + others_variance) / (x * x),
        )?;
        if !message.is_uniform() {
            messages.push((index, message));
        }
    }
    Ok(messages)
}

/// Turn a score message into a message on the cavity's weights.
pub fn weight_message(
    cavity: &WeightBelief,
    features: &FeatureView<'_>,
    score_message: &Gaussian,
) -> Result<WeightMessage> {
    match cavity {
        WeightBelief::Dense(_) => Ok(WeightMessage::Projected {
            precision: score_message.precision(),
            mean_times_precision: score_message.mean_times_precision(),
        }),
        WeightBelief::Factorized(beliefs) => Ok(WeightMessage::Features(feature_messages(
            beliefs,
            features,
            score_message,
        )?)),
    }
}

fn message_mismatch() -> Error {
    Error::InvalidConfig("weight message does not match the belief representation".to_string())
}

/// Multiply a weight message into a belief in place.
pub fn absorb(
    belief: &mut WeightBelief,
    features: &FeatureView<'_>,
    message: &WeightMessage,
) -> Result<()> {
    match (belief, message) {
        (
            WeightBelief::Dense(v),
            WeightMessage::Projected {
                precision,
                mean_times_precision,
            },
        ) => {
            if *precision == 0.0 {
                return Ok(());
            }
            v.absorb_projected(&features.indices, features.values, *precision, *mean_times_precision)?;
            Ok(())
        }
        (WeightBelief::Factorized(beliefs), WeightMessage::Features(messages)) => {
            let dimension = beliefs.len();
            for (index, m) in messages {
                let slot = beliefs.get_mut(*index).ok_or(BeliefError::IndexOutOfRange {
                    index: *index,
                    dimension,
                })?;
                *slot = slot.multiply(m);
            }
            Ok(())
        }
        _ => Err(message_mismatch()),
    }
}

/// Remove a previously absorbed message, giving the cavity belief.
pub fn retract(
    belief: &WeightBelief,
    features: &FeatureView<'_>,
    message: &WeightMessage,
    guard: &mut DivergenceGuard,
) -> Result<WeightBelief> {
    match (belief, message) {
        (
            WeightBelief::Dense(v),
            WeightMessage::Projected {
                precision,
                mean_times_precision,
            },
        ) => {
            let mut cavity = v.clone();
            if *precision != 0.0 {
                cavity.absorb_projected(
                    &features.indices,
                    features.values,
                    -*precision,
                    -*mean_times_precision,
                )?;
            }
            Ok(WeightBelief::Dense(cavity))
        }
        (WeightBelief::Factorized(beliefs), WeightMessage::Features(messages)) => {
            let mut cavity = beliefs.clone();
            for (index, m) in messages {
                let slot = cavity.get_mut(*index).ok_or(BeliefError::IndexOutOfRange {
                    index: *index,
                    dimension: beliefs.len(),
                })?;
                match slot.divide(m) {
                    Ok(ratio) => *slot = ratio,
                    Err(err) if err.is_divergence() => {
                        let precision = err.divergent_precision().unwrap_or(f64::NAN);
                        let context = format!("retract feature {index}");
                        match guard.on_divergence(&context, precision)? {
                            GuardAction::Clamp(floor) => *slot = slot.divide_clamped(m, floor)?,
                            GuardAction::Skip => {}
                        }
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Ok(WeightBelief::Factorized(cavity))
        }
        _ => Err(message_mismatch()),
    }
}
