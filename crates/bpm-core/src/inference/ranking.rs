//! Ranking constraint factor.
//!
//! For a labeled item of class `c`, enforces `y_c > y_k` for every `k != c`
//! where `y_k = s_k + noise`. Pairs are processed in ascending `k`; the
//! winner's marginal after each pair is the cavity for the next one
//! (assumed-density filtering across the K-1 pairs). Each pair matches the
//! moments of the difference truncated to `d > 0`.
//!
//! Mixture variant: an unlabeled item runs the factor once per hypothesized
//! winner and mixes the outcomes by evidence.

use bpm_common::{Error, Result};
use bpm_math::{normal_log_cdf, truncation_factors, Discrete, Gaussian, PRECISION_REL_TOL};

use super::guard::{is_divergent, DivergenceGuard, GuardAction};

/// Messages from the constraint onto every class's noisy score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingOutcome {
    pub winner: usize,
    /// One message per class; uniform for classes no pair touched.
    pub messages: Vec<Gaussian>,
    /// `sum log Phi(z)` over the pairs.
    pub log_evidence: f64,
}

impl RankingOutcome {
    /// Push the noisy-score messages back through the noise onto the scores.
    pub fn score_messages(&self, noise_variance: f64) -> Vec<Gaussian> {
        self.messages
            .iter()
            .map(|m| m.add_variance(noise_variance))
            .collect()
    }
}

/// Beliefs of `y_k = s_k + noise`.
pub fn noisy_scores(scores: &[Gaussian], noise_variance: f64) -> Vec<Gaussian> {
    scores.iter().map(|s| s.add_variance(noise_variance)).collect()
}

/// One side of a pair update.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Side {
    mean: f64,
    variance: f64,
}

/// Message for one side of a truncated difference.
///
/// With `denom = var_d - v * w`, the message precision is `w / denom` and its
/// precision-times-mean `tau * m + sign * lambda * sigma_d / denom`. A
/// non-positive `denom` is a non-positive tilted variance.
fn side_message(
    cavity: Side,
    sign: f64,
    var_d: f64,
    lambda: f64,
    w: f64,
    guard: &mut DivergenceGuard,
    context: &str,
) -> Result<Gaussian> {
    let sigma_d = var_d.sqrt();
    let denom = var_d - cavity.variance * w;
    let tilted_mean = cavity.mean + sign * cavity.variance * lambda / sigma_d;

    let denom_vanishes = denom <= var_d * PRECISION_REL_TOL;
    let precision = w / denom;
    if denom_vanishes || is_divergent(precision) {
        let reported = if denom_vanishes { -w / var_d } else { precision };
        return match guard.on_divergence(context, reported)? {
            GuardAction::Clamp(floor) => {
                let location = if tilted_mean.is_finite() { tilted_mean } else { cavity.mean };
                Ok(Gaussian::from_mean_and_precision(location, floor)?)
            }
            GuardAction::Skip => Ok(Gaussian::uniform()),
        };
    }
    let mean_times_precision = precision * cavity.mean + sign * lambda * sigma_d / denom;
    if !mean_times_precision.is_finite() {
        return match guard.on_divergence(context, precision)? {
            GuardAction::Clamp(floor) => Ok(Gaussian::from_mean_and_precision(cavity.mean, floor)?),
            GuardAction::Skip => Ok(Gaussian::uniform()),
        };
    }
    // w == 0 means the constraint is already satisfied: the uniform message
    Ok(Gaussian::from_natural(precision, mean_times_precision)?)
}

/// Enforce "`winner` has the largest noisy score".
pub fn constrain_winner(
    noisy: &[Gaussian],
    winner: usize,
    guard: &mut DivergenceGuard,
) -> Result<RankingOutcome> {
    let class_count = noisy.len();
    if winner >= class_count {
        return Err(Error::ClassCountMismatch {
            expected: class_count,
            actual: winner + 1,
        });
    }

    let mut messages = vec![Gaussian::uniform(); class_count];
    let mut winner_marginal = noisy[winner];
    let mut log_evidence = 0.0;

    for (k, loser) in noisy.iter().enumerate() {
        if k == winner {
            continue;
        }
        let context = format!("winner {winner} over class {k}");
        let var_d = winner_marginal.variance() + loser.variance();
        if !(var_d > 0.0) || !var_d.is_finite() {
            // no usable difference belief: nothing to send for this pair
            guard.on_divergence(&context, 1.0 / var_d)?;
            continue;
        }
        let mean_d = winner_marginal.mean() - loser.mean();
        let z = mean_d / var_d.sqrt();
        let (lambda, w) = truncation_factors(z);
        log_evidence += normal_log_cdf(z);

        let winner_side = Side {
            mean: winner_marginal.mean(),
            variance: winner_marginal.variance(),
        };
        let loser_side = Side {
            mean: loser.mean(),
            variance: loser.variance(),
        };
        let to_winner = side_message(winner_side, 1.0, var_d, lambda, w, guard, &context)?;
        let to_loser = side_message(loser_side, -1.0, var_d, lambda, w, guard, &context)?;

        winner_marginal = winner_marginal.multiply(&to_winner);
        messages[winner] = messages[winner].multiply(&to_winner);
        messages[k] = to_loser;
    }

    Ok(RankingOutcome {
        winner,
        messages,
        log_evidence,
    })
}

/// Evidence-weighted mixture over every hypothesized winner.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureOutcome {
    pub distribution: Discrete,
    /// Moment-matched posterior score belief per class.
    pub scores: Vec<Gaussian>,
}

/// Run the constraint once per class and mix by `prior_c * exp(log Z_c)`.
///
/// `log_prior` holds one log prior weight per class.
pub fn winner_mixture(
    scores: &[Gaussian],
    noise_variance: f64,
    log_prior: &[f64],
    guard: &mut DivergenceGuard,
) -> Result<MixtureOutcome> {
    let class_count = scores.len();
    if log_prior.len() != class_count {
        return Err(Error::ClassCountMismatch {
            expected: class_count,
            actual: log_prior.len(),
        });
    }
    let noisy = noisy_scores(scores, noise_variance);

    let mut log_weights = Vec::with_capacity(class_count);
    let mut posteriors = Vec::with_capacity(class_count);
    for winner in 0..class_count {
        let outcome = constrain_winner(&noisy, winner, guard)?;
        log_weights.push(log_prior[winner] + outcome.log_evidence);
        let posterior: Vec<Gaussian> = scores
            .iter()
            .zip(outcome.score_messages(noise_variance))
            .map(|(s, m)| s.multiply(&m))
            .collect();
        posteriors.push(posterior);
    }

    let distribution =
        Discrete::from_log_weights(&log_weights).unwrap_or_else(|| Discrete::uniform(class_count));

    let mut mixed = Vec::with_capacity(class_count);
    for k in 0..class_count {
        let mut mean = 0.0;
        let mut second = 0.0;
        for (winner, posterior) in posteriors.iter().enumerate() {
            let p = distribution.prob(winner);
            if p == 0.0 {
                continue;
            }
            let belief = posterior[k];
            let m = belief.mean();
            mean += p * m;
            second += p * (belief.variance() + m * m);
        }
        let variance = (second - mean * mean).max(0.0);
        mixed.push(Gaussian::from_mean_and_variance(mean, variance)?);
    }

    Ok(MixtureOutcome {
        distribution,
        scores: mixed,
    })
}
