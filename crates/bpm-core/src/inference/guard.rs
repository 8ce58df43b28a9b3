//! Divergence guard for precision updates.
//!
//! Every message or ratio whose precision comes out negative or non-finite
//! passes through a [`DivergenceGuard`], which counts the event, logs it at
//! warn level, and tells the caller what to do under the model's policy.

use bpm_common::{Error, Result};
use bpm_config::{DivergenceConfig, DivergencePolicy};

use crate::logging::{event_names, LogContext, Stage};

/// What the caller should do with a guarded update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GuardAction {
    /// Replace the update with one of this precision at its own mean.
    Clamp(f64),
    /// Drop the update.
    Skip,
}

/// Per-call divergence bookkeeping.
#[derive(Debug, Clone)]
pub struct DivergenceGuard {
    policy: DivergencePolicy,
    precision_floor: f64,
    events: usize,
    ctx: LogContext,
    stage: Stage,
}

impl DivergenceGuard {
    pub fn new(config: &DivergenceConfig, ctx: &LogContext, stage: Stage) -> Self {
        Self {
            policy: config.policy,
            precision_floor: config.precision_floor,
            events: 0,
            ctx: ctx.clone(),
            stage,
        }
    }

    pub fn policy(&self) -> DivergencePolicy {
        self.policy
    }

    pub fn precision_floor(&self) -> f64 {
        self.precision_floor
    }

    /// Number of guarded events seen so far.
    pub fn events(&self) -> usize {
        self.events
    }

    /// Record a divergence event at `context` with the offending precision.
    pub fn on_divergence(&mut self, context: &str, precision: f64) -> Result<GuardAction> {
        self.events += 1;
        let policy = format!("{:?}", self.policy).to_lowercase();
        crate::log_event!(
            self.ctx,
            WARN,
            event_names::TRAIN_GUARDED_UPDATE,
            self.stage,
            "non-positive precision guarded",
            at = context,
            precision = precision,
            policy = policy.as_str()
        );
        match self.policy {
            DivergencePolicy::Clamp => Ok(GuardAction::Clamp(self.precision_floor)),
            DivergencePolicy::Skip => Ok(GuardAction::Skip),
            DivergencePolicy::Fail => Err(Error::InferenceDivergence {
                context: context.to_string(),
                precision,
            }),
        }
    }
}

/// True when a message precision cannot be applied as is.
pub fn is_divergent(precision: f64) -> bool {
    precision < 0.0 || !precision.is_finite()
}
