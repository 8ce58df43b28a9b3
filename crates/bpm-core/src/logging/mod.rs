//! Structured logging for training and prediction.
//!
//! Two output modes on stderr:
//! - Human-readable console output for interactive use
//! - One JSON object per line for pipelines
//!
//! # Usage
//!
//! ```ignore
//! use bpm_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! init_logging(&LogConfig::from_env(None, None));
//!
//! let ctx = LogContext::new(generate_run_id()).with_model_id("iris");
//! bpm_core::log_event!(ctx, INFO, event_names::TRAIN_STARTED, Stage::Train, "training", items = 30);
//! ```
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! embedding application's choice.

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, LogContext, Stage};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a stderr subscriber.
///
/// Returns false when a global subscriber was already installed, in which
/// case the call has no effect.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bpm_core={}", config.level)));

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let layer = base.with_target(false).with_ansi(use_ansi);
            if config.timestamps {
                tracing_subscriber::registry().with(filter).with(layer).try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.without_time())
                    .try_init()
            }
        }
        // Event names are targets, so JSON output keeps them.
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(base.json().flatten_event(true).with_target(true))
            .try_init(),
    };
    installed.is_ok()
}

/// Initialize logging from the environment alone.
pub fn init_default_logging() -> bool {
    init_logging(&LogConfig::from_env(None, None))
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("run-{}", &uuid.simple().to_string()[..12])
}

/// Emit a `tracing` event whose target is a stable event name, tagged with
/// the context's correlation ids and a stage.
///
/// ```ignore
/// log_event!(ctx, DEBUG, event_names::TRAIN_SWEEP_DONE, Stage::Train, "sweep done", sweep = 2);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            target: $event,
            run_id = %$ctx.run_id,
            model_id = %$ctx.model_label(),
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            target: $event,
            run_id = %$ctx.run_id,
            model_id = %$ctx.model_label(),
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            target: $event,
            run_id = %$ctx.run_id,
            model_id = %$ctx.model_label(),
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
}
