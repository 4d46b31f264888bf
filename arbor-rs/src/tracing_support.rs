//! Subscriber setup for hosts that do not install their own.
//!
//! The engine always emits `tracing` events (registrations, resolution
//! outcomes, unhandled failures). This module only decides where they go.

#[cfg(feature = "subscriber")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Failure to install the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingInitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Tracing output format.
#[cfg(feature = "subscriber")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    Compact,
    /// One JSON object per event.
    Json,
}

/// Tracing configuration.
#[cfg(feature = "subscriber")]
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level filter. `None` reads `RUST_LOG`, falling back to `info`.
    pub level: Option<tracing::Level>,
    pub format: TracingFormat,
    pub timestamps: bool,
    /// Include the emitting module path.
    pub target: bool,
    pub thread_ids: bool,
}

#[cfg(feature = "subscriber")]
impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Pretty,
            timestamps: true,
            target: true,
            thread_ids: false,
        }
    }
}

/// Install a subscriber filtered by `RUST_LOG` (default `info`).
///
/// ```no_run
/// arbor::tracing_support::init_subscriber().ok();
/// ```
///
/// `RUST_LOG=arbor=debug` shows resolution outcomes and suggestion counts,
/// `RUST_LOG=arbor=trace` adds scheduling decisions.
#[cfg(feature = "subscriber")]
pub fn init_subscriber() -> Result<(), TracingInitError> {
    tracing_subscriber::registry()
        .with(env_filter(None))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|_| TracingInitError::AlreadyInstalled)
}

/// Install a subscriber described by `config`.
#[cfg(feature = "subscriber")]
pub fn init_subscriber_with_config(config: TracingConfig) -> Result<(), TracingInitError> {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.target)
        .with_thread_ids(config.thread_ids);
    let registry = tracing_subscriber::registry().with(env_filter(config.level));

    // Each combination is a distinct layer type, hence the repetition.
    let installed = match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => registry.with(layer.pretty()).try_init(),
        (TracingFormat::Pretty, false) => registry.with(layer.pretty().without_time()).try_init(),
        (TracingFormat::Compact, true) => registry.with(layer.compact()).try_init(),
        (TracingFormat::Compact, false) => {
            registry.with(layer.compact().without_time()).try_init()
        }
        (TracingFormat::Json, true) => registry.with(layer.json()).try_init(),
        (TracingFormat::Json, false) => registry.with(layer.json().without_time()).try_init(),
    };
    installed.map_err(|_| TracingInitError::AlreadyInstalled)
}

#[cfg(feature = "subscriber")]
fn env_filter(level: Option<tracing::Level>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

// No-op when the subscriber feature is disabled.
#[cfg(not(feature = "subscriber"))]
pub fn init_subscriber() -> Result<(), TracingInitError> {
    Ok(())
}
