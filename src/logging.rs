//! Tracing setup
//!
//! `RUST_LOG` wins when set; otherwise `LOG_LEVEL` applies to this crate and
//! dependencies log at info.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("agrosense={},info", log_level).into())
}

/// Install the global subscriber
pub fn init(log_level: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(env_filter(log_level));

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}
