use std::env;
use std::str::FromStr;

use tracing::Subscriber;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

const LOG_LEVEL_VAR: &str = "SOQL_LOG_LEVEL";

fn log_level(value: Option<&str>) -> tracing::Level {
    value
        .and_then(|v| tracing::Level::from_str(v).ok())
        // use the log level from the env if there is one, otherwise use the default.
        .unwrap_or(tracing::Level::INFO)
}

/// Compact subscriber for this crate's events. The level is read from
/// `SOQL_LOG_LEVEL`.
pub fn default_tracing() -> impl Subscriber {
    let level = log_level(env::var(LOG_LEVEL_VAR).ok().as_deref());

    tracing_subscriber::fmt()
        .with_max_level(level)
        .compact()
        .finish()
        .with(default_filter_target())
}

pub fn default_filter_target<S: Subscriber>() -> impl Layer<S> {
    filter_fn(|metadata| metadata.target().starts_with("graphql_soql"))
}
