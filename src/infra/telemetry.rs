use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::pipeline::METRIC_PIPELINE_MS,
    cache::{METRIC_CLEAR, METRIC_FAULT, METRIC_HIT, METRIC_MISS},
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Crates whose chatter stays below `warn` unless `RUST_LOG` asks otherwise.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "h2=warn", "tower=warn"];

/// Install the process-wide tracing subscriber for the SPA service.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    tracing_subscriber::registry()
        .with(filter(logging)?)
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("tracing subscriber already set: {err}")))
}

fn filter(logging: &LoggingSettings) -> Result<EnvFilter, InfraError> {
    let mut filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    for target in QUIET_TARGETS {
        let directive = target
            .parse()
            .map_err(|err| InfraError::telemetry(format!("bad directive `{target}`: {err}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    match format {
        // Pipeline spans carry the url and host, so keep them on every line.
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(METRIC_HIT, Unit::Count, "Total number of micro-cache hits.");
        describe_counter!(
            METRIC_MISS,
            Unit::Count,
            "Total number of micro-cache misses, faulted reads included."
        );
        describe_counter!(
            METRIC_FAULT,
            Unit::Count,
            "Total number of micro-cache store faults, labelled by operation."
        );
        describe_counter!(
            METRIC_CLEAR,
            Unit::Count,
            "Total number of micro-cache namespace clears."
        );
        describe_histogram!(
            METRIC_PIPELINE_MS,
            Unit::Milliseconds,
            "SPA pipeline execution latency in milliseconds."
        );
    });
}
