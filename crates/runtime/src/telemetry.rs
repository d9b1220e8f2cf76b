//! Default tracing and metrics installation.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the default tracing subscriber: env-filter (falling back to
/// `default_filter` when `RUST_LOG` is unset) with a fmt layer. Safe to
/// call more than once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Installs the Prometheus metrics recorder and returns the handle its
/// exposition text can be rendered from.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
