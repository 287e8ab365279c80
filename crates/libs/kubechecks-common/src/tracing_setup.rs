use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber.
///
/// `json_format` selects structured JSON output (for production log
/// aggregation) versus pretty-printed output (for local development).
/// Per-PR correlation is achieved by callers opening a `tracing::info_span!`
/// keyed on repo/PR number around the pipeline run, not by anything here.
pub fn setup_tracing(json_format: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,tower_http=debug,axum=debug,kubechecks=debug")
    });

    if json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
