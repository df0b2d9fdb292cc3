use crate::config::Environment;
use tracing_subscriber::{
    Layer, Registry,
    layer::{Identity, SubscriberExt},
    util::SubscriberInitExt,
};

/// Initialize the tracing subscriber: pretty output for development, JSON for
/// production.
///
/// Uses RUST_LOG for filtering (defaults to "info"). Everything is written to
/// stderr; stdout belongs to the program's result contract.
pub fn setup_logging(environment: Environment) {
    init_subscriber(environment, Identity::new());
}

/// Install the global subscriber with an extra layer sitting directly on the
/// registry (the OpenTelemetry bridge when telemetry is enabled).
pub(crate) fn init_subscriber<L>(environment: Environment, extra: L)
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let registry = tracing_subscriber::registry().with(extra).with(env_filter);

    match environment {
        Environment::Production => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        Environment::Development => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_ansi(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}
