use crate::config::ClassifierConfig;
use common::TelemetryGuard;
use tokio::runtime::Runtime;

pub const SERVICE_NAME: &str = "predict";

/// Logging plus, when an OTLP endpoint is configured, trace and metric
/// export. Field order matters: the guard flushes before the runtime stops.
pub struct Telemetry {
    _guard: Option<TelemetryGuard>,
    _runtime: Option<Runtime>,
}

pub fn setup_logging(config: &ClassifierConfig) {
    common::setup_logging(config.environment.clone());
}

/// Falls back to plain logging if the exporters cannot be built.
pub fn init_telemetry(config: &ClassifierConfig) -> Telemetry {
    let Some(endpoint) = config.otel_endpoint.as_deref() else {
        setup_logging(config);
        return Telemetry {
            _guard: None,
            _runtime: None,
        };
    };

    // The tonic exporters need a Tokio runtime for as long as the guard lives.
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            setup_logging(config);
            tracing::warn!(error = %e, "Cannot start Tokio runtime, telemetry export disabled");
            return Telemetry {
                _guard: None,
                _runtime: None,
            };
        }
    };

    let guard = runtime.block_on(async {
        TelemetryGuard::init(SERVICE_NAME, endpoint, config.environment.clone())
    });

    match guard {
        Ok(guard) => Telemetry {
            _guard: Some(guard),
            _runtime: Some(runtime),
        },
        Err(e) => {
            setup_logging(config);
            tracing::warn!(error = %e, endpoint, "Telemetry export disabled");
            Telemetry {
                _guard: None,
                _runtime: None,
            }
        }
    }
}
