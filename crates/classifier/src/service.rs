use crate::{
    backend::InferenceBackend,
    catalog::LesionClass,
    error::ClassifierError,
    inferencer,
    model::ModelContext,
    ranking::{RankedPrediction, TOP_K, rank},
    response::{InferenceResult, format_failure, format_success},
};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use preprocess::ImagePreprocessor;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Instant;

struct ServiceMetrics {
    requests: Counter<u64>,
    failures: Counter<u64>,
    duration: Histogram<f64>,
}

fn init_metrics(meter_name: &'static str) -> ServiceMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0, 10.0,
    ];
    ServiceMetrics {
        requests: meter
            .u64_counter("classifier_requests_total")
            .with_description("Total classification requests")
            .build(),
        failures: meter
            .u64_counter("classifier_failures_total")
            .with_description("Failed classification requests by stage")
            .build(),
        duration: meter
            .f64_histogram("classifier_duration_seconds")
            .with_description("Time to classify one image (model load + preprocess + infer + rank)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
    }
}

/// The single image path in `args`, which excludes the program name. Paths
/// need not be valid UTF-8.
pub fn image_path_arg<S: AsRef<OsStr>>(args: &[S]) -> Result<&Path, ClassifierError> {
    match args {
        [path] => Ok(Path::new(path.as_ref())),
        _ => Err(ClassifierError::Argument),
    }
}

/// Runs one request end to end and turns every outcome into an
/// `InferenceResult`.
pub struct ClassifierService<B: InferenceBackend> {
    context: ModelContext<B>,
    preprocessor: ImagePreprocessor,
    metrics: ServiceMetrics,
}

impl<B: InferenceBackend> ClassifierService<B> {
    pub fn new(context: ModelContext<B>, preprocessor: ImagePreprocessor) -> Self {
        Self {
            context,
            preprocessor,
            metrics: init_metrics("classifier"),
        }
    }

    pub fn context(&self) -> &ModelContext<B> {
        &self.context
    }

    /// `args` excludes the program name and must hold exactly one image path.
    pub fn classify_args<S: AsRef<OsStr>>(&self, args: &[S]) -> InferenceResult {
        self.metrics.requests.add(1, &[]);

        let path = match image_path_arg(args) {
            Ok(path) => path,
            Err(e) => return self.fail(e),
        };

        let start = Instant::now();
        match self.classify(path) {
            Ok(predictions) => {
                let elapsed = start.elapsed().as_secs_f64();
                self.metrics.duration.record(elapsed, &[]);
                tracing::info!(elapsed_s = elapsed, "Classification complete");
                format_success(predictions, elapsed)
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn classify(&self, path: &Path) -> Result<Vec<RankedPrediction>, ClassifierError> {
        let span = tracing::info_span!("classify", path = %path.display());
        let _enter = span.enter();

        if !path.exists() {
            return Err(ClassifierError::FileNotFound(path.display().to_string()));
        }

        let handle = self.context.acquire()?;
        let tensor = self.preprocessor.preprocess(path)?;
        let scores = inferencer::run(&handle, &tensor)?;
        let top = rank(&scores, &LesionClass::ALL, TOP_K)?;

        tracing::info!(top = ?top, "Top predictions");

        Ok(RankedPrediction::from_scores(&top))
    }

    fn fail(&self, error: ClassifierError) -> InferenceResult {
        tracing::error!(stage = error.stage(), error = %error, "Classification failed");
        self.metrics
            .failures
            .add(1, &[KeyValue::new("stage", error.stage())]);
        format_failure(&error)
    }
}
