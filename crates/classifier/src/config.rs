use crate::backend::{BackendOptions, ExecutionProvider};
use common::config::env_or;
use preprocess::PreprocessOptions;
use std::env;
use std::path::PathBuf;

pub use common::Environment;

pub const MODEL_DIR: &str = "model";
pub const MODEL_FILE_NAME: &str = "skin_cancer_model.onnx";

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub environment: Environment,
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub backend: BackendOptions,
    pub preprocess: PreprocessOptions,
    pub otel_endpoint: Option<String>,
}

impl ClassifierConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_model_path());

        let model_url = non_empty_var("MODEL_URL");

        let intra_threads = env_or("INTRA_THREADS", 4usize).max(1);

        let provider = match non_empty_var("EXECUTION_PROVIDER") {
            Some(value) => value.parse()?,
            None => ExecutionProvider::Cpu,
        };

        let otel_endpoint = non_empty_var("OTEL_EXPORTER_OTLP_ENDPOINT");

        Ok(Self {
            environment,
            model_path,
            model_url,
            backend: BackendOptions {
                intra_threads,
                provider,
            },
            preprocess: PreprocessOptions::from_env(),
            otel_endpoint,
        })
    }
}

/// `model/skin_cancer_model.onnx` next to the running executable, so the
/// binary works regardless of the caller's working directory.
pub fn default_model_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        .unwrap_or_default()
        .join(MODEL_DIR)
        .join(MODEL_FILE_NAME)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
