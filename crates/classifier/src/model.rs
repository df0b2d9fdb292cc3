use crate::backend::{BackendOptions, InferenceBackend, TensorSpec};
use crate::error::ClassifierError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A loaded model, ready for inference. Shared read-only through `Arc`; the
/// backend itself sits behind a lock because sessions need `&mut` to run.
pub struct ModelHandle<B> {
    backend: Mutex<B>,
    input: TensorSpec,
    output: TensorSpec,
}

impl<B: InferenceBackend> ModelHandle<B> {
    pub fn new(backend: B) -> Self {
        let input = backend.input_spec().clone();
        let output = backend.output_spec().clone();
        Self {
            backend: Mutex::new(backend),
            input,
            output,
        }
    }

    pub fn input_spec(&self) -> &TensorSpec {
        &self.input
    }

    pub fn output_spec(&self) -> &TensorSpec {
        &self.output
    }

    pub(crate) fn with_backend<T>(
        &self,
        f: impl FnOnce(&mut B) -> T,
    ) -> Result<T, ClassifierError> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| ClassifierError::Inference("model session lock poisoned".to_string()))?;
        Ok(f(&mut backend))
    }
}

/// Owns the process-wide model slot. The first successful `acquire` loads
/// the artifact; every later call returns the same handle. A failed load
/// leaves the slot empty so the next call retries.
pub struct ModelContext<B> {
    model_path: PathBuf,
    options: BackendOptions,
    handle: Mutex<Option<Arc<ModelHandle<B>>>>,
}

impl<B: InferenceBackend> ModelContext<B> {
    pub fn new(model_path: impl Into<PathBuf>, options: BackendOptions) -> Self {
        Self {
            model_path: model_path.into(),
            options,
            handle: Mutex::new(None),
        }
    }

    /// Context around an already-loaded model.
    pub fn preloaded(handle: ModelHandle<B>) -> Self {
        Self {
            model_path: PathBuf::new(),
            options: BackendOptions::default(),
            handle: Mutex::new(Some(Arc::new(handle))),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    pub fn acquire(&self) -> Result<Arc<ModelHandle<B>>, ClassifierError> {
        // Held across the load so concurrent first calls load once.
        let mut slot = self
            .handle
            .lock()
            .map_err(|_| ClassifierError::ModelLoad("model slot lock poisoned".to_string()))?;

        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(self.load()?);
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    fn load(&self) -> Result<ModelHandle<B>, ClassifierError> {
        let _s = common::span!("model_load");

        if !self.model_path.is_file() {
            return Err(ClassifierError::ModelLoad(format!(
                "Model not found at path: {}",
                self.model_path.display()
            )));
        }

        tracing::info!(path = %self.model_path.display(), "Loading model");
        let start = Instant::now();

        let backend = B::load_model(&self.model_path, &self.options)
            .map_err(|e| ClassifierError::ModelLoad(format!("{e:#}")))?;
        let handle = ModelHandle::new(backend);

        tracing::info!(
            input = %handle.input_spec(),
            output = %handle.output_spec(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model ready"
        );

        Ok(handle)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::Context;
    use ndarray::ArrayView4;
    use std::path::Path;
    use tempfile::tempdir;

    /// Scores come from the artifact: comma separated floats.
    pub(crate) struct FixedScores {
        pub(crate) scores: Vec<f32>,
        pub(crate) input: TensorSpec,
        pub(crate) output: TensorSpec,
    }

    impl FixedScores {
        pub(crate) fn new(scores: Vec<f32>) -> Self {
            Self {
                output: TensorSpec::f32("probs", &[1, scores.len() as i64]),
                scores,
                input: TensorSpec::f32("input", &[1, 224, 224, 3]),
            }
        }
    }

    impl InferenceBackend for FixedScores {
        fn load_model(path: &Path, _options: &BackendOptions) -> anyhow::Result<Self> {
            let text = std::fs::read_to_string(path)?;
            let scores = text
                .split(',')
                .map(|s| s.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .context("artifact is not a score list")?;
            Ok(Self::new(scores))
        }

        fn input_spec(&self) -> &TensorSpec {
            &self.input
        }

        fn output_spec(&self) -> &TensorSpec {
            &self.output
        }

        fn infer(&mut self, _input: ArrayView4<'_, f32>) -> anyhow::Result<Vec<f32>> {
            Ok(self.scores.clone())
        }
    }

    #[test]
    fn test_acquire_loads_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, "0.1,0.2,0.7").unwrap();

        let context = ModelContext::<FixedScores>::new(&path, BackendOptions::default());
        assert!(!context.is_loaded());

        let first = context.acquire().unwrap();
        // A reload would fail now.
        std::fs::remove_file(&path).unwrap();
        let second = context.acquire().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(context.is_loaded());
        assert_eq!(first.output_spec().shape, vec![1, 3]);
    }

    #[test]
    fn test_missing_artifact() {
        let context =
            ModelContext::<FixedScores>::new("/no/such/model.onnx", BackendOptions::default());
        let err = context.acquire().err().unwrap();
        assert_eq!(
            err.to_string(),
            "Failed to load model: Model not found at path: /no/such/model.onnx"
        );
        assert!(!context.is_loaded());
    }

    #[test]
    fn test_failed_load_is_retried() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, "not,a,model").unwrap();

        let context = ModelContext::<FixedScores>::new(&path, BackendOptions::default());
        let err = context.acquire().err().unwrap();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
        assert!(err.to_string().contains("artifact is not a score list"));
        assert!(!context.is_loaded());

        std::fs::write(&path, "0.5,0.5").unwrap();
        let handle = context.acquire().unwrap();
        assert_eq!(handle.output_spec().shape, vec![1, 2]);
    }

    #[test]
    fn test_preloaded_context() {
        let context = ModelContext::preloaded(ModelHandle::new(FixedScores::new(vec![1.0])));
        assert!(context.is_loaded());
        assert!(context.acquire().is_ok());
    }
}
