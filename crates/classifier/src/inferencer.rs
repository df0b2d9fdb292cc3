use crate::backend::{ElementType, InferenceBackend};
use crate::error::ClassifierError;
use crate::model::ModelHandle;
use preprocess::PreprocessedTensor;

/// One forward pass. The tensor is checked against the model's declared
/// input before the backend sees it.
pub fn run<B: InferenceBackend>(
    handle: &ModelHandle<B>,
    tensor: &PreprocessedTensor,
) -> Result<Vec<f32>, ClassifierError> {
    let _s = common::span!("inference");

    let input = handle.input_spec();
    if input.element_type != ElementType::Float32 {
        return Err(ClassifierError::Inference(format!(
            "model input '{}' expects {:?}, got Float32",
            input.name, input.element_type
        )));
    }
    if !input.accepts(tensor.shape()) {
        return Err(ClassifierError::Inference(format!(
            "input shape mismatch: model expects {:?}, got {:?}",
            input.shape,
            tensor.shape()
        )));
    }

    let scores = handle
        .with_backend(|backend| backend.infer(tensor.view()))?
        .map_err(|e| ClassifierError::Inference(format!("{e:#}")))?;

    tracing::info!(raw = ?scores, "Raw predictions");

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TensorSpec;
    use crate::model::tests::FixedScores;
    use ndarray::Array4;
    use preprocess::INPUT_SHAPE;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn tensor() -> PreprocessedTensor {
        PreprocessedTensor::new(Array4::zeros(INPUT_SHAPE)).unwrap()
    }

    #[test]
    fn test_run_returns_backend_scores() {
        let scores = vec![0.1, 0.2, 0.3, 0.1, 0.1, 0.1, 0.1];
        let handle = ModelHandle::new(FixedScores::new(scores.clone()));
        assert_eq!(run(&handle, &tensor()).unwrap(), scores);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_raw_scores_logged_at_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let handle = ModelHandle::new(FixedScores::new(vec![0.25, 0.75]));
        tracing::subscriber::with_default(subscriber, || run(&handle, &tensor()).unwrap());

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Raw predictions"), "{logs}");
        assert!(logs.contains("[0.25, 0.75]"), "{logs}");
    }

    #[test]
    fn test_dynamic_batch_dimension_is_accepted() {
        let mut backend = FixedScores::new(vec![1.0]);
        backend.input = TensorSpec::f32("input", &[-1, 224, 224, 3]);
        let handle = ModelHandle::new(backend);
        assert!(run(&handle, &tensor()).is_ok());
    }

    #[test]
    fn test_layout_mismatch_is_rejected() {
        let mut backend = FixedScores::new(vec![1.0]);
        backend.input = TensorSpec::f32("input", &[1, 3, 224, 224]);
        let handle = ModelHandle::new(backend);

        let err = run(&handle, &tensor()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to make prediction: input shape mismatch: model expects [1, 3, 224, 224], got [1, 224, 224, 3]"
        );
    }

    #[test]
    fn test_non_float_input_is_rejected() {
        let mut backend = FixedScores::new(vec![1.0]);
        backend.input.element_type = ElementType::Other("Uint8".to_string());
        let handle = ModelHandle::new(backend);

        let err = run(&handle, &tensor()).unwrap_err();
        assert!(matches!(err, ClassifierError::Inference(_)));
        assert!(err.to_string().contains("Uint8"));
    }
}
