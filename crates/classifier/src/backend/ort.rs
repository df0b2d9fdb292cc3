use super::{BackendOptions, ElementType, ExecutionProvider, InferenceBackend, TensorSpec};
use anyhow::Context;
use ndarray::ArrayView4;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    tensor::TensorElementType,
    value::{TensorRef, ValueType},
};
use std::path::Path;

/// ONNX Runtime session over the classifier model.
pub struct OrtBackend {
    session: Session,
    input: TensorSpec,
    output: TensorSpec,
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &Path, options: &BackendOptions) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().with_name("predict").commit();

        #[cfg_attr(not(feature = "cuda"), allow(unused_mut))]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(options.intra_threads)?;

        match options.provider {
            ExecutionProvider::Cuda => {
                #[cfg(feature = "cuda")]
                {
                    use ort::execution_providers::{
                        ArenaExtendStrategy, CUDAExecutionProvider,
                    };

                    tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                    builder = builder.with_execution_providers([CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .with_arena_extend_strategy(ArenaExtendStrategy::SameAsRequested)
                        .build()
                        .error_on_failure()])?;
                }
                #[cfg(not(feature = "cuda"))]
                anyhow::bail!("CUDA execution provider requested but the 'cuda' feature is not enabled");
            }
            ExecutionProvider::Cpu => {
                tracing::info!(
                    intra_threads = options.intra_threads,
                    "Initializing ONNX Runtime with CPU execution provider"
                );
            }
        }

        let session = builder.commit_from_file(path)?;

        let input = session
            .inputs()
            .first()
            .context("model declares no inputs")
            .and_then(|outlet| tensor_spec(outlet.name(), outlet.dtype()))?;
        let output = session
            .outputs()
            .first()
            .context("model declares no outputs")
            .and_then(|outlet| tensor_spec(outlet.name(), outlet.dtype()))?;

        tracing::info!(input = %input, output = %output, "Model loaded from {}", path.display());

        Ok(Self {
            session,
            input,
            output,
        })
    }

    fn input_spec(&self) -> &TensorSpec {
        &self.input
    }

    fn output_spec(&self) -> &TensorSpec {
        &self.output
    }

    fn infer(&mut self, input: ArrayView4<'_, f32>) -> anyhow::Result<Vec<f32>> {
        let outputs = self.session.run(ort::inputs![
            self.input.name.as_str() => TensorRef::from_array_view(input)?
        ])?;

        let (_, scores) = outputs[self.output.name.as_str()].try_extract_tensor::<f32>()?;
        Ok(scores.to_vec())
    }
}

fn tensor_spec(name: &str, value_type: &ValueType) -> anyhow::Result<TensorSpec> {
    match value_type {
        ValueType::Tensor { ty, shape, .. } => Ok(TensorSpec {
            name: name.to_string(),
            shape: shape.iter().copied().collect(),
            element_type: match ty {
                TensorElementType::Float32 => ElementType::Float32,
                other => ElementType::Other(format!("{other:?}")),
            },
        }),
        other => anyhow::bail!("model port '{name}' is not a tensor: {other:?}"),
    }
}
