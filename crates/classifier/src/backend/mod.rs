use ndarray::ArrayView4;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "ort-backend")]
pub mod ort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
}

impl FromStr for ExecutionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "cuda" | "gpu" => Ok(ExecutionProvider::Cuda),
            other => anyhow::bail!("unknown execution provider '{other}' (expected cpu or cuda)"),
        }
    }
}

/// Runtime knobs handed to the backend when a model is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    pub intra_threads: usize,
    pub provider: ExecutionProvider,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            intra_threads: 4,
            provider: ExecutionProvider::Cpu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Float32,
    Other(String),
}

/// Name, shape and element type of one model input or output. Dimensions
/// `<= 0` are dynamic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<i64>,
    pub element_type: ElementType,
}

impl TensorSpec {
    pub fn f32(name: impl Into<String>, shape: &[i64]) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            element_type: ElementType::Float32,
        }
    }

    /// True if a tensor of `shape` fits this descriptor, treating dynamic
    /// dimensions as wildcards.
    pub fn accepts(&self, shape: &[usize]) -> bool {
        self.shape.len() == shape.len()
            && self
                .shape
                .iter()
                .zip(shape)
                .all(|(&want, &got)| want <= 0 || want as usize == got)
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} {:?}", self.name, self.shape, self.element_type)
    }
}

/// A loaded model that maps one preprocessed image to per-class scores.
pub trait InferenceBackend: Send {
    fn load_model(path: &Path, options: &BackendOptions) -> anyhow::Result<Self>
    where
        Self: Sized;

    fn input_spec(&self) -> &TensorSpec;

    fn output_spec(&self) -> &TensorSpec;

    /// Run the model on an NHWC `f32` batch of one, returning the flattened
    /// first output.
    fn infer(&mut self, input: ArrayView4<'_, f32>) -> anyhow::Result<Vec<f32>>;
}
