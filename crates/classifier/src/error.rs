use preprocess::PreprocessError;
use thiserror::Error;

/// Every way a classification request can fail. The `Display` text is the
/// `error` field of the failure payload, verbatim.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Image path not provided")]
    Argument,

    #[error("Image file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to preprocess image: {0}")]
    ImageDecode(#[from] PreprocessError),

    #[error("Failed to make prediction: {0}")]
    Inference(String),

    #[error("Data consistency error: {0}")]
    DataConsistency(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClassifierError {
    /// Short stage label for logs and metric attributes.
    pub fn stage(&self) -> &'static str {
        match self {
            ClassifierError::Argument => "arguments",
            ClassifierError::FileNotFound(_) => "input",
            ClassifierError::Config(_) => "config",
            ClassifierError::ModelLoad(_) => "model_load",
            ClassifierError::ImageDecode(_) => "preprocess",
            ClassifierError::Inference(_) => "inference",
            ClassifierError::DataConsistency(_) => "ranking",
            ClassifierError::Internal(_) => "internal",
        }
    }
}
