use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("invalid pixel buffer: {0}")]
    Buffer(#[from] fast_image_resize::ImageBufferError),

    #[error("resize failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("tensor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
}

/// Failures of the best-effort enhancement stages. These are logged and
/// swallowed by the preprocessor, never returned to callers of `preprocess`.
#[derive(Error, Debug, PartialEq)]
pub enum EnhanceError {
    #[error("{width}x{height} plane does not split into a {cols}x{rows} tile grid")]
    UnevenTiles {
        width: usize,
        height: usize,
        cols: usize,
        rows: usize,
    },

    #[error("invalid clip limit {0}")]
    InvalidClipLimit(f32),

    #[error("plane length mismatch: expected {expected}, got {got}")]
    PlaneLength { expected: usize, got: usize },
}
