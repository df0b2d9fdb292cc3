pub mod config;
pub mod cpu;
pub mod enhance;
pub mod error;

use ndarray::{Array4, ArrayView4};

pub use config::{INPUT_SHAPE, INPUT_SIZE, PreprocessOptions};
pub use cpu::ImagePreprocessor;
pub use error::{EnhanceError, PreprocessError};

/// Model-ready input: `[1, 224, 224, 3]` (NHWC), standardized `f32`.
///
/// The shape is checked on construction, so holders of a `PreprocessedTensor`
/// never need to re-validate it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedTensor(Array4<f32>);

impl PreprocessedTensor {
    pub fn new(array: Array4<f32>) -> Result<Self, PreprocessError> {
        if array.shape() != INPUT_SHAPE {
            return Err(PreprocessError::ShapeMismatch {
                expected: INPUT_SHAPE.to_vec(),
                got: array.shape().to_vec(),
            });
        }
        Ok(Self(array.as_standard_layout().into_owned()))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }
}
