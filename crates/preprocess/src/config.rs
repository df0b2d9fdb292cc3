use common::config::env_flag;

/// Square edge of the model input.
pub const INPUT_SIZE: u32 = 224;
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const CLAHE_CLIP_LIMIT: f32 = 3.0;
/// (columns, rows)
pub const CLAHE_TILE_GRID: (usize, usize) = (8, 8);

pub const SHARPEN_KERNEL: [[i32; 3]; 3] = [[-1, -1, -1], [-1, 9, -1], [-1, -1, -1]];
pub const CONTRAST_FACTOR: f32 = 1.2;

/// Optional enhancement stages applied after CLAHE. Both are off unless
/// explicitly enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessOptions {
    pub sharpen: bool,
    pub stretch_contrast: bool,
}

impl PreprocessOptions {
    pub fn from_env() -> Self {
        Self {
            sharpen: env_flag("PREPROCESS_SHARPEN"),
            stretch_contrast: env_flag("PREPROCESS_CONTRAST"),
        }
    }
}
