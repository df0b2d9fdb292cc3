use crate::PreprocessedTensor;
use crate::config::{
    CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID, IMAGENET_MEAN, IMAGENET_STD, INPUT_SIZE, PreprocessOptions,
};
use crate::enhance::{best_effort, equalize_luminance, sharpen, stretch_contrast};
use crate::error::PreprocessError;
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage, metadata::Orientation};
use ndarray::Array4;
use std::path::Path;

/// Turns an image file into the classifier's input tensor.
///
/// Stage order: decode, RGB, cubic resize to 224x224, CLAHE on luminance
/// (best effort), optional sharpen / contrast stretch, scale to [0, 1],
/// per-channel ImageNet standardization, batch dimension.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    options: PreprocessOptions,
}

impl ImagePreprocessor {
    pub fn new(options: PreprocessOptions) -> Self {
        Self { options }
    }

    pub fn preprocess(&self, path: &Path) -> Result<PreprocessedTensor, PreprocessError> {
        let _s = span!("preprocess");

        let image = decode(path)?;

        tracing::debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "Decoded image"
        );

        self.preprocess_image(image)
    }

    /// Everything after decoding, for callers that already hold an image.
    pub fn preprocess_image(
        &self,
        image: DynamicImage,
    ) -> Result<PreprocessedTensor, PreprocessError> {
        // Drops alpha, expands grayscale.
        let rgb = image.into_rgb8();
        let resized = resize(&rgb, INPUT_SIZE, INPUT_SIZE)?;
        let enhanced = self.enhance(resized);
        normalize(&enhanced)
    }

    fn enhance(&self, image: RgbImage) -> RgbImage {
        let _s = span!("enhance");

        let mut image = best_effort(image, "clahe", |img| {
            equalize_luminance(img, CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID)
        });

        if self.options.sharpen {
            image = sharpen(&image);
        }
        if self.options.stretch_contrast {
            image = stretch_contrast(&image);
        }

        image
    }
}

/// Decode by content rather than extension; a `.png` holding JPEG data still
/// decodes. The EXIF orientation tag is applied, so the result is upright.
pub fn decode(path: &Path) -> Result<DynamicImage, PreprocessError> {
    let _s = span!("decode");

    let decode_error = |source: image::ImageError| PreprocessError::Decode {
        path: path.display().to_string(),
        source,
    };

    let mut decoder = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.into_decoder())
        .map_err(decode_error)?;

    // Unreadable EXIF counts as upright.
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    image.apply_orientation(orientation);

    Ok(image)
}

/// Resize to exactly `width` x `height` with a fixed 4x4 Catmull-Rom (cubic)
/// kernel. The kernel does not widen on downscale, so there is no
/// antialiasing. Aspect ratio is not preserved.
pub fn resize(image: &RgbImage, width: u32, height: u32) -> Result<RgbImage, PreprocessError> {
    let _s = span!("resize");

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }

    let src = ImageRef::new(image.width(), image.height(), image.as_raw(), PixelType::U8x3)?;
    let mut dst = Image::new(width, height, PixelType::U8x3);

    Resizer::new().resize(
        &src,
        &mut dst,
        &ResizeOptions::new().resize_alg(ResizeAlg::Interpolation(FilterType::CatmullRom)),
    )?;

    RgbImage::from_raw(width, height, dst.buffer().to_vec()).ok_or_else(|| {
        PreprocessError::ShapeMismatch {
            expected: vec![height as usize, width as usize, 3],
            got: vec![dst.buffer().len()],
        }
    })
}

/// Scale to [0, 1], standardize per channel and add the batch axis. Layout
/// stays HWC.
pub fn normalize(image: &RgbImage) -> Result<PreprocessedTensor, PreprocessError> {
    let _s = span!("normalize");

    let width = image.width() as usize;
    let height = image.height() as usize;

    let mut output = Vec::with_capacity(width * height * 3);
    for px in image.as_raw().chunks_exact(3) {
        for c in 0..3 {
            let v = px[c] as f32 / 255.0;
            output.push((v - IMAGENET_MEAN[c]) / IMAGENET_STD[c]);
        }
    }

    let array = Array4::from_shape_vec((1, height, width, 3), output)?;
    PreprocessedTensor::new(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_output_shape_is_fixed_for_any_input_size() {
        let preprocessor = ImagePreprocessor::default();
        for (w, h) in [(512, 384), (10, 900), (224, 224), (1, 1), (1000, 3)] {
            let tensor = preprocessor
                .preprocess_image(DynamicImage::ImageRgb8(gradient_image(w, h)))
                .unwrap();
            assert_eq!(tensor.shape(), &[1, 224, 224, 3], "input {}x{}", w, h);
        }
    }

    #[test]
    fn test_alpha_and_grayscale_become_rgb() {
        let preprocessor = ImagePreprocessor::default();

        let rgba = image::RgbaImage::from_pixel(30, 20, image::Rgba([10, 20, 30, 0]));
        let tensor = preprocessor
            .preprocess_image(DynamicImage::ImageRgba8(rgba))
            .unwrap();
        assert_eq!(tensor.shape()[3], 3);

        let gray = image::GrayImage::from_pixel(30, 20, image::Luma([77]));
        let tensor = preprocessor
            .preprocess_image(DynamicImage::ImageLuma8(gray))
            .unwrap();
        assert_eq!(tensor.shape()[3], 3);
    }

    #[test]
    fn test_resize_exact_dimensions() {
        let resized = resize(&gradient_image(800, 600), 224, 224).unwrap();
        assert_eq!(resized.dimensions(), (224, 224));
    }

    #[test]
    fn test_resize_keeps_flat_color() {
        let flat = RgbImage::from_pixel(640, 480, image::Rgb([40, 90, 160]));
        let resized = resize(&flat, 224, 224).unwrap();
        for p in resized.pixels() {
            for (got, want) in p.0.iter().zip([40u8, 90, 160]) {
                assert!(got.abs_diff(want) <= 1, "{:?}", p);
            }
        }
    }

    #[test]
    fn test_resize_downscale_keeps_fine_detail() {
        // 2 px wide black and white columns, 512x384 -> 224x224.
        let stripes = RgbImage::from_fn(512, 384, |x, _| {
            let v = if (x / 2) % 2 == 0 { 255 } else { 0 };
            image::Rgb([v, v, v])
        });
        let resized = resize(&stripes, 224, 224).unwrap();

        let row: Vec<u8> = (0..224).map(|x| resized.get_pixel(x, 112)[0]).collect();
        let min = *row.iter().min().unwrap();
        let max = *row.iter().max().unwrap();
        assert!(max - min >= 240, "contrast {}..{}", min, max);
    }

    #[test]
    fn test_resize_rejects_empty_image() {
        let empty = RgbImage::new(0, 5);
        assert!(matches!(
            resize(&empty, 224, 224),
            Err(PreprocessError::EmptyImage { .. })
        ));
    }

    #[test]
    fn test_imagenet_normalization() {
        let gray = RgbImage::from_pixel(224, 224, image::Rgb([128, 128, 128]));
        let tensor = normalize(&gray).unwrap();
        let view = tensor.view();

        for c in 0..3 {
            let expected = (128.0f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            assert_eq!(view[[0, 100, 100, c]], expected);
        }

        // (0.502 - 0.485) / 0.229 ≈ 0.074, (0.502 - 0.406) / 0.225 ≈ 0.427
        assert!((view[[0, 0, 0, 0]] - 0.074).abs() < 0.01);
        assert!((view[[0, 0, 0, 2]] - 0.427).abs() < 0.01);
    }

    #[test]
    fn test_normalize_layout_is_channel_last() {
        let mut image = RgbImage::from_pixel(224, 224, image::Rgb([0, 0, 0]));
        image.put_pixel(5, 2, image::Rgb([255, 0, 0]));
        let tensor = normalize(&image).unwrap();
        let view = tensor.view();

        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert_eq!(view[[0, 2, 5, 0]], red);
        assert_eq!(view[[0, 2, 5, 1]], (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1]);
    }

    #[test]
    fn test_normalize_rejects_wrong_size() {
        let image = RgbImage::new(100, 100);
        assert!(matches!(
            normalize(&image),
            Err(PreprocessError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_preprocess_is_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mole.png");
        gradient_image(300, 200).save(&path).unwrap();

        let preprocessor = ImagePreprocessor::default();
        let first = preprocessor.preprocess(&path).unwrap();
        let second = preprocessor.preprocess(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_guesses_format_from_content() {
        let dir = tempdir().unwrap();
        let jpeg_path = dir.path().join("mole.jpg");
        gradient_image(64, 48).save(&jpeg_path).unwrap();

        let misnamed = dir.path().join("mole.png");
        std::fs::copy(&jpeg_path, &misnamed).unwrap();

        let image = decode(&misnamed).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48));
    }

    /// Minimal little-endian TIFF block holding only the Orientation tag.
    fn exif_orientation(value: u8) -> Vec<u8> {
        vec![
            0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00, // header, IFD at 8
            0x01, 0x00, // one entry
            0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, value, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, // no next IFD
        ]
    }

    #[test]
    fn test_decode_applies_exif_orientation() {
        use image::ImageEncoder;
        use image::codecs::jpeg::JpegEncoder;

        let dir = tempdir().unwrap();
        let path = dir.path().join("portrait.jpg");

        let landscape = gradient_image(40, 20);
        let mut file = std::fs::File::create(&path).unwrap();
        let mut encoder = JpegEncoder::new(&mut file);
        encoder.set_exif_metadata(exif_orientation(6)).unwrap();
        encoder
            .write_image(landscape.as_raw(), 40, 20, image::ExtendedColorType::Rgb8)
            .unwrap();
        drop(file);

        // Orientation 6 means rotate 90 degrees clockwise for display.
        let image = decode(&path).unwrap();
        assert_eq!((image.width(), image.height()), (20, 40));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode(Path::new("/no/such/file.png")).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode { .. }));
        assert!(err.to_string().starts_with("cannot decode /no/such/file.png"));
    }

    #[test]
    fn test_decode_rejects_non_image_and_truncated_files() {
        let dir = tempdir().unwrap();

        let text = dir.path().join("notes.png");
        std::fs::File::create(&text)
            .unwrap()
            .write_all(b"definitely not pixels")
            .unwrap();
        assert!(decode(&text).is_err());

        let full = dir.path().join("full.png");
        gradient_image(64, 64).save(&full).unwrap();
        let bytes = std::fs::read(&full).unwrap();
        let truncated = dir.path().join("truncated.png");
        std::fs::write(&truncated, &bytes[..40]).unwrap();
        assert!(matches!(
            decode(&truncated),
            Err(PreprocessError::Decode { .. })
        ));
    }

    #[test]
    fn test_optional_stages_change_output() {
        let source = DynamicImage::ImageRgb8(gradient_image(224, 224));

        let plain = ImagePreprocessor::default()
            .preprocess_image(source.clone())
            .unwrap();
        let sharpened = ImagePreprocessor::new(PreprocessOptions {
            sharpen: true,
            stretch_contrast: false,
        })
        .preprocess_image(source)
        .unwrap();

        assert_eq!(plain.shape(), sharpened.shape());
        assert_ne!(plain, sharpened);
    }
}
