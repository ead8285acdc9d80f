//! # ISNet background removal
//!
//! Local segmentation with the ISNet general-use ONNX model.
//!
//! Pre-requisites:
//! - `ORT_DYLIB_PATH` environment variable must point to the ONNX Runtime dylib.

use std::path::{Path, PathBuf};

use image::{imageops::FilterType, GrayImage, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};

use crate::threshold::{binarize, threshold_binary};
use crate::{MaskBackend, MaskError};

/// Side of the square model input.
pub const ISNET_INPUT_SIZE: u32 = 1024;

/// File name of the model in the model folder.
pub const ISNET_MODEL_NAME: &str = "isnet-general-use.onnx";

/// Download location of the model.
pub const ISNET_MODEL_URL: &str =
    "https://github.com/danielgatis/rembg/releases/download/v0.0.0/isnet-general-use.onnx";

const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const STD: [f32; 3] = [1.0, 1.0, 1.0];

/// Default location of the model: `$U2NET_HOME`, else `.u2net` under the data or home folder.
pub fn default_model_path() -> PathBuf {
    let folder = match std::env::var_os("U2NET_HOME") {
        Some(home) => PathBuf::from(home),
        None => std::env::var_os("XDG_DATA_HOME")
            .or_else(|| std::env::var_os("HOME"))
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".u2net"),
    };
    folder.join(ISNET_MODEL_NAME)
}

/// Download a file over HTTP and write it to `dst`, creating the parent folders.
///
/// The body is streamed into a temporary file next to `dst`, which is only renamed once the
/// download completes.
pub fn download_model(url: &str, dst: impl AsRef<Path>) -> Result<(), MaskError> {
    let dst = dst.as_ref();
    log::info!("Downloading {} to {}", url, dst.display());

    let mut response = reqwest::blocking::get(url)?.error_for_status()?;
    write_atomically(dst, |file| {
        response.copy_to(file)?;
        Ok(())
    })
}

// a failed write leaves `dst` untouched, the temporary file is removed on drop
fn write_atomically(
    dst: &Path,
    write: impl FnOnce(&mut std::fs::File) -> Result<(), MaskError>,
) -> Result<(), MaskError> {
    let folder = match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(folder)?;

    let mut tmp = tempfile::NamedTempFile::new_in(folder)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dst).map_err(|e| e.error)?;
    Ok(())
}

/// Turn an image into the normalized NCHW input of the model.
///
/// The image is resized to the model input, divided by its maximum value and standardized
/// per channel.
pub fn preprocess(image: &RgbImage) -> Vec<f32> {
    let resized = image::imageops::resize(
        image,
        ISNET_INPUT_SIZE,
        ISNET_INPUT_SIZE,
        FilterType::Lanczos3,
    );

    let max_value = resized.as_raw().iter().copied().max().unwrap_or(0).max(1) as f32;
    let plane = (ISNET_INPUT_SIZE * ISNET_INPUT_SIZE) as usize;

    let mut input = vec![0.0f32; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            input[c * plane + i] = (pixel[c] as f32 / max_value - MEAN[c]) / STD[c];
        }
    }
    input
}

/// Turn the first channel of the model output into an 8 bit alpha mask of the given size.
///
/// The prediction is min-max normalized before being scaled to `[0, 255]`.
pub fn postprocess(prediction: &[f32], width: u32, height: u32) -> Result<GrayImage, MaskError> {
    let plane = (ISNET_INPUT_SIZE * ISNET_INPUT_SIZE) as usize;
    if prediction.len() < plane {
        return Err(MaskError::InvalidModelOutput {
            expected: plane,
            actual: prediction.len(),
        });
    }
    let prediction = &prediction[..plane];

    let (min, max) = prediction
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let range = if max > min { max - min } else { 1.0 };

    let data = prediction
        .iter()
        .map(|v| ((v - min) / range * 255.0) as u8)
        .collect::<Vec<_>>();
    let mask = GrayImage::from_raw(ISNET_INPUT_SIZE, ISNET_INPUT_SIZE, data).ok_or(
        MaskError::InvalidModelOutput {
            expected: plane,
            actual: prediction.len(),
        },
    )?;

    Ok(image::imageops::resize(
        &mask,
        width,
        height,
        FilterType::Lanczos3,
    ))
}

// grayscale erosion (min) or dilation (max) over the 3x3 cross, ignoring pixels outside the image
fn cross_filter(src: &GrayImage, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = src.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut value = src.get_pixel(x, y)[0];
        if x > 0 {
            value = pick(value, src.get_pixel(x - 1, y)[0]);
        }
        if x + 1 < width {
            value = pick(value, src.get_pixel(x + 1, y)[0]);
        }
        if y > 0 {
            value = pick(value, src.get_pixel(x, y - 1)[0]);
        }
        if y + 1 < height {
            value = pick(value, src.get_pixel(x, y + 1)[0]);
        }
        image::Luma([value])
    })
}

/// Clean a soft mask: opening with a 3x3 cross, gaussian blur and binarization at 127.
pub fn post_process_mask(mask: &GrayImage) -> Result<GrayImage, MaskError> {
    let opened = cross_filter(&cross_filter(mask, u8::min), u8::max);
    let blurred = imageproc::filter::gaussian_blur_f32(&opened, 2.0);

    let mut binary = GrayImage::new(mask.width(), mask.height());
    threshold_binary(&blurred, &mut binary, 126, u8::MAX)?;
    Ok(binary)
}

fn inference_error(e: impl std::fmt::Display) -> MaskError {
    MaskError::Inference(e.to_string())
}

/// Mask backend running the ISNet model with ONNX Runtime.
pub struct RembgBackend {
    session: Session,
    input_name: String,
}

impl RembgBackend {
    /// Creates a new backend from an ONNX model file.
    ///
    /// # Arguments
    ///
    /// * `model_path` - Path to the ISNet model file.
    /// * `num_threads` - Number of threads to use for inference.
    pub fn new(model_path: impl AsRef<Path>, num_threads: usize) -> Result<Self, MaskError> {
        let session = Session::builder()
            .map_err(inference_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(inference_error)?
            .with_intra_threads(num_threads)
            .map_err(inference_error)?
            .commit_from_file(model_path.as_ref())
            .map_err(inference_error)?;

        // the model has a single image input
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.to_string())
            .ok_or_else(|| MaskError::Inference("the model has no input".to_string()))?;

        log::info!(
            "Loaded segmentation model {} with input {}",
            model_path.as_ref().display(),
            input_name
        );

        Ok(Self {
            session,
            input_name,
        })
    }

    /// Creates a new backend, downloading the model first when the file is missing.
    pub fn from_path_or_download(
        model_path: impl AsRef<Path>,
        num_threads: usize,
    ) -> Result<Self, MaskError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            download_model(ISNET_MODEL_URL, model_path)?;
        }
        Self::new(model_path, num_threads)
    }

    /// Run the model on a preprocessed input and return the raw prediction.
    pub fn predict(&mut self, input: Vec<f32>) -> Result<Vec<f32>, MaskError> {
        let size = ISNET_INPUT_SIZE as usize;
        let ort_tensor = ort::value::Tensor::from_array(([1usize, 3, size, size], input))
            .map_err(inference_error)?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => ort_tensor])
            .map_err(inference_error)?;

        let (_, prediction) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        Ok(prediction.to_vec())
    }
}

impl MaskBackend for RembgBackend {
    fn process(&mut self, path: &Path) -> Result<GrayImage, MaskError> {
        let image = image::open(path)?.to_rgb8();
        let (width, height) = image.dimensions();

        let prediction = self.predict(preprocess(&image))?;
        let alpha = postprocess(&prediction, width, height)?;
        let mask = post_process_mask(&alpha)?;

        Ok(binarize(&mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_layout() {
        let image = RgbImage::from_pixel(20, 10, image::Rgb([0, 128, 255]));
        let input = preprocess(&image);

        let plane = (ISNET_INPUT_SIZE * ISNET_INPUT_SIZE) as usize;
        assert_eq!(input.len(), 3 * plane);
        // every channel is constant, divided by the image max and shifted by the mean
        assert!((input[0] + 0.5).abs() < 1e-6);
        assert!((input[plane] - (128.0 / 255.0 - 0.5)).abs() < 1e-6);
        assert!((input[2 * plane + 77] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_postprocess_normalizes_and_resizes() -> Result<(), MaskError> {
        let size = ISNET_INPUT_SIZE as usize;
        // left half background, right half foreground
        let prediction = (0..size * size)
            .map(|i| if i % size < size / 2 { -3.0 } else { 7.0 })
            .collect::<Vec<f32>>();

        let alpha = postprocess(&prediction, 64, 48)?;
        assert_eq!(alpha.dimensions(), (64, 48));
        assert_eq!(alpha.get_pixel(2, 24)[0], 0);
        assert_eq!(alpha.get_pixel(61, 24)[0], 255);
        Ok(())
    }

    #[test]
    fn test_postprocess_short_output() {
        assert!(matches!(
            postprocess(&[0.0; 16], 4, 4),
            Err(MaskError::InvalidModelOutput { actual: 16, .. })
        ));
    }

    #[test]
    fn test_post_process_mask_removes_speckles() -> Result<(), MaskError> {
        let mut mask = GrayImage::new(40, 40);
        for y in 10..30 {
            for x in 10..30 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        // an isolated pixel is removed by the opening
        mask.put_pixel(2, 2, image::Luma([255]));

        let cleaned = post_process_mask(&mask)?;
        assert_eq!(cleaned.get_pixel(2, 2)[0], 0);
        assert_eq!(cleaned.get_pixel(20, 20)[0], 255);
        assert_eq!(cleaned.get_pixel(35, 35)[0], 0);
        assert!(cleaned.as_raw().iter().all(|v| *v == 0 || *v == 255));
        Ok(())
    }

    #[test]
    fn test_write_atomically() -> Result<(), MaskError> {
        use std::io::Write;

        let dir = tempfile::tempdir()?;
        let dst = dir.path().join("models").join(ISNET_MODEL_NAME);

        write_atomically(&dst, |file| {
            file.write_all(b"onnx")?;
            Ok(())
        })?;
        assert_eq!(std::fs::read(&dst)?, b"onnx");
        assert_eq!(std::fs::read_dir(dir.path().join("models"))?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_interrupted_write_leaves_no_model() -> Result<(), MaskError> {
        use std::io::Write;

        let dir = tempfile::tempdir()?;
        let dst = dir.path().join(ISNET_MODEL_NAME);

        let result = write_atomically(&dst, |file| {
            file.write_all(b"partial")?;
            Err(MaskError::Inference("connection reset".to_string()))
        });
        assert!(result.is_err());
        assert!(!dst.exists());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_opening_keeps_soft_values() {
        // a uniform soft mask is left unchanged by the opening
        let mask = GrayImage::from_pixel(5, 5, image::Luma([40]));
        let opened = cross_filter(&cross_filter(&mask, u8::min), u8::max);
        assert!(opened.as_raw().iter().all(|v| *v == 40));
    }
}
