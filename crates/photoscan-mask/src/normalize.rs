use std::path::{Path, PathBuf};

use crate::{MaskError, SourceFileType};

/// Path of the JPEG decoded from a RAW file: the RAW path with its extension replaced.
pub fn intermediate_jpeg_path(raw_path: impl AsRef<Path>) -> PathBuf {
    raw_path.as_ref().with_extension("jpg")
}

/// Decode a RAW photograph with the camera white balance and write it as JPEG.
pub fn convert_raw_to_jpeg(
    raw_path: impl AsRef<Path>,
    jpeg_path: impl AsRef<Path>,
) -> Result<(), MaskError> {
    let raw_path = raw_path.as_ref();
    let raw_error = |message: String| MaskError::RawDecode {
        path: raw_path.to_path_buf(),
        message,
    };

    let mut pipeline = imagepipe::Pipeline::new_from_file(raw_path).map_err(raw_error)?;
    let decoded = pipeline.output_8bit(None).map_err(raw_error)?;

    let image = image::RgbImage::from_raw(decoded.width as u32, decoded.height as u32, decoded.data)
        .ok_or_else(|| raw_error("decoded buffer does not match its size".to_string()))?;
    image.save(jpeg_path.as_ref())?;

    log::debug!(
        "Converted {} to {}",
        raw_path.display(),
        jpeg_path.as_ref().display()
    );
    Ok(())
}

/// An image ready to be handed to a mask backend.
///
/// When the image is an intermediate JPEG decoded from a RAW file, the JPEG is deleted on drop.
#[derive(Debug)]
pub struct NormalizedImage {
    path: PathBuf,
    intermediate: bool,
}

impl NormalizedImage {
    /// Wrap a file that is used as is.
    pub fn passthrough(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            intermediate: false,
        }
    }

    /// Wrap an intermediate file owned by this value.
    pub fn intermediate(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            intermediate: true,
        }
    }

    /// The path of the image to mask.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the image is an intermediate file.
    pub fn is_intermediate(&self) -> bool {
        self.intermediate
    }
}

impl Drop for NormalizedImage {
    fn drop(&mut self) {
        if !self.intermediate {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!(
                "Failed to remove intermediate image {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Bring a source photograph into a format the mask backends read.
pub fn normalize(
    path: impl AsRef<Path>,
    file_type: SourceFileType,
) -> Result<NormalizedImage, MaskError> {
    let path = path.as_ref();
    match file_type {
        SourceFileType::Jpg => Ok(NormalizedImage::passthrough(path)),
        SourceFileType::Nef => {
            let jpeg_path = intermediate_jpeg_path(path);
            convert_raw_to_jpeg(path, &jpeg_path)?;
            Ok(NormalizedImage::intermediate(jpeg_path))
        }
    }
}
