use std::path::PathBuf;

/// An error type for the masking workflow.
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    /// The input folder does not exist
    #[error("Folder not found: {0}")]
    FolderNotFound(PathBuf),

    /// The input path is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The remote method was selected without an API key
    #[error("An API key is required for the removebg method")]
    MissingApiKey,

    /// The source file type is not supported
    #[error("Unsupported file type: {0}. Expected .NEF or .jpg")]
    InvalidFileType(String),

    /// The masking method is not supported
    #[error("Unsupported method: {0}. Expected removebg or rembg")]
    InvalidMethod(String),

    /// The remote service answered with a non-success status
    #[error("Remote service failed with status {status}: {message}")]
    RemoteService {
        /// HTTP status code of the response.
        status: u16,
        /// Error message reported by the service.
        message: String,
    },

    /// The request to the remote service failed
    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to decode or encode an image
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Failed to decode a RAW image
    #[error("Failed to decode RAW image {path}: {message}")]
    RawDecode {
        /// Path of the RAW file.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// The segmentation model failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// The segmentation model returned an unexpected number of values
    #[error("Invalid model output: expected {expected} values, got {actual}")]
    InvalidModelOutput {
        /// Number of values of a single channel prediction.
        expected: usize,
        /// Number of values returned by the model.
        actual: usize,
    },

    /// Two images that must have the same size do not
    #[error("Image size mismatch: {0}x{1} vs {2}x{3}")]
    InvalidImageSize(u32, u32, u32, u32),

    /// Failed to walk the input folder
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// Failed to read or write a file
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
