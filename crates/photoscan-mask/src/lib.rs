#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::MaskError;

/// Mask backend trait and its construction from the command line settings.
pub mod backend;

/// Conversion of RAW photographs to intermediate JPEG files.
pub mod normalize;

/// Local background removal with the ISNet ONNX model.
pub mod rembg;

/// Background removal with the remove.bg web service.
pub mod removebg;

/// Binary thresholding of masks.
pub mod threshold;

/// Source file types and masking methods.
pub mod types;

/// Recursive search of the photographs to mask.
pub mod walker;

/// Mask naming and the batch masking loop.
pub mod writer;

pub use backend::{build_backend, BackendConfig, MaskBackend};
pub use types::{ProcessMethod, SourceFileType};
pub use writer::{create_masks, create_masks_in_folder, mask_path_for, MaskSummary, MASK_SUFFIX};
