use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::rembg::{default_model_path, RembgBackend};
use crate::removebg::RemoveBgBackend;
use crate::{MaskError, ProcessMethod};

/// A strategy producing the foreground mask of a photograph.
pub trait MaskBackend {
    /// Produce a single channel `{0, 255}` mask with the same size as the image at `path`.
    fn process(&mut self, path: &Path) -> Result<GrayImage, MaskError>;
}

/// Settings used to build a mask backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// The backend to build.
    pub method: ProcessMethod,
    /// API key of the remote service.
    pub api_key: Option<String>,
    /// Path of the local segmentation model, downloaded when missing.
    pub model_path: Option<PathBuf>,
    /// Number of threads of the local model.
    pub num_threads: usize,
}

impl BackendConfig {
    /// Create a configuration for `method` with no key and the default model location.
    pub fn new(method: ProcessMethod) -> Self {
        Self {
            method,
            api_key: None,
            model_path: None,
            num_threads: 4,
        }
    }

    /// Check the configuration before any file is processed.
    pub fn validate(&self) -> Result<(), MaskError> {
        if self.method == ProcessMethod::RemoveBg
            && self.api_key.as_deref().is_none_or(|key| key.trim().is_empty())
        {
            return Err(MaskError::MissingApiKey);
        }
        Ok(())
    }
}

/// Build the backend selected by the configuration.
pub fn build_backend(config: &BackendConfig) -> Result<Box<dyn MaskBackend>, MaskError> {
    config.validate()?;

    match config.method {
        ProcessMethod::RemoveBg => {
            let api_key = config.api_key.clone().ok_or(MaskError::MissingApiKey)?;
            Ok(Box::new(RemoveBgBackend::new(api_key)?))
        }
        ProcessMethod::Rembg => {
            let model_path = config.model_path.clone().unwrap_or_else(default_model_path);
            Ok(Box::new(RembgBackend::from_path_or_download(
                model_path,
                config.num_threads,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removebg_requires_key() {
        let mut config = BackendConfig::new(ProcessMethod::RemoveBg);
        assert!(matches!(config.validate(), Err(MaskError::MissingApiKey)));
        assert!(matches!(
            build_backend(&config),
            Err(MaskError::MissingApiKey)
        ));

        config.api_key = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(MaskError::MissingApiKey)));

        config.api_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rembg_needs_no_key() {
        assert!(BackendConfig::new(ProcessMethod::Rembg).validate().is_ok());
    }
}
