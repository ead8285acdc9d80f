use std::path::Path;

use image::{imageops::FilterType, GrayImage};
use reqwest::blocking::{multipart, Client};
use serde::Deserialize;

use crate::threshold::binarize;
use crate::{MaskBackend, MaskError};

/// Endpoint of the remove.bg service.
pub const REMOVE_BG_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    title: String,
    #[serde(default)]
    detail: Option<String>,
}

// the service reports errors as `{"errors": [{"title": ...}]}`
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed
            .errors
            .iter()
            .map(|e| match &e.detail {
                Some(detail) => format!("{} ({})", e.title, detail),
                None => e.title.clone(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.trim().to_string(),
    }
}

/// Mask backend uploading the photographs to the remove.bg service.
///
/// The service is asked for a preview size alpha channel without semi transparency. The
/// returned alpha is resized back to the size of the source image with cubic interpolation.
pub struct RemoveBgBackend {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl RemoveBgBackend {
    /// Create a backend talking to the public service.
    pub fn new(api_key: impl Into<String>) -> Result<Self, MaskError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, REMOVE_BG_ENDPOINT, api_key))
    }

    /// Create a backend with a custom http client and endpoint.
    pub fn with_client(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// The endpoint the images are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MaskBackend for RemoveBgBackend {
    fn process(&mut self, path: &Path) -> Result<GrayImage, MaskError> {
        let (width, height) = image::image_dimensions(path)?;

        let form = multipart::Form::new()
            .file("image_file", path)?
            .text("size", "preview")
            .text("channels", "alpha")
            .text("semitransparency", "false");

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().unwrap_or_default();
            return Err(MaskError::RemoteService {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let bytes = response.bytes()?;
        let alpha = image::load_from_memory(&bytes)?.to_luma8();
        log::debug!(
            "Received a {}x{} mask for a {}x{} image",
            alpha.width(),
            alpha.height(),
            width,
            height
        );

        let alpha = if alpha.dimensions() == (width, height) {
            alpha
        } else {
            image::imageops::resize(&alpha, width, height, FilterType::CatmullRom)
        };

        Ok(binarize(&alpha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        let body = r#"{"errors":[{"title":"Insufficient credits","code":"insufficient_credits"}]}"#;
        assert_eq!(error_message(body), "Insufficient credits");

        let body = r#"{"errors":[{"title":"Invalid file","detail":"empty upload"},{"title":"x"}]}"#;
        assert_eq!(error_message(body), "Invalid file (empty upload); x");

        assert_eq!(error_message("  Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_default_endpoint() -> Result<(), MaskError> {
        let backend = RemoveBgBackend::new("key")?;
        assert_eq!(backend.endpoint(), REMOVE_BG_ENDPOINT);
        Ok(())
    }
}
