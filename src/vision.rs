//! Vision model seam.
//!
//! The vision text strategy sends page rasters to a vision-capable language
//! model and uses its transcription. The pipeline depends on the
//! [`VisionModel`] trait only; the `vision` feature adds [`OllamaVision`],
//! a blocking HTTP client for an Ollama-compatible endpoint.

use crate::error::Result;

/// A model that can transcribe a page image into text.
pub trait VisionModel: Send + Sync {
    /// Transcribe one page. `page_png` is a PNG-encoded raster of the page.
    fn transcribe(&self, page_png: &[u8]) -> Result<String>;
}

#[cfg(feature = "vision")]
pub use ollama::OllamaVision;

#[cfg(feature = "vision")]
mod ollama {
    use base64::Engine as _;
    use serde::Deserialize;

    use super::VisionModel;
    use crate::config::ProcessingConfig;
    use crate::error::{Error, Result};

    const PROMPT: &str =
        "Extract all text, tables, and structured information from this document. \
         Format as markdown.";

    /// Blocking client for an Ollama-compatible `/api/generate` endpoint.
    pub struct OllamaVision {
        client: reqwest::blocking::Client,
        base_url: String,
        model: String,
    }

    #[derive(Deserialize)]
    struct GenerateResponse {
        response: String,
    }

    impl OllamaVision {
        /// Build a client from the configured endpoint and model name.
        pub fn new(config: &ProcessingConfig) -> OllamaVision {
            OllamaVision {
                client: reqwest::blocking::Client::new(),
                base_url: config.vision_base_url.trim_end_matches('/').to_string(),
                model: config.vision_model.clone(),
            }
        }
    }

    impl VisionModel for OllamaVision {
        fn transcribe(&self, page_png: &[u8]) -> Result<String> {
            let encoded = base64::engine::general_purpose::STANDARD.encode(page_png);
            let body = serde_json::json!({
                "model": self.model,
                "prompt": PROMPT,
                "images": [encoded],
                "stream": false,
            });

            let response = self
                .client
                .post(format!("{}/api/generate", self.base_url))
                .json(&body)
                .send()
                .map_err(|e| Error::Vision(e.to_string()))?
                .error_for_status()
                .map_err(|e| Error::Vision(e.to_string()))?;

            let parsed: GenerateResponse = response
                .json()
                .map_err(|e| Error::Vision(e.to_string()))?;
            Ok(parsed.response)
        }
    }
}
