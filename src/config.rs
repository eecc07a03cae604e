//! Processing configuration.
//!
//! All tunable limits for the extraction pipeline live here. Defaults match
//! the shipped product behavior; `from_env` lets deployments override the
//! operationally interesting ones without recompiling.

use std::env;

/// Configuration for the extraction pipeline and its sub-extractors.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Maximum number of pages rasterized per document. Pages beyond the
    /// cap are excluded and reported in the result warnings.
    pub page_cap: usize,

    /// Maximum character length of the global extracted text. Longer text
    /// is prefix-truncated (lossy) before inclusion in the result.
    pub text_limit: usize,

    /// Target pixel width for rasterized pages (roughly 200 dpi for a
    /// letter-sized page at the default).
    pub raster_width: u32,

    /// Signature confidence at or above which a mark classifies `valid`.
    pub signature_threshold: f32,

    /// Signature confidence at or above which (but below the threshold) a
    /// mark classifies `needs_review` and a review item is emitted.
    pub review_floor: f32,

    /// Maximum signature candidates kept per page, ranked by confidence.
    pub max_signatures_per_page: usize,

    /// Fixed confidence assigned to every extracted key-value pair.
    pub key_value_confidence: f32,

    /// Overall confidence reported when no signature or key-value evidence
    /// was collected ("no evidence against the extraction").
    pub baseline_confidence: f32,

    /// Base URL of the vision model endpoint (Ollama-compatible).
    pub vision_base_url: String,

    /// Model name sent to the vision endpoint.
    pub vision_model: String,

    /// Maximum pages sent to the vision model per document.
    pub vision_page_cap: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            page_cap: 20,
            text_limit: 30_000,
            raster_width: 1700,
            signature_threshold: 0.6,
            review_floor: 0.4,
            max_signatures_per_page: 3,
            key_value_confidence: 0.8,
            baseline_confidence: 0.7,
            vision_base_url: "http://localhost:11434".to_string(),
            vision_model: "llava:7b".to_string(),
            vision_page_cap: 5,
        }
    }
}

impl ProcessingConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized variables: `DOC_TEXT_LIMIT`, `SIGNATURE_CONFIDENCE_THRESHOLD`,
    /// `OLLAMA_BASE_URL`, `OLLAMA_VISION_MODEL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(limit) = read_env_parsed::<usize>("DOC_TEXT_LIMIT") {
            config.text_limit = limit;
        }
        if let Some(threshold) = read_env_parsed::<f32>("SIGNATURE_CONFIDENCE_THRESHOLD") {
            config.signature_threshold = threshold;
        }
        if let Ok(url) = env::var("OLLAMA_BASE_URL") {
            config.vision_base_url = url;
        }
        if let Ok(model) = env::var("OLLAMA_VISION_MODEL") {
            config.vision_model = model;
        }

        config
    }
}

fn read_env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.parse().ok())
}
