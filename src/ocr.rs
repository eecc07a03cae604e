//! Optical character recognition seam.
//!
//! The pipeline depends on the [`OcrEngine`] trait only. The default build
//! ships [`DisabledOcr`], which reports failure and lets the pipeline
//! degrade the affected facet; the `ocr` feature adds [`OnnxOcrEngine`],
//! an ONNX Runtime encoder/decoder engine with greedy decoding.

use image::DynamicImage;

use crate::error::{Error, Result};

/// One recognized text line.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSpan {
    /// Recognized text
    pub text: String,
    /// Recognition confidence in `[0, 1]`
    pub confidence: f32,
}

/// A text recognizer over a raster image.
///
/// Implementations must be cheap to share across pipeline invocations;
/// `recognize` takes `&self` so engines with mutable runtime state wrap it
/// in interior mutability.
pub trait OcrEngine: Send + Sync {
    /// Recognize text lines in an image, in top-to-bottom reading order.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrSpan>>;
}

/// Placeholder engine used when no OCR backend is configured.
///
/// Always fails, which the pipeline converts into an empty facet plus a
/// warning instead of aborting the job.
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrSpan>> {
        Err(Error::Strategy("no OCR engine configured".to_string()))
    }
}

#[cfg(feature = "ocr")]
pub use onnx::OnnxOcrEngine;

#[cfg(feature = "ocr")]
mod onnx {
    use std::path::Path;
    use std::sync::Mutex;

    use image::imageops::FilterType;
    use image::DynamicImage;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Value;

    use super::{OcrEngine, OcrSpan};
    use crate::error::{Error, Result};

    const INPUT_SIZE: u32 = 384;
    const MAX_TOKENS: usize = 256;

    /// Encoder/decoder OCR over ONNX Runtime with greedy decoding.
    ///
    /// Expects a vision encoder, an autoregressive text decoder, and a
    /// vocabulary file with one token per line (GPT-2 style `Ġ` word
    /// boundary markers are honored).
    pub struct OnnxOcrEngine {
        encoder: Mutex<Session>,
        decoder: Mutex<Session>,
        vocab: Vec<String>,
        bos_id: u32,
        eos_id: u32,
    }

    impl OnnxOcrEngine {
        /// Load the engine from model and vocabulary files.
        pub fn load(
            encoder_path: impl AsRef<Path>,
            decoder_path: impl AsRef<Path>,
            vocab_path: impl AsRef<Path>,
        ) -> Result<OnnxOcrEngine> {
            let _ = ort::init();

            let encoder = load_session(encoder_path.as_ref())?;
            let decoder = load_session(decoder_path.as_ref())?;

            let raw = std::fs::read_to_string(vocab_path.as_ref())?;
            let vocab: Vec<String> = raw.lines().map(str::to_string).collect();
            if vocab.is_empty() {
                return Err(Error::Ocr("empty vocabulary".to_string()));
            }

            let bos_id = position_of(&vocab, "<s>").unwrap_or(0);
            let eos_id = position_of(&vocab, "</s>").unwrap_or(2);

            Ok(OnnxOcrEngine {
                encoder: Mutex::new(encoder),
                decoder: Mutex::new(decoder),
                vocab,
                bos_id,
                eos_id,
            })
        }

        fn preprocess(image: &DynamicImage) -> Vec<f32> {
            let resized = image
                .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3)
                .to_rgb8();

            // CHW layout, normalized to [0, 1]
            let mut pixels = Vec::with_capacity((3 * INPUT_SIZE * INPUT_SIZE) as usize);
            for channel in 0..3 {
                for y in 0..INPUT_SIZE {
                    for x in 0..INPUT_SIZE {
                        let pixel = resized.get_pixel(x, y);
                        pixels.push(pixel[channel] as f32 / 255.0);
                    }
                }
            }
            pixels
        }

        fn decode_tokens(&self, tokens: &[u32]) -> String {
            let mut text = String::new();
            for &id in tokens {
                if let Some(token) = self.vocab.get(id as usize) {
                    if let Some(word) = token.strip_prefix('\u{0120}') {
                        text.push(' ');
                        text.push_str(word);
                    } else {
                        text.push_str(token);
                    }
                }
            }
            text.trim().to_string()
        }
    }

    impl OcrEngine for OnnxOcrEngine {
        fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrSpan>> {
            let pixels = Self::preprocess(image);

            let encoder_input = Value::from_array((
                [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize],
                pixels.into_boxed_slice(),
            ))
            .map_err(|e| Error::Ocr(e.to_string()))?;

            let mut encoder = self
                .encoder
                .lock()
                .map_err(|_| Error::Ocr("encoder lock poisoned".to_string()))?;
            let encoder_outputs = encoder
                .run(ort::inputs![encoder_input])
                .map_err(|e| Error::Ocr(e.to_string()))?;
            let (hidden_shape, hidden_data) = encoder_outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Ocr(e.to_string()))?;
            let hidden_shape = hidden_shape.clone();
            let hidden: Vec<f32> = hidden_data.to_vec();
            drop(encoder_outputs);
            drop(encoder);

            let mut decoder = self
                .decoder
                .lock()
                .map_err(|_| Error::Ocr("decoder lock poisoned".to_string()))?;

            let mut token_ids: Vec<i64> = vec![self.bos_id as i64];
            let mut generated = Vec::new();
            let mut confidences = Vec::new();

            for _ in 0..MAX_TOKENS {
                let input_ids = Value::from_array((
                    [1usize, token_ids.len()],
                    token_ids.clone().into_boxed_slice(),
                ))
                .map_err(|e| Error::Ocr(e.to_string()))?;
                let hidden_states =
                    Value::from_array((hidden_shape.clone(), hidden.clone().into_boxed_slice()))
                        .map_err(|e| Error::Ocr(e.to_string()))?;

                let outputs = decoder
                    .run(ort::inputs![
                        "input_ids" => input_ids,
                        "encoder_hidden_states" => hidden_states,
                    ])
                    .map_err(|e| Error::Ocr(e.to_string()))?;

                let (logits_shape, logits) = outputs[0]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| Error::Ocr(e.to_string()))?;

                let vocab_size = logits_shape[2] as usize;
                let last = (logits_shape[1] as usize - 1) * vocab_size;
                let step_logits = &logits[last..last + vocab_size];

                let (next_id, probability) = greedy_pick(step_logits);
                if next_id == self.eos_id {
                    break;
                }
                generated.push(next_id);
                confidences.push(probability);
                token_ids.push(next_id as i64);
            }

            let text = self.decode_tokens(&generated);
            if text.is_empty() {
                return Ok(Vec::new());
            }

            let confidence = if confidences.is_empty() {
                0.0
            } else {
                confidences.iter().sum::<f32>() / confidences.len() as f32
            };

            // The decoder emits the whole region as one transcript; split
            // on line breaks so callers see line-level spans.
            Ok(text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| OcrSpan {
                    text: line.trim().to_string(),
                    confidence,
                })
                .collect())
        }
    }

    fn load_session(path: &Path) -> Result<Session> {
        Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(4))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| Error::Ocr(format!("{}: {e}", path.display())))
    }

    fn position_of(vocab: &[String], token: &str) -> Option<u32> {
        vocab.iter().position(|t| t == token).map(|i| i as u32)
    }

    /// Softmax probability of the argmax logit.
    fn greedy_pick(logits: &[f32]) -> (u32, f32) {
        let mut best = 0usize;
        for (i, &logit) in logits.iter().enumerate() {
            if logit > logits[best] {
                best = i;
            }
        }
        let max = logits[best];
        let denom: f32 = logits.iter().map(|&l| (l - max).exp()).sum();
        (best as u32, 1.0 / denom)
    }
}
