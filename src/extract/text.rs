//! Text extraction strategies.
//!
//! Each strategy turns a document into plain text behind the
//! [`TextStrategy`] trait: structural (embedded text layer with layout
//! heuristics), fast text (raw text layer), OCR (raster recognition), and
//! vision (vision-model transcription). Strategies report failure through
//! `Result`; the pipeline decides whether to fall back or degrade.

use std::sync::Arc;

use crate::config::ProcessingConfig;
use crate::document::{DocumentKind, SourceDocument};
use crate::error::{Error, Result};
use crate::extract::KeyValueExtractor;
use crate::model::KeyValuePair;
use crate::ocr::OcrEngine;
use crate::raster;
use crate::vision::VisionModel;

/// Fraction of replacement characters above which an embedded text layer is
/// considered garbled rather than usable.
const GARBLE_RATIO: f32 = 0.3;

/// Maximum line length the heading heuristic will promote.
const HEADING_MAX_LEN: usize = 60;

/// What a text strategy produced.
#[derive(Debug, Default, Clone)]
pub struct TextOutcome {
    /// Full document text
    pub text: String,
    /// Per-page text, when the strategy works page by page
    pub by_page: Option<Vec<String>>,
    /// Page-tagged pairs mined opportunistically during extraction
    pub key_values: Vec<KeyValuePair>,
}

/// A way of turning a document into text.
pub trait TextStrategy: Send + Sync {
    /// Short strategy name, used in logs and warnings.
    fn name(&self) -> &'static str;

    /// Extract text from the document. Errors signal that the strategy
    /// cannot serve this document; they carry no partial output.
    fn extract(&self, document: &SourceDocument) -> Result<TextOutcome>;
}

/// Embedded text layer with light structural markup.
///
/// Short all-caps lines are promoted to headings. Fails when the document
/// has no usable text layer, so the caller can fall back.
pub struct StructuralStrategy;

impl TextStrategy for StructuralStrategy {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn extract(&self, document: &SourceDocument) -> Result<TextOutcome> {
        if document.kind() != DocumentKind::Paged {
            return Err(Error::Strategy(
                "structural extraction requires a paged document".to_string(),
            ));
        }

        let pages = raster::text_layer(document)?;
        let rendered: Vec<String> = pages.iter().map(|page| assemble_markdown(page)).collect();
        let text = rendered.join("\n\n");

        if text.trim().is_empty() {
            return Err(Error::Strategy("no embedded text layer".to_string()));
        }
        if replacement_ratio(&text) > GARBLE_RATIO {
            return Err(Error::Strategy("embedded text layer is garbled".to_string()));
        }

        Ok(TextOutcome {
            text,
            by_page: Some(rendered),
            key_values: Vec::new(),
        })
    }
}

/// Raw embedded text layer, no markup. The cheap fallback when structure
/// recovery fails.
pub struct FastTextStrategy;

impl TextStrategy for FastTextStrategy {
    fn name(&self) -> &'static str {
        "fast_text"
    }

    fn extract(&self, document: &SourceDocument) -> Result<TextOutcome> {
        if document.kind() != DocumentKind::Paged {
            return Err(Error::Strategy(
                "fast text extraction requires a paged document".to_string(),
            ));
        }

        let pages = raster::text_layer(document)?;
        let text = pages.join("\n");
        Ok(TextOutcome {
            text,
            by_page: Some(pages),
            key_values: Vec::new(),
        })
    }
}

/// Rasterize and recognize. Pages are joined with `--- Page N ---` markers
/// and mined for page-tagged key-value pairs along the way.
pub struct OcrStrategy {
    engine: Arc<dyn OcrEngine>,
    key_values: KeyValueExtractor,
    raster_width: u32,
    page_cap: usize,
}

impl OcrStrategy {
    /// Build a strategy over the given engine.
    pub fn new(engine: Arc<dyn OcrEngine>, config: &ProcessingConfig) -> OcrStrategy {
        OcrStrategy {
            engine,
            key_values: KeyValueExtractor::new(config.key_value_confidence),
            raster_width: config.raster_width,
            page_cap: config.page_cap,
        }
    }
}

impl TextStrategy for OcrStrategy {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn extract(&self, document: &SourceDocument) -> Result<TextOutcome> {
        let set = raster::rasterize(document, self.raster_width, self.page_cap)?;

        let mut by_page = Vec::new();
        let mut key_values = Vec::new();
        for page in &set.pages {
            let spans = self.engine.recognize(&page.image)?;
            let text = spans
                .iter()
                .map(|span| span.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            key_values.extend(self.key_values.extract_for_page(&text, page.number));
            by_page.push(text);
        }

        Ok(TextOutcome {
            text: join_with_markers(&by_page),
            by_page: Some(by_page),
            key_values,
        })
    }
}

/// Vision-model transcription of page rasters.
pub struct VisionStrategy {
    model: Option<Arc<dyn VisionModel>>,
    raster_width: u32,
    page_cap: usize,
}

impl VisionStrategy {
    /// Build a strategy; `model` is `None` when no vision backend is
    /// configured, in which case extraction fails.
    pub fn new(model: Option<Arc<dyn VisionModel>>, config: &ProcessingConfig) -> VisionStrategy {
        VisionStrategy {
            model,
            raster_width: config.raster_width,
            page_cap: config.vision_page_cap,
        }
    }
}

impl TextStrategy for VisionStrategy {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn extract(&self, document: &SourceDocument) -> Result<TextOutcome> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| Error::Strategy("no vision model configured".to_string()))?;

        let set = raster::rasterize(document, self.raster_width, self.page_cap)?;

        let mut by_page = Vec::new();
        for page in &set.pages {
            let mut png = std::io::Cursor::new(Vec::new());
            page.image
                .write_to(&mut png, image::ImageFormat::Png)
                .map_err(Error::Image)?;
            by_page.push(model.transcribe(png.get_ref())?);
        }

        Ok(TextOutcome {
            text: join_with_markers(&by_page),
            by_page: Some(by_page),
            key_values: Vec::new(),
        })
    }
}

/// Join per-page texts, inserting `--- Page N ---` markers when the
/// document has more than one page.
fn join_with_markers(pages: &[String]) -> String {
    if pages.len() <= 1 {
        return pages.first().cloned().unwrap_or_default();
    }
    pages
        .iter()
        .enumerate()
        .map(|(i, text)| format!("--- Page {} ---\n{}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Promote short all-caps lines to headings; leave everything else as-is.
fn assemble_markdown(page: &str) -> String {
    page.lines()
        .map(|line| {
            let trimmed = line.trim();
            if looks_like_heading(trimmed) {
                format!("## {trimmed}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn looks_like_heading(line: &str) -> bool {
    if line.len() < 3 || line.len() > HEADING_MAX_LEN || line.ends_with(['.', ':', ',', ';']) {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
}

fn replacement_ratio(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let replacements = text.chars().filter(|&c| c == '\u{FFFD}').count();
    replacements as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrSpan;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    struct ScriptedOcr(&'static str);

    impl OcrEngine for ScriptedOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrSpan>> {
            Ok(self
                .0
                .lines()
                .map(|line| OcrSpan {
                    text: line.to_string(),
                    confidence: 0.95,
                })
                .collect())
        }
    }

    fn png_document() -> SourceDocument {
        let img = RgbImage::from_pixel(32, 32, image::Rgb([255, 255, 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        SourceDocument::new("scan.png", buf.into_inner()).unwrap()
    }

    #[test]
    fn test_heading_promotion() {
        let page = "INVOICE\nAcme Corp\n123 Main St.\nTOTALS AND NOTES";
        let rendered = assemble_markdown(page);
        assert!(rendered.contains("## INVOICE"));
        assert!(rendered.contains("## TOTALS AND NOTES"));
        assert!(rendered.contains("\nAcme Corp\n"));
        // Terminal punctuation blocks promotion.
        assert!(!rendered.contains("## 123"));
    }

    #[test]
    fn test_replacement_ratio_flags_garbled_text() {
        assert_eq!(replacement_ratio("clean text"), 0.0);
        assert!(replacement_ratio("\u{FFFD}\u{FFFD}ab") > GARBLE_RATIO);
    }

    #[test]
    fn test_page_markers_only_for_multi_page() {
        let one = join_with_markers(&["only page".to_string()]);
        assert_eq!(one, "only page");

        let two = join_with_markers(&["first".to_string(), "second".to_string()]);
        assert!(two.starts_with("--- Page 1 ---\nfirst"));
        assert!(two.contains("--- Page 2 ---\nsecond"));
    }

    #[test]
    fn test_ocr_strategy_mines_page_tagged_pairs() {
        let config = ProcessingConfig::default();
        let strategy = OcrStrategy::new(
            Arc::new(ScriptedOcr("Invoice Number: 77\nTotal Due: $10")),
            &config,
        );
        let outcome = strategy.extract(&png_document()).unwrap();
        assert!(outcome.text.contains("Invoice Number: 77"));
        assert_eq!(outcome.by_page.as_ref().unwrap().len(), 1);
        assert_eq!(outcome.key_values.len(), 2);
        assert!(outcome.key_values.iter().all(|kv| kv.page == Some(1)));
    }

    #[test]
    fn test_structural_rejects_single_images() {
        let err = StructuralStrategy.extract(&png_document()).unwrap_err();
        assert!(matches!(err, Error::Strategy(_)));
    }

    #[test]
    fn test_vision_without_model_fails() {
        let config = ProcessingConfig::default();
        let strategy = VisionStrategy::new(None, &config);
        let err = strategy.extract(&png_document()).unwrap_err();
        assert!(matches!(err, Error::Strategy(_)));
    }
}
