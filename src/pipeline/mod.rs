//! The extraction pipeline.
//!
//! One synchronous pass over a submitted document: text extraction through
//! the selected strategy, rasterization, table extraction, signature
//! detection, key-value mining, and aggregation into an
//! [`ExtractionResult`]. Facet failures degrade to warnings; only an
//! unreadable document aborts the run.
//!
//! Progress is reported through a caller-supplied callback at fixed
//! checkpoints, so job views stay consistent regardless of document size.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::config::ProcessingConfig;
use crate::document::SourceDocument;
use crate::error::Result;
use crate::extract::text::{
    FastTextStrategy, OcrStrategy, StructuralStrategy, TextOutcome, TextStrategy, VisionStrategy,
};
use crate::extract::{KeyValueExtractor, SignatureDetector, TableExtractor};
use crate::model::{
    DocumentType, ExtractionFlags, ExtractionMethod, ExtractionResult, KeyValuePair, Signature,
};
use crate::ocr::{DisabledOcr, OcrEngine};
use crate::raster::{self, RasterSet};
use crate::vision::VisionModel;

/// Progress callback: percent in `[0, 100]` plus a step label.
pub type ProgressFn<'a> = &'a (dyn Fn(u8, &str) + 'a);

/// The document extraction pipeline.
///
/// Cheap to share; one instance serves all jobs. OCR and vision backends
/// are injected at construction and shared across runs.
pub struct ExtractionPipeline {
    config: ProcessingConfig,
    ocr: Arc<dyn OcrEngine>,
    vision: Option<Arc<dyn VisionModel>>,
}

impl ExtractionPipeline {
    /// Build a pipeline with no OCR or vision backend configured. Runs that
    /// need them degrade with warnings.
    pub fn new(config: ProcessingConfig) -> ExtractionPipeline {
        ExtractionPipeline {
            config,
            ocr: Arc::new(DisabledOcr),
            vision: None,
        }
    }

    /// Replace the OCR engine.
    pub fn with_ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> ExtractionPipeline {
        self.ocr = engine;
        self
    }

    /// Attach a vision model backend.
    pub fn with_vision_model(mut self, model: Arc<dyn VisionModel>) -> ExtractionPipeline {
        self.vision = Some(model);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Process one document to completion.
    ///
    /// `progress` is invoked at fixed checkpoints with a monotonically
    /// increasing percentage. Returns an error only when the document
    /// itself cannot be read; every facet-level failure is degraded into
    /// the result's warnings instead.
    pub fn run(
        &self,
        document: &SourceDocument,
        method: ExtractionMethod,
        flags: ExtractionFlags,
        progress: ProgressFn<'_>,
    ) -> Result<ExtractionResult> {
        let started = Instant::now();
        progress(5, "Initializing");
        progress(10, "Loading document");

        let resolved = method.resolve(document.kind());
        log::info!(
            "processing '{}' with method {:?}",
            document.name(),
            resolved
        );

        let mut warnings = Vec::new();
        let outcome = self.extract_text(document, resolved, &mut warnings);
        progress(40, "Text extracted");

        // Rasterization failure means the document itself is unreadable and
        // is the one fatal path after submission.
        let set = raster::rasterize(document, self.config.raster_width, self.config.page_cap)?;
        if let Some(warning) = page_cap_warning(&set, self.config.page_cap) {
            warnings.push(warning);
        }

        progress(50, "Extracting tables");
        let mut tables = Vec::new();
        if flags.extract_tables {
            let extractor = TableExtractor::new(Arc::clone(&self.ocr));
            for page in &set.pages {
                let (mut page_tables, table_warnings) = extractor.extract(&page.image);
                for table in &mut page_tables {
                    table.page = Some(page.number);
                }
                tables.extend(page_tables);
                warnings.extend(table_warnings);
            }
        }
        progress(65, "Tables extracted");

        progress(70, "Detecting signatures");
        let mut signatures = Vec::new();
        let mut review_items = Vec::new();
        if flags.extract_signatures {
            let detector = SignatureDetector::new(&self.config);
            for page in &set.pages {
                let mut findings = detector.detect(&page.image);
                for signature in &mut findings.signatures {
                    signature.page = Some(page.number);
                }
                for item in &mut findings.review_items {
                    item.page = Some(page.number);
                }
                signatures.extend(findings.signatures);
                review_items.extend(findings.review_items);
            }
        }
        progress(80, "Signatures detected");

        progress(85, "Extracting key-value pairs");
        let key_values = if flags.extract_key_values {
            self.mine_key_values(&outcome)
        } else {
            Vec::new()
        };
        progress(90, "Key-values extracted");

        let overall_confidence = aggregate_confidence(
            &signatures,
            &key_values,
            self.config.baseline_confidence,
        );

        let document_type = DocumentType::detect(&outcome.text);
        let text = self.truncate_text(outcome.text, &mut warnings);

        let result = ExtractionResult {
            document_source: document.name().to_string(),
            document_type,
            pages: set.pages.len().max(1) as u32,
            processed_at: Utc::now(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
            text,
            text_by_page: outcome.by_page,
            key_values,
            tables,
            signatures,
            human_review_required: !review_items.is_empty(),
            human_review_items: review_items,
            overall_confidence,
            warnings,
        };
        progress(100, "Complete");
        Ok(result)
    }

    /// Run the selected text strategy, falling back from structural to fast
    /// text once, and degrading any remaining failure to empty text plus a
    /// warning.
    fn extract_text(
        &self,
        document: &SourceDocument,
        method: ExtractionMethod,
        warnings: &mut Vec<String>,
    ) -> TextOutcome {
        let attempted: Result<TextOutcome> = match method {
            ExtractionMethod::Structural => structural_with_fallback(
                &StructuralStrategy,
                &FastTextStrategy,
                document,
                warnings,
            ),
            ExtractionMethod::FastText => FastTextStrategy.extract(document),
            ExtractionMethod::Ocr => {
                OcrStrategy::new(Arc::clone(&self.ocr), &self.config).extract(document)
            }
            ExtractionMethod::Vision => {
                VisionStrategy::new(self.vision.clone(), &self.config).extract(document)
            }
            // resolve() never returns Auto.
            ExtractionMethod::Auto => unreachable!("method must be resolved"),
        };

        match attempted {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("text extraction failed for '{}': {e}", document.name());
                warnings.push(format!(
                    "Text extraction failed: {e}; continuing with empty text"
                ));
                TextOutcome::default()
            }
        }
    }

    /// Global key-value pass, inheriting page tags from any pairs the text
    /// strategy mined per page, so the global pass stays idempotent with
    /// the page-tagged view.
    fn mine_key_values(&self, outcome: &TextOutcome) -> Vec<KeyValuePair> {
        let extractor = KeyValueExtractor::new(self.config.key_value_confidence);
        let mut pairs = extractor.extract(&outcome.text);
        for pair in &mut pairs {
            if let Some(mined) = outcome
                .key_values
                .iter()
                .find(|m| m.key == pair.key && m.value == pair.value)
            {
                pair.page = mined.page;
            }
        }
        pairs
    }

    fn truncate_text(&self, text: String, warnings: &mut Vec<String>) -> String {
        let limit = self.config.text_limit;
        if text.chars().count() <= limit {
            return text;
        }
        warnings.push(format!("Text truncated to {limit} characters"));
        text.chars().take(limit).collect()
    }
}

/// Warning stating how many pages the cap excluded, `None` when every page
/// was rendered. Exclusion must be explicit in the output, never silent.
fn page_cap_warning(set: &RasterSet, page_cap: usize) -> Option<String> {
    if set.excluded == 0 {
        return None;
    }
    Some(format!(
        "Document has {} pages; processing first {} only ({} pages excluded)",
        set.pages.len() + set.excluded,
        page_cap,
        set.excluded
    ))
}

/// Try the structural strategy; on failure, record a warning and fall back
/// to the fast text strategy exactly once. A fallback failure propagates.
fn structural_with_fallback(
    structural: &dyn TextStrategy,
    fallback: &dyn TextStrategy,
    document: &SourceDocument,
    warnings: &mut Vec<String>,
) -> Result<TextOutcome> {
    match structural.extract(document) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            log::debug!(
                "{} extraction failed ({e}); falling back to {}",
                structural.name(),
                fallback.name()
            );
            warnings.push(format!(
                "{} extraction failed; fell back to {}",
                structural.name(),
                fallback.name()
            ));
            fallback.extract(document)
        }
    }
}

/// Mean of the signature and key-value confidences, reported to three
/// decimals; the baseline when no evidence was collected.
fn aggregate_confidence(
    signatures: &[Signature],
    key_values: &[KeyValuePair],
    baseline: f32,
) -> f32 {
    let pool: Vec<f32> = signatures
        .iter()
        .map(|s| s.confidence)
        .chain(key_values.iter().map(|kv| kv.confidence))
        .collect();
    let mean = if pool.is_empty() {
        baseline
    } else {
        pool.iter().sum::<f32>() / pool.len() as f32
    };
    (mean * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStrategy(&'static str, AtomicUsize);

    impl FixedStrategy {
        fn new(text: &'static str) -> FixedStrategy {
            FixedStrategy(text, AtomicUsize::new(0))
        }

        fn calls(&self) -> usize {
            self.1.load(Ordering::SeqCst)
        }
    }

    impl TextStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn extract(&self, _document: &SourceDocument) -> Result<TextOutcome> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(TextOutcome {
                text: self.0.to_string(),
                by_page: None,
                key_values: Vec::new(),
            })
        }
    }

    struct FailingStrategy;

    impl TextStrategy for FailingStrategy {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _document: &SourceDocument) -> Result<TextOutcome> {
            Err(Error::Strategy("scripted failure".to_string()))
        }
    }

    fn document() -> SourceDocument {
        SourceDocument::new("doc.pdf", vec![1, 2, 3]).unwrap()
    }

    #[test]
    fn test_fallback_engages_once_on_failure() {
        let fallback = FixedStrategy::new("fallback text");
        let mut warnings = Vec::new();
        let outcome =
            structural_with_fallback(&FailingStrategy, &fallback, &document(), &mut warnings)
                .unwrap();
        assert_eq!(outcome.text, "fallback text");
        assert_eq!(fallback.calls(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("fell back"));
    }

    #[test]
    fn test_no_fallback_when_primary_succeeds() {
        let primary = FixedStrategy::new("primary text");
        let fallback = FixedStrategy::new("fallback text");
        let mut warnings = Vec::new();
        let outcome =
            structural_with_fallback(&primary, &fallback, &document(), &mut warnings).unwrap();
        assert_eq!(outcome.text, "primary text");
        assert_eq!(fallback.calls(), 0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_fallback_failure_propagates() {
        let mut warnings = Vec::new();
        let result =
            structural_with_fallback(&FailingStrategy, &FailingStrategy, &document(), &mut warnings);
        assert!(result.is_err());
        // The fallback attempt was still recorded.
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_confidence_baseline_when_no_evidence() {
        assert_eq!(aggregate_confidence(&[], &[], 0.7), 0.7);
    }

    #[test]
    fn test_page_cap_warning_names_excluded_count() {
        let set = RasterSet {
            pages: (1..=20)
                .map(|number| crate::raster::PageRaster {
                    number,
                    image: image::DynamicImage::new_luma8(2, 2),
                })
                .collect(),
            excluded: 1,
        };
        let warning = page_cap_warning(&set, 20).unwrap();
        assert!(warning.contains("21 pages"), "{warning}");
        assert!(warning.contains("first 20"), "{warning}");
        assert!(warning.contains("1 pages excluded"), "{warning}");
    }

    #[test]
    fn test_no_warning_when_all_pages_rendered() {
        let set = RasterSet {
            pages: Vec::new(),
            excluded: 0,
        };
        assert!(page_cap_warning(&set, 20).is_none());
    }

    #[test]
    fn test_confidence_rounded_to_three_decimals() {
        let kvs: Vec<KeyValuePair> = [0.8f32, 0.8, 0.9]
            .iter()
            .map(|&confidence| KeyValuePair {
                key: "k".to_string(),
                value: "v".to_string(),
                confidence,
                page: None,
            })
            .collect();
        let mean = aggregate_confidence(&[], &kvs, 0.7);
        assert!((mean - 0.833).abs() < 1e-6, "{mean}");
    }

    #[test]
    fn test_confidence_is_mean_of_evidence() {
        let kvs = vec![
            KeyValuePair {
                key: "a".to_string(),
                value: "1".to_string(),
                confidence: 0.8,
                page: None,
            },
            KeyValuePair {
                key: "b".to_string(),
                value: "2".to_string(),
                confidence: 0.6,
                page: None,
            },
        ];
        let mean = aggregate_confidence(&[], &kvs, 0.7);
        assert!((mean - 0.7).abs() < 1e-6);
    }
}
