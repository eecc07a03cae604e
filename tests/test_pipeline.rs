//! End-to-end pipeline runs over single-image documents.
//!
//! These tests drive the full pipeline without any external renderer: PNG
//! submissions decode through the image crate, and OCR is either disabled
//! or scripted.

use std::cell::RefCell;
use std::io::Cursor;
use std::sync::Arc;

use docuextract::config::ProcessingConfig;
use docuextract::error::Result;
use docuextract::model::DocumentType;
use docuextract::ocr::{OcrEngine, OcrSpan};
use docuextract::pipeline::ExtractionPipeline;
use docuextract::{ExtractionFlags, ExtractionMethod, SourceDocument};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

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

fn png_document(image: GrayImage, name: &str) -> SourceDocument {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    SourceDocument::new(name, buf.into_inner()).unwrap()
}

fn white_page(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([255]))
}

fn ruled_grid_page() -> GrayImage {
    let mut img = white_page(400, 300);
    for y in [50u32, 100, 150] {
        for yy in y..y + 2 {
            for x in 50..352 {
                img.put_pixel(x, yy, Luma([0]));
            }
        }
    }
    for x in [50u32, 150, 250, 350] {
        for xx in x..x + 2 {
            for y in 50..152 {
                img.put_pixel(xx, y, Luma([0]));
            }
        }
    }
    img
}

fn no_progress(_percent: u8, _step: &str) {}

#[test]
fn test_disabled_ocr_degrades_to_baseline() {
    let pipeline = ExtractionPipeline::new(ProcessingConfig::default());
    let doc = png_document(white_page(200, 200), "scan.png");

    let result = pipeline
        .run(
            &doc,
            ExtractionMethod::Auto,
            ExtractionFlags::default(),
            &no_progress,
        )
        .unwrap();

    assert!(result.text.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("Text extraction failed")));
    assert_eq!(result.pages, 1);
    assert_eq!(result.overall_confidence, 0.7);
    assert_eq!(result.document_type, None);
    assert!(!result.human_review_required);
}

#[test]
fn test_progress_checkpoints_are_monotonic() {
    let pipeline = ExtractionPipeline::new(ProcessingConfig::default());
    let doc = png_document(white_page(200, 200), "scan.png");

    let seen: RefCell<Vec<(u8, String)>> = RefCell::new(Vec::new());
    let record = |percent: u8, step: &str| {
        seen.borrow_mut().push((percent, step.to_string()));
    };
    pipeline
        .run(
            &doc,
            ExtractionMethod::Auto,
            ExtractionFlags::default(),
            &record,
        )
        .unwrap();

    let seen = seen.into_inner();
    assert_eq!(seen.first().unwrap(), &(5, "Initializing".to_string()));
    assert_eq!(seen.last().unwrap(), &(100, "Complete".to_string()));
    assert!(seen.iter().any(|(p, s)| *p == 40 && s == "Text extracted"));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn test_scripted_ocr_extracts_invoice_fields() {
    let pipeline = ExtractionPipeline::new(ProcessingConfig::default()).with_ocr_engine(Arc::new(
        ScriptedOcr("INVOICE\nInvoice Number: 12345\nTotal Due: $99.00"),
    ));
    let doc = png_document(white_page(200, 200), "invoice.png");

    let result = pipeline
        .run(
            &doc,
            ExtractionMethod::Auto,
            ExtractionFlags::default(),
            &no_progress,
        )
        .unwrap();

    assert!(result.text.contains("Invoice Number: 12345"));
    assert_eq!(result.text_by_page.as_ref().unwrap().len(), 1);
    assert_eq!(result.document_type, Some(DocumentType::Invoice));

    assert_eq!(result.key_values.len(), 2);
    assert_eq!(result.key_values[0].key, "Invoice Number");
    assert_eq!(result.key_values[0].value, "12345");
    // Pairs mined during OCR carry their page into the global pass.
    assert!(result.key_values.iter().all(|kv| kv.page == Some(1)));

    // Only key-value evidence, all at 0.8.
    assert!((result.overall_confidence - 0.8).abs() < 1e-6);
}

#[test]
fn test_flags_disable_facets() {
    let pipeline = ExtractionPipeline::new(ProcessingConfig::default()).with_ocr_engine(Arc::new(
        ScriptedOcr("Invoice Number: 12345"),
    ));
    let doc = png_document(white_page(200, 200), "invoice.png");

    let flags = ExtractionFlags {
        extract_tables: false,
        extract_signatures: false,
        extract_key_values: false,
    };
    let result = pipeline
        .run(&doc, ExtractionMethod::Auto, flags, &no_progress)
        .unwrap();

    assert!(result.text.contains("Invoice Number"));
    assert!(result.key_values.is_empty());
    assert!(result.tables.is_empty());
    assert!(result.signatures.is_empty());
    assert_eq!(result.overall_confidence, 0.7);
}

#[test]
fn test_long_text_is_prefix_truncated() {
    let config = ProcessingConfig {
        text_limit: 10,
        ..ProcessingConfig::default()
    };
    let pipeline = ExtractionPipeline::new(config)
        .with_ocr_engine(Arc::new(ScriptedOcr("A line well past ten characters")));
    let doc = png_document(white_page(200, 200), "scan.png");

    let result = pipeline
        .run(
            &doc,
            ExtractionMethod::Auto,
            ExtractionFlags::default(),
            &no_progress,
        )
        .unwrap();

    assert_eq!(result.text.chars().count(), 10);
    assert!(result.warnings.iter().any(|w| w.contains("truncated")));
}

#[test]
fn test_ruled_grid_surfaces_as_table() {
    let pipeline = ExtractionPipeline::new(ProcessingConfig::default());
    let doc = png_document(ruled_grid_page(), "grid.png");

    let result = pipeline
        .run(
            &doc,
            ExtractionMethod::Auto,
            ExtractionFlags::default(),
            &no_progress,
        )
        .unwrap();

    assert_eq!(result.tables.len(), 1);
    let table = &result.tables[0];
    assert_eq!(table.page, Some(1));
    assert_eq!(table.headers.as_ref().unwrap().len(), 3);
    assert_eq!(table.rows.len(), 2);
}
