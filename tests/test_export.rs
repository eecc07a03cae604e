//! Export of pipeline-produced results.

use std::io::Cursor;
use std::sync::Arc;

use docuextract::config::ProcessingConfig;
use docuextract::error::Result;
use docuextract::export::{self, ExportFormat};
use docuextract::ocr::{OcrEngine, OcrSpan};
use docuextract::pipeline::ExtractionPipeline;
use docuextract::{ExtractionFlags, ExtractionMethod, ExtractionResult, SourceDocument};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

struct ScriptedOcr;

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrSpan>> {
        Ok(vec![
            OcrSpan {
                text: "Invoice Number: 555".to_string(),
                confidence: 0.95,
            },
            OcrSpan {
                text: "Total Due: $42.00".to_string(),
                confidence: 0.95,
            },
        ])
    }
}

fn extracted_result() -> ExtractionResult {
    let img = GrayImage::from_pixel(150, 150, Luma([255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    let doc = SourceDocument::new("invoice.png", buf.into_inner()).unwrap();

    ExtractionPipeline::new(ProcessingConfig::default())
        .with_ocr_engine(Arc::new(ScriptedOcr))
        .run(
            &doc,
            ExtractionMethod::Auto,
            ExtractionFlags::default(),
            &|_, _| {},
        )
        .unwrap()
}

#[test]
fn test_json_export_round_trips_through_disk() {
    let result = extracted_result();
    let json = export::export(&result, ExportFormat::Json).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.json");
    std::fs::write(&path, &json).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let back: ExtractionResult = serde_json::from_str(&raw).unwrap();
    assert_eq!(back.document_source, "invoice.png");
    assert_eq!(back.key_values.len(), result.key_values.len());
}

#[test]
fn test_csv_export_lists_extracted_pairs() {
    let csv = export::export(&extracted_result(), ExportFormat::Csv).unwrap();
    assert!(csv.contains("KEY-VALUE PAIRS"));
    assert!(csv.contains("Invoice Number,555,0.80"));
    assert!(csv.contains("Total Due,$42.00,0.80"));
}

#[test]
fn test_markdown_export_names_the_document() {
    let md = export::export(&extracted_result(), ExportFormat::Markdown).unwrap();
    assert!(md.starts_with("# Extraction Result: invoice.png"));
    assert!(md.contains("**Type:** invoice"));
    assert!(md.contains("| Invoice Number | 555 |"));
}
