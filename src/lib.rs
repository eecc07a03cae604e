//! # DocuExtract
//!
//! Document extraction pipeline with asynchronous job orchestration.
//!
//! ## Core Features
//!
//! - **Text Extraction**: four pluggable strategies (structural, fast text,
//!   OCR, vision) with automatic selection and graceful fallback
//! - **Table Recovery**: ruled-grid reconstruction with a geometric
//!   clustering fallback for broken grids
//! - **Signature Detection**: contour-based heuristic over the bottom page
//!   band, with confidence classification and review flagging
//! - **Key-Value Mining**: pattern-based field extraction, page-tagged when
//!   mined during OCR
//! - **Job Orchestration**: pending → processing → completed/failed state
//!   machine with checkpointed progress reporting
//! - **Export**: JSON, CSV, and Markdown renditions of results
//!
//! ## Optional Backends
//!
//! - `ocr`: ONNX Runtime encoder/decoder text recognition
//! - `vision`: vision-model transcription via an Ollama-compatible endpoint
//!
//! ## Quick Start
//!
//! ```ignore
//! use docuextract::config::ProcessingConfig;
//! use docuextract::jobs::{JobOrchestrator, SubmitOptions};
//! use docuextract::pipeline::ExtractionPipeline;
//!
//! # async fn run() -> Result<(), docuextract::error::Error> {
//! let pipeline = ExtractionPipeline::new(ProcessingConfig::from_env());
//! let jobs = JobOrchestrator::new(pipeline);
//!
//! let bytes = std::fs::read("invoice.pdf")?;
//! let id = jobs.submit("invoice.pdf", bytes, SubmitOptions::default())?;
//!
//! // ... poll jobs.status(id) until terminal ...
//! let result = jobs.result(id)?;
//! println!("{} key-value pairs", result.key_values.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Submitted documents and data model
pub mod document;
pub mod model;

// Rasterization and text layer access
pub mod raster;

// Recognition backends
pub mod ocr;
pub mod vision;

// Facet extractors
pub mod extract;

// The extraction pipeline
pub mod pipeline;

// Job orchestration
pub mod jobs;

// Result export
pub mod export;

// Re-exports
pub use config::ProcessingConfig;
pub use document::{DocumentKind, SourceDocument};
pub use error::{Error, Result};
pub use jobs::{JobOrchestrator, JobStatusView, LicenseGate, SubmitOptions};
pub use model::{
    ExtractionFlags, ExtractionMethod, ExtractionResult, Job, JobStatus, KeyValuePair, ReviewItem,
    Signature, SignatureStatus, Table,
};
pub use pipeline::ExtractionPipeline;
