//! Result export.
//!
//! Renders an [`ExtractionResult`] into portable formats: JSON for
//! machines, CSV for spreadsheets, Markdown for humans.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{DocumentType, ExtractionResult, SignatureStatus, Table};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Pretty-printed JSON of the full result
    Json,
    /// Sectioned CSV: key-value pairs, tables, signatures
    Csv,
    /// Human-readable Markdown report
    Markdown,
}

/// Render a result in the requested format.
pub fn export(result: &ExtractionResult, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(result),
        ExportFormat::Csv => Ok(to_csv(result)),
        ExportFormat::Markdown => Ok(to_markdown(result)),
    }
}

/// Pretty-printed JSON of the full result.
pub fn to_json(result: &ExtractionResult) -> Result<String> {
    serde_json::to_string_pretty(result)
        .map_err(|e| crate::error::Error::Strategy(format!("JSON export: {e}")))
}

/// Sectioned CSV. Key-value pairs, each table, and signatures get their
/// own section so a spreadsheet import stays legible.
pub fn to_csv(result: &ExtractionResult) -> String {
    let mut out = String::new();

    out.push_str("KEY-VALUE PAIRS\n");
    out.push_str("Key,Value,Confidence\n");
    for pair in &result.key_values {
        out.push_str(&format!(
            "{},{},{:.2}\n",
            csv_field(&pair.key),
            csv_field(&pair.value),
            pair.confidence
        ));
    }

    for table in &result.tables {
        out.push('\n');
        out.push_str(&format!("TABLE: {}\n", table.id));
        for row in &table.rows {
            let line: Vec<String> = row.iter().map(|cell| csv_field(cell)).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str("SIGNATURES\n");
    out.push_str("ID,Status,Confidence,Page\n");
    for signature in &result.signatures {
        let page = signature.page.map(|p| p.to_string()).unwrap_or_default();
        out.push_str(&format!(
            "{},{},{:.2},{}\n",
            csv_field(&signature.id),
            status_label(signature.status),
            signature.confidence,
            page
        ));
    }

    out
}

/// Human-readable Markdown report.
pub fn to_markdown(result: &ExtractionResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Extraction Result: {}\n\n", result.document_source));
    if let Some(doc_type) = result.document_type {
        out.push_str(&format!("**Type:** {}\n", type_label(doc_type)));
    }
    out.push_str(&format!("**Pages:** {}\n", result.pages));
    out.push_str(&format!(
        "**Confidence:** {:.0}%\n",
        result.overall_confidence * 100.0
    ));

    if !result.key_values.is_empty() {
        out.push_str("\n## Key-Value Pairs\n\n");
        out.push_str("| Key | Value | Confidence |\n|---|---|---|\n");
        for pair in &result.key_values {
            out.push_str(&format!(
                "| {} | {} | {:.0}% |\n",
                md_cell(&pair.key),
                md_cell(&pair.value),
                pair.confidence * 100.0
            ));
        }
    }

    for table in &result.tables {
        out.push_str(&format!("\n## Table {}\n\n", table.id));
        out.push_str(&markdown_table(table));
    }

    if !result.signatures.is_empty() {
        out.push_str("\n## Signatures\n\n");
        for signature in &result.signatures {
            out.push_str(&format!(
                "- {}: {} ({:.0}%)\n",
                signature.id,
                status_label(signature.status),
                signature.confidence * 100.0
            ));
        }
    }

    if !result.warnings.is_empty() {
        out.push_str("\n## Warnings\n\n");
        for warning in &result.warnings {
            out.push_str(&format!("- {warning}\n"));
        }
    }

    if !result.text.is_empty() {
        out.push_str("\n## Text\n\n");
        out.push_str(&result.text);
        out.push('\n');
    }

    out
}

fn markdown_table(table: &Table) -> String {
    let mut out = String::new();
    let mut rows = table.rows.iter();

    if let Some(headers) = &table.headers {
        out.push_str(&format!(
            "| {} |\n",
            headers.iter().map(|h| md_cell(h)).collect::<Vec<_>>().join(" | ")
        ));
        out.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
        // The header row is also the first body row; skip it.
        rows.next();
    }
    for row in rows {
        out.push_str(&format!(
            "| {} |\n",
            row.iter().map(|c| md_cell(c)).collect::<Vec<_>>().join(" | ")
        ));
    }
    out
}

/// Quote a CSV field when it contains a delimiter, quote, or line break.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn md_cell(raw: &str) -> String {
    raw.replace('|', "\\|").replace('\n', " ")
}

fn status_label(status: SignatureStatus) -> &'static str {
    match status {
        SignatureStatus::Valid => "valid",
        SignatureStatus::NeedsReview => "needs_review",
        SignatureStatus::Invalid => "invalid",
    }
}

fn type_label(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::Invoice => "invoice",
        DocumentType::Contract => "contract",
        DocumentType::Receipt => "receipt",
        DocumentType::Resume => "resume",
        DocumentType::Form => "form",
    }
}
