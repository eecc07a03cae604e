//! Command-line extraction tool.
//!
//! Runs one document through the extraction pipeline and prints the result
//! in the requested format.

use std::io::Write;
use std::path::PathBuf;
use std::process;

use docuextract::config::ProcessingConfig;
use docuextract::export::{self, ExportFormat};
use docuextract::model::{ExtractionFlags, ExtractionMethod};
use docuextract::pipeline::ExtractionPipeline;
use docuextract::SourceDocument;

struct CliConfig {
    input: PathBuf,
    output: Option<PathBuf>,
    format: ExportFormat,
    method: ExtractionMethod,
    quiet: bool,
}

impl CliConfig {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut output = None;
        let mut format = ExportFormat::Json;
        let mut method = ExtractionMethod::Auto;
        let mut quiet = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--format" | "-f" => {
                    i += 1;
                    format = match args.get(i).map(String::as_str) {
                        Some("json") => ExportFormat::Json,
                        Some("csv") => ExportFormat::Csv,
                        Some("markdown") | Some("md") => ExportFormat::Markdown,
                        other => {
                            eprintln!("Unknown format: {:?}", other.unwrap_or(""));
                            usage_and_exit();
                        }
                    };
                }
                "--method" | "-m" => {
                    i += 1;
                    method = match args.get(i).map(String::as_str) {
                        Some("auto") => ExtractionMethod::Auto,
                        Some("structural") => ExtractionMethod::Structural,
                        Some("fast-text") => ExtractionMethod::FastText,
                        Some("ocr") => ExtractionMethod::Ocr,
                        Some("vision") => ExtractionMethod::Vision,
                        other => {
                            eprintln!("Unknown method: {:?}", other.unwrap_or(""));
                            usage_and_exit();
                        }
                    };
                }
                "--output" | "-o" => {
                    i += 1;
                    output = args.get(i).map(PathBuf::from);
                }
                "--quiet" | "-q" => quiet = true,
                "--help" | "-h" => usage_and_exit(),
                arg if input.is_none() && !arg.starts_with('-') => {
                    input = Some(PathBuf::from(arg));
                }
                arg => {
                    eprintln!("Unknown argument: {arg}");
                    usage_and_exit();
                }
            }
            i += 1;
        }

        let Some(input) = input else {
            usage_and_exit();
        };
        CliConfig {
            input,
            output,
            format,
            method,
            quiet,
        }
    }
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: extract <file> [--format json|csv|markdown] \
         [--method auto|structural|fast-text|ocr|vision] [--output <path>] [--quiet]"
    );
    process::exit(2);
}

fn main() {
    env_logger::init();

    let cli = CliConfig::from_args();

    let bytes = match std::fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", cli.input.display());
            process::exit(1);
        }
    };

    let filename = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.input.display().to_string());

    let document = match SourceDocument::new(filename, bytes) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let pipeline = ExtractionPipeline::new(ProcessingConfig::from_env());
    let quiet = cli.quiet;
    let progress = move |percent: u8, step: &str| {
        if !quiet {
            eprintln!("[{percent:>3}%] {step}");
        }
    };

    let result = match pipeline.run(
        &document,
        cli.method,
        ExtractionFlags::default(),
        &progress,
    ) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Extraction failed: {e}");
            process::exit(1);
        }
    };

    if !quiet {
        for warning in &result.warnings {
            eprintln!("warning: {warning}");
        }
    }

    let rendered = match export::export(&result, cli.format) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Export failed: {e}");
            process::exit(1);
        }
    };

    match cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, rendered) {
                eprintln!("Failed to write {}: {e}", path.display());
                process::exit(1);
            }
            if !quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(rendered.as_bytes());
            let _ = stdout.write_all(b"\n");
        }
    }
}
