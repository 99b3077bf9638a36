//! Cartella CLI — thin driver around the extraction pipeline.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cartella::config::Config;
use cartella::pipeline::extraction::{DocumentExtractor, PdfiumEngine};
use cartella::pipeline::export::{copy_finalized_records, write_batch_outputs};
use cartella::pipeline::ledger::Ledger;
use cartella::pipeline::structuring::{
    AiSettings, OpenAiClient, RetryPolicy, StructuredExtractor,
};
use cartella::pipeline::{BatchEvent, BatchOptions, BatchRunner};

#[derive(Parser, Debug)]
#[command(name = "cartella", version, about = "Process a folder of medical documents into a structured, translated record set.")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Override the scans directory from the configuration.
    #[arg(long)]
    scans: Option<PathBuf>,

    /// Override the output directory from the configuration.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Reprocess everything, ignoring the ledger's skip decisions.
    #[arg(long)]
    no_skip: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cartella=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config).context("loading configuration")?;
    if let Some(scans) = cli.scans {
        config.scans_location = scans;
    }
    if let Some(output) = cli.output {
        config.output_location = output;
    }
    if cli.no_skip {
        config.skip_processed_files = false;
    }

    let api_key = config.resolve_api_key()?;

    std::fs::create_dir_all(&config.scans_location).context("creating scans directory")?;
    std::fs::create_dir_all(config.data_files_dir()).context("creating output directories")?;
    std::fs::create_dir_all(config.records_dir()).context("creating records directory")?;

    let runner = build_runner(&config, &api_key)?;
    let mut ledger = Ledger::load(&config.ledger_path());
    let cancel = Arc::new(AtomicBool::new(false));

    let progress = |event: BatchEvent| match event {
        BatchEvent::Started { total } => {
            println!("Found {total} files to examine");
        }
        BatchEvent::DocumentStarted { index, total, filename } => {
            println!("Processing file {index} / {total}: {filename}");
        }
        BatchEvent::DocumentSkipped { filename } => {
            println!("Skipping recently processed file: {filename}");
        }
        BatchEvent::DocumentFinished { filename, finalized } => {
            if !finalized {
                println!("FAILED: {filename} (see log, will retry next run)");
            }
        }
        BatchEvent::Completed { finalized, failed, skipped } => {
            println!("Batch complete: {finalized} finalized, {failed} failed, {skipped} skipped");
        }
    };

    let result = runner
        .run(&config.scans_location, &mut ledger, &cancel, Some(&progress))
        .context("running batch")?;

    write_batch_outputs(&result, &config.data_files_dir()).context("writing batch outputs")?;
    copy_finalized_records(&result, &config.records_dir()).context("copying finalized records")?;

    for (stage, count) in &result.counts.failed {
        println!("  failed at {}: {count}", stage.as_str());
    }
    Ok(())
}

fn build_runner(config: &Config, api_key: &str) -> anyhow::Result<BatchRunner> {
    let pdfium_text = PdfiumEngine::new().context("loading PDFium")?;
    let pdfium_render = PdfiumEngine::new().context("loading PDFium")?;

    #[cfg(feature = "ocr")]
    let ocr: Box<dyn cartella::pipeline::extraction::OcrEngine> = Box::new(
        cartella::pipeline::extraction::TesseractOcr::new(config.ocr_tessdata.as_deref()),
    );
    #[cfg(not(feature = "ocr"))]
    let ocr: Box<dyn cartella::pipeline::extraction::OcrEngine> =
        Box::new(cartella::pipeline::extraction::DisabledOcr);

    let extractor = DocumentExtractor::new(
        Box::new(pdfium_text),
        Box::new(pdfium_render),
        ocr,
        &config.ocr_language_hint(),
    );

    let backend = OpenAiClient::new(&config.ai.base_url, api_key, config.ai.timeout_secs)?;
    let policy = RetryPolicy::new(
        config.ai.max_retries,
        std::time::Duration::from_millis(config.ai.retry_base_delay_ms),
    );
    let settings = AiSettings {
        model: config.ai.model.clone(),
        aggregate_model: config.ai.aggregate_model.clone(),
        max_tokens: config.ai.max_tokens,
        temperature: config.ai.temperature,
        output_language: config.output_language.clone(),
        role_prompt: config.ai.role_prompt.clone(),
        aggregate_role_prompt: config.ai.aggregate_role_prompt.clone(),
    };
    let ai = StructuredExtractor::new(Box::new(backend), policy, settings);

    Ok(BatchRunner::new(extractor, ai, BatchOptions::from_config(config)))
}
