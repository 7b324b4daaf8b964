use anyhow::Result;

use super::config::DatasetConfig;
use super::extractor::{ExtractionProgress, FfmpegExtractor};
use super::pipeline::{self, IngestReport};
use super::request::IngestionRequest;
use crate::ui::ExtractionSpinner;
use crate::utils::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Interactive entry point: ask, then ingest.
pub fn run(config: &DatasetConfig) -> Result<()> {
    let Some(request) = crate::ui::menu::run_menu(config)? else {
        println!("Menu cancelled.");
        return Ok(());
    };

    logger::info(&format!(
        "menu selection: video={} interval={} sub_interval={} light={}",
        request.video().display(),
        request.interval(),
        request.sub_interval(),
        request
            .lighting()
            .map(|light| light.as_str())
            .unwrap_or("<none>")
    ));

    ingest(config, &request, ReportFormat::Text, false)?;
    Ok(())
}

/// Runs the pipeline with ffmpeg and a spinner, then prints the report.
pub fn ingest(
    config: &DatasetConfig,
    request: &IngestionRequest,
    format: ReportFormat,
    quiet: bool,
) -> Result<IngestReport> {
    let extractor = FfmpegExtractor::new(&config.ffmpeg);
    let label = request
        .video()
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| request.video().display().to_string());
    let spinner = ExtractionSpinner::new(&label, quiet || format == ReportFormat::Json);

    let report = match pipeline::run(config, request, &extractor, &mut |progress: ExtractionProgress| {
        spinner.update(progress)
    }) {
        Ok(report) => report,
        Err(err) => {
            spinner.abandon();
            return Err(err);
        }
    };
    spinner.finish(report.frames_extracted);

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => print_report(&report),
    }

    Ok(report)
}

fn print_report(report: &IngestReport) {
    println!("Target directory: {}", report.target_dir.display());
    println!(
        "Frames extracted: {} (starting at index {})",
        report.frames_extracted, report.start_index
    );
    if report.rows_appended == 0 {
        println!("No new entries were added to {}", report.manifest.display());
    } else {
        println!(
            "Appended {} rows to {}",
            report.rows_appended,
            report.manifest.display()
        );
    }
}
