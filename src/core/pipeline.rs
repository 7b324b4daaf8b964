use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use super::config::DatasetConfig;
use super::extractor::{ExtractionJob, ExtractionProgress, FrameExtractor};
use super::layout;
use super::manifest::ManifestWriter;
use super::request::IngestionRequest;
use super::resume;
use crate::utils::logger;
use crate::utils::time_utils::Timer;

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub video: PathBuf,
    pub target_dir: PathBuf,
    pub manifest: PathBuf,
    pub start_index: u64,
    pub frames_extracted: u64,
    pub rows_appended: usize,
    pub policy: &'static str,
    pub elapsed_ms: u64,
}

/// Build path, resume numbering, extract, record. One pass, no retries.
pub fn run(
    config: &DatasetConfig,
    request: &IngestionRequest,
    extractor: &dyn FrameExtractor,
    progress: &mut dyn FnMut(ExtractionProgress),
) -> Result<IngestReport> {
    let timer = Timer::new();
    let schema = config.schema();
    if schema.has_lighting() != request.lighting().is_some() {
        bail!(
            "request lighting ({}) does not fit a dataset that {} lighting",
            request
                .lighting()
                .map(|light| light.as_str())
                .unwrap_or("none"),
            if schema.has_lighting() { "records" } else { "does not record" }
        );
    }

    let target_dir = layout::target_dir(&config.root, request);
    layout::ensure_dir(&target_dir)?;

    let pattern = config.frame_pattern()?;
    let previous_max = resume::max_index(&target_dir, &pattern)?;
    let start_index = resume::start_after(previous_max)
        .with_context(|| format!("cannot resume numbering in {}", target_dir.display()))?;
    logger::info(&format!(
        "ingest video={} target={} start_index={}",
        request.video().display(),
        target_dir.display(),
        start_index
    ));

    // Fail on a foreign manifest before spending time on extraction.
    let writer = ManifestWriter::new(&config.root, schema);
    writer.ensure_header()?;

    let job = ExtractionJob {
        video: request.video(),
        output_dir: &target_dir,
        pattern: &pattern,
        start_index,
        fps: config.fps,
        quality: config.quality,
    };
    let outcome = extractor
        .extract(&job, progress)
        .with_context(|| format!("extracting frames from {}", request.video().display()))?;

    let rows_appended = writer.record(request, &target_dir, &pattern, config.policy, previous_max)?;

    let report = IngestReport {
        video: request.video().to_path_buf(),
        target_dir,
        manifest: writer.path().to_path_buf(),
        start_index,
        frames_extracted: outcome.frames,
        rows_appended,
        policy: config.policy.as_str(),
        elapsed_ms: timer.elapsed_ms(),
    };
    logger::info(&format!(
        "ingest done frames={} rows={} elapsed_ms={}",
        report.frames_extracted, report.rows_appended, report.elapsed_ms
    ));
    Ok(report)
}
