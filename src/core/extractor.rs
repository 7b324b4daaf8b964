use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use thiserror::Error;

use super::resume::FramePattern;
use crate::utils::time_utils::Timer;

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("frame extraction failed ({status}): {message}")]
    Failed { status: String, message: String },
    #[error("frame extraction I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the engine needs for one clip.
#[derive(Debug, Clone)]
pub struct ExtractionJob<'a> {
    pub video: &'a Path,
    pub output_dir: &'a Path,
    pub pattern: &'a FramePattern,
    pub start_index: u64,
    pub fps: u32,
    pub quality: u32,
}

impl ExtractionJob<'_> {
    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(self.pattern.template())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionProgress {
    /// Frames written so far in this run.
    pub frames: u64,
    /// Index of the latest frame file on disk.
    pub index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub frames: u64,
}

pub trait FrameExtractor {
    fn extract(
        &self,
        job: &ExtractionJob<'_>,
        progress: &mut dyn FnMut(ExtractionProgress),
    ) -> Result<ExtractionOutcome, ExtractionError>;
}

pub struct FfmpegExtractor {
    binary: PathBuf,
}

impl FfmpegExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// First line of `ffmpeg -version`, if the binary runs at all.
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }

    fn command(&self, job: &ExtractionJob<'_>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostats")
            .arg("-progress")
            .arg("pipe:1")
            .arg("-i")
            .arg(job.video)
            .arg("-vf")
            .arg(format!("fps={}", job.fps))
            .arg("-q:v")
            .arg(job.quality.to_string())
            .arg("-start_number")
            .arg(job.start_index.to_string())
            .arg(job.output_template())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl FrameExtractor for FfmpegExtractor {
    fn extract(
        &self,
        job: &ExtractionJob<'_>,
        progress: &mut dyn FnMut(ExtractionProgress),
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let timer = Timer::new();
        crate::utils::logger::debug(&format!(
            "ffmpeg extract video={} template={} start={} fps={}",
            job.video.display(),
            job.output_template().display(),
            job.start_index,
            job.fps
        ));

        let mut child = self
            .command(job)
            .spawn()
            .map_err(|source| ExtractionError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        let stderr_handle = child.stderr.take().map(spawn_stderr_collector);
        let previous_max = job.start_index.saturating_sub(1);
        let mut frames = 0u64;

        if let Some(stdout) = child.stdout.take() {
            if let Err(err) = read_progress(stdout, previous_max, &mut frames, progress) {
                // Stop ffmpeg so it writes no frames that the manifest never sees.
                let _ = child.kill();
                let _ = child.wait();
                if let Some(handle) = stderr_handle {
                    let _ = handle.join();
                }
                crate::utils::logger::error(&format!(
                    "lost ffmpeg progress after {} frames: {}",
                    frames, err
                ));
                return Err(err.into());
            }
        }

        let status = child.wait()?;
        let stderr_lines = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            let message = if stderr_lines.is_empty() {
                "<no ffmpeg stderr>".to_string()
            } else {
                stderr_lines.join(" | ")
            };
            crate::utils::logger::error(&format!(
                "ffmpeg failed after {} ms: status={} stderr={}",
                timer.elapsed_ms(),
                status,
                message
            ));
            return Err(ExtractionError::Failed {
                status: status.to_string(),
                message,
            });
        }

        crate::utils::logger::info(&format!(
            "ffmpeg wrote {} frames in {} ms",
            frames,
            timer.elapsed_ms()
        ));
        Ok(ExtractionOutcome { frames })
    }
}

/// Feeds `-progress` output to the observer until EOF. `frames` holds the last count seen.
fn read_progress(
    stdout: impl Read,
    previous_max: u64,
    frames: &mut u64,
    progress: &mut dyn FnMut(ExtractionProgress),
) -> io::Result<()> {
    for line in BufReader::new(stdout).lines() {
        let line = line?;
        if let Some(count) = parse_progress_frame(&line) {
            if count != *frames {
                *frames = count;
                progress(ExtractionProgress {
                    frames: count,
                    index: previous_max + count,
                });
            }
        }
    }
    Ok(())
}

/// Frame count from a `-progress` key/value line such as `frame=42`.
pub fn parse_progress_frame(line: &str) -> Option<u64> {
    let (key, value) = line.trim().split_once('=')?;
    if key.trim() != "frame" {
        return None;
    }
    value.trim().parse::<u64>().ok()
}

fn spawn_stderr_collector(stderr: impl Read + Send + 'static) -> JoinHandle<Vec<String>> {
    std::thread::spawn(move || {
        let mut lines = VecDeque::new();
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader.read_line(&mut line).unwrap_or(0);
            if read == 0 {
                break;
            }
            let cleaned = line.trim().to_string();
            if cleaned.is_empty() {
                continue;
            }
            lines.push_back(cleaned);
            if lines.len() > STDERR_TAIL_LINES {
                lines.pop_front();
            }
        }

        lines.into_iter().collect::<Vec<_>>()
    })
}
