use clap::ValueEnum;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::shared::constants;

lazy_static! {
    static ref INTERVAL_RE: Regex =
        Regex::new(constants::INTERVAL_PATTERN).expect("interval pattern is valid");
    static ref SUB_INTERVAL_RE: Regex =
        Regex::new(constants::SUB_INTERVAL_PATTERN).expect("sub-interval pattern is valid");
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("video file not found: {0}")]
    VideoNotFound(String),
    #[error("interval must look like 1-2 or 0.5-1.5, got '{0}'")]
    BadInterval(String),
    #[error("sub-interval must be a plain decimal like 1.3, got '{0}'")]
    BadSubInterval(String),
    #[error("lighting condition is required for this dataset")]
    MissingLighting,
    #[error("this dataset does not record lighting")]
    UnexpectedLighting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum Lighting {
    Low,
    Medium,
    High,
}

impl Lighting {
    pub const ALL: [Lighting; 3] = [Lighting::Low, Lighting::Medium, Lighting::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Lighting::Low => "low",
            Lighting::Medium => "medium",
            Lighting::High => "high",
        }
    }
}

/// One validated ingestion: which clip goes into which bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionRequest {
    video: PathBuf,
    interval: String,
    sub_interval: String,
    lighting: Option<Lighting>,
}

impl IngestionRequest {
    /// Validates every field and trims the free-text ones.
    /// `needs_lighting` comes from the dataset schema.
    pub fn new(
        video: impl AsRef<Path>,
        interval: &str,
        sub_interval: &str,
        lighting: Option<Lighting>,
        needs_lighting: bool,
    ) -> Result<Self, InputError> {
        let video = validate_video(video.as_ref())?;
        let interval = validate_interval(interval)?;
        let sub_interval = validate_sub_interval(sub_interval)?;

        check_lighting(needs_lighting, lighting)?;

        Ok(Self {
            video,
            interval,
            sub_interval,
            lighting,
        })
    }

    pub fn video(&self) -> &Path {
        &self.video
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn sub_interval(&self) -> &str {
        &self.sub_interval
    }

    pub fn lighting(&self) -> Option<Lighting> {
        self.lighting
    }
}

/// A lighting value must be present exactly when the schema records it.
pub fn check_lighting(needs_lighting: bool, lighting: Option<Lighting>) -> Result<(), InputError> {
    match (needs_lighting, lighting) {
        (true, None) => Err(InputError::MissingLighting),
        (false, Some(_)) => Err(InputError::UnexpectedLighting),
        _ => Ok(()),
    }
}

pub fn validate_video(path: &Path) -> Result<PathBuf, InputError> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim();
    let candidate = PathBuf::from(trimmed);
    if trimmed.is_empty() || !candidate.is_file() {
        return Err(InputError::VideoNotFound(trimmed.to_string()));
    }
    Ok(candidate)
}

pub fn validate_interval(raw: &str) -> Result<String, InputError> {
    let trimmed = raw.trim();
    if INTERVAL_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(InputError::BadInterval(trimmed.to_string()))
    }
}

pub fn validate_sub_interval(raw: &str) -> Result<String, InputError> {
    let trimmed = raw.trim();
    if SUB_INTERVAL_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(InputError::BadSubInterval(trimmed.to_string()))
    }
}
