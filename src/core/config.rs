use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::manifest::{DatasetSchema, ManifestPolicy};
use super::resume::FramePattern;
use crate::shared::constants;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("line {line}: expected `key = value`")]
    Malformed { line: usize },
    #[error("{key}: invalid value '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Per-dataset settings. Every pipeline variant is a choice made here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    pub root: PathBuf,
    pub frame_prefix: String,
    /// Prepended to the frame prefix so separate batches can share a bucket.
    pub tag: Option<String>,
    pub fps: u32,
    pub quality: u32,
    pub policy: ManifestPolicy,
    pub lighting: bool,
    pub ffmpeg: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(constants::DEFAULT_DATASET_ROOT),
            frame_prefix: constants::DEFAULT_FRAME_PREFIX.to_string(),
            tag: None,
            fps: constants::DEFAULT_FPS,
            quality: constants::DEFAULT_JPEG_QUALITY,
            policy: ManifestPolicy::Incremental,
            lighting: true,
            ffmpeg: PathBuf::from(constants::DEFAULT_FFMPEG),
        }
    }
}

impl DatasetConfig {
    /// Reads `key = value` lines from `path`. A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("invalid config file {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (number, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::Malformed { line: number + 1 });
            };
            let key = key.trim();
            let value = value.trim();
            let invalid = || ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            };

            match key {
                "dataset_root" if !value.is_empty() => config.root = PathBuf::from(value),
                "frame_prefix" if !value.is_empty() => config.frame_prefix = value.to_string(),
                "dataset_tag" => {
                    config.tag = (!value.is_empty()).then(|| value.to_string());
                }
                "fps" => config.fps = value.parse().map_err(|_| invalid())?,
                "jpeg_quality" => config.quality = value.parse().map_err(|_| invalid())?,
                "manifest_policy" => {
                    config.policy =
                        ManifestPolicy::from_str(value, true).map_err(|_| invalid())?;
                }
                "lighting" => config.lighting = parse_bool(value).ok_or_else(invalid)?,
                "ffmpeg_path" if !value.is_empty() => config.ffmpeg = PathBuf::from(value),
                "dataset_root" | "frame_prefix" | "ffmpeg_path" => return Err(invalid()),
                other => {
                    crate::utils::logger::debug(&format!("ignoring unknown config key '{}'", other));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fps".to_string(),
                value: self.fps.to_string(),
            });
        }
        // ffmpeg's mjpeg qscale range
        if !(1..=31).contains(&self.quality) {
            return Err(ConfigError::InvalidValue {
                key: "jpeg_quality".to_string(),
                value: self.quality.to_string(),
            });
        }
        if self.frame_prefix.contains(&['/', '\\'][..]) {
            return Err(ConfigError::InvalidValue {
                key: "frame_prefix".to_string(),
                value: self.frame_prefix.clone(),
            });
        }
        if let Some(tag) = self.tag.as_deref().filter(|tag| tag.contains(&['/', '\\'][..])) {
            return Err(ConfigError::InvalidValue {
                key: "dataset_tag".to_string(),
                value: tag.to_string(),
            });
        }
        Ok(())
    }

    pub fn effective_prefix(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}_{}", tag, self.frame_prefix),
            None => self.frame_prefix.clone(),
        }
    }

    pub fn frame_pattern(&self) -> Result<FramePattern> {
        FramePattern::new(&self.effective_prefix())
    }

    pub fn schema(&self) -> DatasetSchema {
        DatasetSchema::for_lighting(self.lighting)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(constants::MANIFEST_FILE)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
