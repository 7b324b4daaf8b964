use serde::Serialize;
use std::env;
use std::process::Command;

use crate::core::config::DatasetConfig;
use crate::core::extractor::FfmpegExtractor;

/// What `detect` reports: the host, the extraction engine and the dataset it would write to.
#[derive(Debug, Serialize)]
pub struct PlatformInfo {
    pub os_name: String,
    pub os_version: String,
    pub arch: String,
    pub terminal: String,
    pub shell: String,
    pub ffmpeg_path: String,
    pub ffmpeg_available: bool,
    pub ffmpeg_version: Option<String>,
    pub dataset_root: String,
    pub manifest_exists: bool,
    pub frame_prefix: String,
    pub fps: u32,
    pub manifest_policy: String,
    pub lighting: bool,
}

impl PlatformInfo {
    pub fn detect(config: &DatasetConfig) -> Self {
        let ffmpeg = FfmpegExtractor::new(&config.ffmpeg);
        let ffmpeg_version = ffmpeg.version();

        Self {
            os_name: std::env::consts::OS.to_string(),
            os_version: Self::detect_os_version(),
            arch: std::env::consts::ARCH.to_string(),
            terminal: Self::detect_terminal(),
            shell: Self::detect_shell(),
            ffmpeg_path: ffmpeg.binary().display().to_string(),
            ffmpeg_available: ffmpeg_version.is_some(),
            ffmpeg_version,
            dataset_root: config.root.display().to_string(),
            manifest_exists: config.manifest_path().is_file(),
            frame_prefix: config.effective_prefix(),
            fps: config.fps,
            manifest_policy: config.policy.as_str().to_string(),
            lighting: config.lighting,
        }
    }

    fn detect_os_version() -> String {
        if let Ok(output) = Command::new("uname").arg("-r").output() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            "Unknown".to_string()
        }
    }

    fn detect_terminal() -> String {
        if let Ok(term) = env::var("TERM_PROGRAM") {
            return term;
        }
        if let Ok(term) = env::var("TERM") {
            return term;
        }
        "Unknown".to_string()
    }

    fn detect_shell() -> String {
        if let Ok(shell) = env::var("SHELL") {
            shell.split('/').last().unwrap_or("unknown").to_string()
        } else {
            "unknown".to_string()
        }
    }
}
