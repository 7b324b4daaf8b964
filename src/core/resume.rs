use anyhow::{bail, Context, Result};
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::shared::constants;

/// Matches `{prefix}_{digits}.jpg` and pulls out the index, whatever its padding.
/// The extension matches in any case, like the full-rescan listing.
#[derive(Debug, Clone)]
pub struct FramePattern {
    prefix: String,
    re: Regex,
}

impl FramePattern {
    pub fn new(prefix: &str) -> Result<Self> {
        let re = Regex::new(&format!(
            r"^{}_(\d+)\.(?i:{})$",
            regex::escape(prefix),
            constants::FRAME_EXTENSION
        ))
        .with_context(|| format!("invalid frame prefix: {}", prefix))?;
        Ok(Self {
            prefix: prefix.to_string(),
            re,
        })
    }

    pub fn index_of(&self, file_name: &str) -> Option<u64> {
        self.re
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
    }

    /// ffmpeg output template, e.g. `frame_%04d.jpg`.
    pub fn template(&self) -> String {
        format!(
            "{}_%0{}d.{}",
            self.prefix,
            constants::FRAME_INDEX_WIDTH,
            constants::FRAME_EXTENSION
        )
    }

    pub fn file_name(&self, index: u64) -> String {
        format!(
            "{}_{:0width$}.{}",
            self.prefix,
            index,
            constants::FRAME_EXTENSION,
            width = constants::FRAME_INDEX_WIDTH
        )
    }
}

/// Frames in `dir` that match the pattern, sorted by index.
/// A directory that does not exist yet has no frames.
pub fn numbered_frames(dir: &Path, pattern: &FramePattern) -> Result<Vec<(u64, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", dir.display()));
        }
    };

    let mut frames: Vec<(u64, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let index = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| pattern.index_of(name))?;
            Some((index, path))
        })
        .collect();

    frames.sort();
    Ok(frames)
}

/// Highest existing frame index, 0 when there is none.
pub fn max_index(dir: &Path, pattern: &FramePattern) -> Result<u64> {
    Ok(numbered_frames(dir, pattern)?
        .last()
        .map(|(index, _)| *index)
        .unwrap_or(0))
}

pub fn next_start_index(dir: &Path, pattern: &FramePattern) -> Result<u64> {
    let previous_max = max_index(dir, pattern)?;
    start_after(previous_max).with_context(|| format!("cannot resume numbering in {}", dir.display()))
}

/// First index after `previous_max`, bounded by what ffmpeg's `-start_number` accepts.
pub fn start_after(previous_max: u64) -> Result<u64> {
    match previous_max.checked_add(1) {
        Some(next) if next <= constants::MAX_START_INDEX => Ok(next),
        _ => bail!(
            "frame index {} leaves no room for new frames (limit {})",
            previous_max,
            constants::MAX_START_INDEX
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").expect("touch");
    }

    #[test]
    fn resumes_after_highest_index() {
        let tmp = TempDir::new().expect("tempdir");
        for name in ["frame_0001.jpg", "frame_0003.jpg", "frame_0007.jpg"] {
            touch(tmp.path(), name);
        }
        let pattern = FramePattern::new("frame").unwrap();
        assert_eq!(next_start_index(tmp.path(), &pattern).unwrap(), 8);
    }

    #[test]
    fn empty_or_missing_directory_starts_at_one() {
        let tmp = TempDir::new().expect("tempdir");
        let pattern = FramePattern::new("frame").unwrap();
        assert_eq!(next_start_index(tmp.path(), &pattern).unwrap(), 1);
        assert_eq!(
            next_start_index(&tmp.path().join("not-yet"), &pattern).unwrap(),
            1
        );
    }

    #[test]
    fn padding_width_does_not_matter() {
        let tmp = TempDir::new().expect("tempdir");
        touch(tmp.path(), "frame_9.jpg");
        touch(tmp.path(), "frame_00012.jpg");
        let pattern = FramePattern::new("frame").unwrap();
        assert_eq!(max_index(tmp.path(), &pattern).unwrap(), 12);
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let tmp = TempDir::new().expect("tempdir");
        touch(tmp.path(), "frame_0002.jpg");
        touch(tmp.path(), "frame_0050.png");
        touch(tmp.path(), "other_0099.jpg");
        touch(tmp.path(), "batchA_frame_0100.jpg");
        touch(tmp.path(), "notes.txt");
        fs::create_dir(tmp.path().join("frame_0500.jpg")).expect("dir");

        let pattern = FramePattern::new("frame").unwrap();
        assert_eq!(next_start_index(tmp.path(), &pattern).unwrap(), 3);

        let tagged = FramePattern::new("batchA_frame").unwrap();
        assert_eq!(next_start_index(tmp.path(), &tagged).unwrap(), 101);
    }

    #[test]
    fn uppercase_extension_counts() {
        let tmp = TempDir::new().expect("tempdir");
        touch(tmp.path(), "frame_0002.jpg");
        touch(tmp.path(), "frame_0009.JPG");
        let pattern = FramePattern::new("frame").unwrap();
        assert_eq!(next_start_index(tmp.path(), &pattern).unwrap(), 10);
        assert!(pattern.index_of("FRAME_0001.jpg").is_none());
    }

    #[test]
    fn huge_index_is_an_error_not_an_overflow() {
        let tmp = TempDir::new().expect("tempdir");
        touch(tmp.path(), &format!("frame_{}.jpg", u64::MAX));
        let pattern = FramePattern::new("frame").unwrap();

        assert_eq!(max_index(tmp.path(), &pattern).unwrap(), u64::MAX);
        let err = next_start_index(tmp.path(), &pattern).unwrap_err();
        assert!(format!("{:#}", err).contains("no room for new frames"));
    }

    #[test]
    fn start_index_stays_within_ffmpeg_range() {
        assert_eq!(start_after(0).unwrap(), 1);
        assert_eq!(
            start_after(constants::MAX_START_INDEX - 1).unwrap(),
            constants::MAX_START_INDEX
        );
        assert!(start_after(constants::MAX_START_INDEX).is_err());
    }

    #[test]
    fn template_and_file_name_agree() {
        let pattern = FramePattern::new("frame").unwrap();
        assert_eq!(pattern.template(), "frame_%04d.jpg");
        assert_eq!(pattern.file_name(7), "frame_0007.jpg");
        assert_eq!(pattern.index_of(&pattern.file_name(7)), Some(7));
    }
}
