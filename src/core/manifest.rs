use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::request::IngestionRequest;
use super::resume::{self, FramePattern};
use crate::shared::constants;
use crate::utils::file_utils;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest {path} has header '{found}' but this dataset expects '{expected}'")]
    SchemaMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },
    #[error("dataset schema records lighting but the request has none")]
    MissingLighting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestField {
    ImagePath,
    Interval,
    SubInterval,
    Light,
}

impl ManifestField {
    pub fn column(self) -> &'static str {
        match self {
            ManifestField::ImagePath => "image_path",
            ManifestField::Interval => "interval",
            ManifestField::SubInterval => "subinterval",
            ManifestField::Light => "light",
        }
    }
}

/// Column layout of one dataset's manifest. Header and rows share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    fields: Vec<ManifestField>,
}

impl DatasetSchema {
    pub fn with_lighting() -> Self {
        Self {
            fields: vec![
                ManifestField::ImagePath,
                ManifestField::Interval,
                ManifestField::SubInterval,
                ManifestField::Light,
            ],
        }
    }

    pub fn without_lighting() -> Self {
        Self {
            fields: vec![
                ManifestField::ImagePath,
                ManifestField::Interval,
                ManifestField::SubInterval,
            ],
        }
    }

    pub fn for_lighting(lighting: bool) -> Self {
        if lighting {
            Self::with_lighting()
        } else {
            Self::without_lighting()
        }
    }

    pub fn fields(&self) -> &[ManifestField] {
        &self.fields
    }

    pub fn has_lighting(&self) -> bool {
        self.fields.contains(&ManifestField::Light)
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.column()).collect()
    }

    fn header_line(&self) -> String {
        self.header().join(",")
    }
}

/// Which image files in the bucket count as new for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ManifestPolicy {
    /// Every `.jpg` in the bucket, every run. Re-runs duplicate rows.
    FullRescan,
    /// Only frames numbered above the pre-extraction maximum.
    Incremental,
}

impl ManifestPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestPolicy::FullRescan => "full-rescan",
            ManifestPolicy::Incremental => "incremental",
        }
    }
}

pub struct ManifestWriter {
    root: PathBuf,
    path: PathBuf,
    schema: DatasetSchema,
}

impl ManifestWriter {
    pub fn new(root: &Path, schema: DatasetSchema) -> Self {
        Self {
            root: root.to_path_buf(),
            path: root.join(constants::MANIFEST_FILE),
            schema,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the header into a missing or zero-byte manifest; checks it on any other.
    pub fn ensure_header(&self) -> Result<()> {
        let expected = self.schema.header_line();

        let existing = match fs::File::open(&self.path) {
            Ok(file) => {
                let mut reader = BufReader::new(file);
                let mut first = String::new();
                let read = reader
                    .read_line(&mut first)
                    .with_context(|| format!("failed to read {}", self.path.display()))?;
                (read > 0).then(|| first.trim_end_matches(&['\r', '\n'][..]).to_string())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to open {}", self.path.display()));
            }
        };

        match existing {
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(ManifestError::SchemaMismatch {
                path: self.path.clone(),
                found,
                expected,
            }
            .into()),
            None => {
                fs::create_dir_all(&self.root).with_context(|| {
                    format!("failed to create dataset root {}", self.root.display())
                })?;
                fs::write(&self.path, format!("{}\n", expected))
                    .with_context(|| format!("failed to write {}", self.path.display()))?;
                crate::utils::logger::info(&format!(
                    "created manifest {} with header '{}'",
                    self.path.display(),
                    expected
                ));
                Ok(())
            }
        }
    }

    /// Files in `target_dir` to record for this run, ordered by frame index.
    pub fn select_new_frames(
        target_dir: &Path,
        pattern: &FramePattern,
        policy: ManifestPolicy,
        previous_max: u64,
    ) -> Result<Vec<PathBuf>> {
        match policy {
            ManifestPolicy::FullRescan => {
                let mut files = file_utils::list_files(target_dir, constants::FRAME_EXTENSION)?;
                files.sort_by_key(|path| {
                    let index = path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .and_then(|name| pattern.index_of(name));
                    (index, path.clone())
                });
                Ok(files)
            }
            ManifestPolicy::Incremental => Ok(resume::numbered_frames(target_dir, pattern)?
                .into_iter()
                .filter(|(index, _)| *index > previous_max)
                .map(|(_, path)| path)
                .collect()),
        }
    }

    pub fn row_for(&self, request: &IngestionRequest, file: &Path) -> Result<Vec<String>> {
        self.schema
            .fields()
            .iter()
            .map(|field| match field {
                ManifestField::ImagePath => file_utils::relative_slash_path(&self.root, file),
                ManifestField::Interval => Ok(request.interval().to_string()),
                ManifestField::SubInterval => Ok(request.sub_interval().to_string()),
                ManifestField::Light => request
                    .lighting()
                    .map(|light| light.as_str().to_lowercase())
                    .ok_or_else(|| anyhow::Error::from(ManifestError::MissingLighting)),
            })
            .collect()
    }

    /// Appends one row per file in a single write. Returns the row count.
    pub fn append(&self, request: &IngestionRequest, files: &[PathBuf]) -> Result<usize> {
        if files.is_empty() {
            return Ok(0);
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        for file in files {
            writer.write_record(self.row_for(request, file)?)?;
        }
        let batch = writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("failed to encode manifest rows: {}", err))?;

        let mut manifest = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {} for append", self.path.display()))?;
        if !ends_with_newline(&mut manifest)? {
            manifest
                .write_all(b"\n")
                .with_context(|| format!("failed to append to {}", self.path.display()))?;
        }
        manifest
            .write_all(&batch)
            .with_context(|| format!("failed to append to {}", self.path.display()))?;

        Ok(files.len())
    }

    /// Header check, selection and append in one step.
    pub fn record(
        &self,
        request: &IngestionRequest,
        target_dir: &Path,
        pattern: &FramePattern,
        policy: ManifestPolicy,
        previous_max: u64,
    ) -> Result<usize> {
        self.ensure_header()?;
        let files = Self::select_new_frames(target_dir, pattern, policy, previous_max)?;
        let appended = self.append(request, &files)?;

        if appended == 0 {
            crate::utils::logger::info(&format!(
                "no new manifest entries for {} (policy {})",
                target_dir.display(),
                policy.as_str()
            ));
        } else {
            crate::utils::logger::info(&format!(
                "appended {} rows to {} (policy {})",
                appended,
                self.path.display(),
                policy.as_str()
            ));
        }

        Ok(appended)
    }
}

/// An empty file counts as terminated.
fn ends_with_newline(file: &mut fs::File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout;
    use crate::core::request::Lighting;
    use tempfile::TempDir;

    fn request(tmp: &TempDir, lighting: Option<Lighting>) -> IngestionRequest {
        let video = tmp.path().join("clip.mp4");
        fs::write(&video, b"x").expect("write video");
        IngestionRequest::new(&video, "1-2", "1.3", lighting, lighting.is_some()).unwrap()
    }

    fn frames(dir: &Path, indices: &[u64]) {
        fs::create_dir_all(dir).expect("mkdir");
        let pattern = FramePattern::new("frame").unwrap();
        for index in indices {
            fs::write(dir.join(pattern.file_name(*index)), b"").expect("write frame");
        }
    }

    fn manifest_lines(writer: &ManifestWriter) -> Vec<String> {
        fs::read_to_string(writer.path())
            .expect("read manifest")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn header_is_written_once() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        let writer = ManifestWriter::new(&root, DatasetSchema::with_lighting());

        writer.ensure_header().unwrap();
        writer.ensure_header().unwrap();

        assert_eq!(manifest_lines(&writer), vec!["image_path,interval,subinterval,light"]);
    }

    #[test]
    fn header_mismatch_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        ManifestWriter::new(&root, DatasetSchema::with_lighting())
            .ensure_header()
            .unwrap();

        let err = ManifestWriter::new(&root, DatasetSchema::without_lighting())
            .ensure_header()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn blank_first_line_is_a_mismatch_and_rows_survive() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        fs::create_dir_all(&root).expect("mkdir");
        let original = "\nold/row.jpg,1-2,1.3\n";
        fs::write(root.join(constants::MANIFEST_FILE), original).expect("seed manifest");

        let req = request(&tmp, None);
        let dir = layout::target_dir(&root, &req);
        frames(&dir, &[1]);
        let writer = ManifestWriter::new(&root, DatasetSchema::without_lighting());
        let pattern = FramePattern::new("frame").unwrap();
        let err = writer
            .record(&req, &dir, &pattern, ManifestPolicy::Incremental, 0)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::SchemaMismatch { found, .. }) if found.is_empty()
        ));
        assert_eq!(fs::read_to_string(writer.path()).unwrap(), original);
    }

    #[test]
    fn zero_byte_manifest_gets_a_header() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join(constants::MANIFEST_FILE), b"").expect("seed manifest");

        let writer = ManifestWriter::new(&root, DatasetSchema::without_lighting());
        writer.ensure_header().unwrap();

        assert_eq!(manifest_lines(&writer), vec!["image_path,interval,subinterval"]);
    }

    #[test]
    fn unterminated_last_line_is_closed_before_appending() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join(constants::MANIFEST_FILE), "image_path,interval,subinterval")
            .expect("seed manifest");

        let req = request(&tmp, None);
        let dir = layout::target_dir(&root, &req);
        frames(&dir, &[1]);
        let writer = ManifestWriter::new(&root, DatasetSchema::without_lighting());
        let pattern = FramePattern::new("frame").unwrap();
        writer
            .record(&req, &dir, &pattern, ManifestPolicy::Incremental, 0)
            .unwrap();

        assert_eq!(
            fs::read_to_string(writer.path()).unwrap(),
            "image_path,interval,subinterval\n1-2Interval/1_3Pounds/frame_0001.jpg,1-2,1.3\n"
        );
    }

    #[test]
    fn both_policies_treat_uppercase_extension_alike() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        let req = request(&tmp, None);
        let dir = layout::target_dir(&root, &req);
        frames(&dir, &[1]);
        fs::write(dir.join("frame_0002.JPG"), b"").expect("write frame");

        let pattern = FramePattern::new("frame").unwrap();
        let full =
            ManifestWriter::select_new_frames(&dir, &pattern, ManifestPolicy::FullRescan, 0)
                .unwrap();
        let incremental =
            ManifestWriter::select_new_frames(&dir, &pattern, ManifestPolicy::Incremental, 0)
                .unwrap();

        assert_eq!(full.len(), 2);
        assert_eq!(full, incremental);
    }

    #[test]
    fn rows_carry_relative_path_and_lowercase_light() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        let req = request(&tmp, Some(Lighting::Medium));
        let dir = layout::target_dir(&root, &req);
        frames(&dir, &[1, 2]);

        let writer = ManifestWriter::new(&root, DatasetSchema::with_lighting());
        let pattern = FramePattern::new("frame").unwrap();
        let appended = writer
            .record(&req, &dir, &pattern, ManifestPolicy::Incremental, 0)
            .unwrap();

        assert_eq!(appended, 2);
        assert_eq!(
            manifest_lines(&writer),
            vec![
                "image_path,interval,subinterval,light",
                "1-2Interval/1_3Pounds/MediumLight/frame_0001.jpg,1-2,1.3,medium",
                "1-2Interval/1_3Pounds/MediumLight/frame_0002.jpg,1-2,1.3,medium",
            ]
        );
        assert!(fs::read_to_string(writer.path()).unwrap().ends_with('\n'));
    }

    #[test]
    fn lighting_free_rows_match_header_width() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        let req = request(&tmp, None);
        let dir = layout::target_dir(&root, &req);
        frames(&dir, &[1, 2, 3]);

        let writer = ManifestWriter::new(&root, DatasetSchema::without_lighting());
        let pattern = FramePattern::new("frame").unwrap();
        writer
            .record(&req, &dir, &pattern, ManifestPolicy::Incremental, 0)
            .unwrap();

        let lines = manifest_lines(&writer);
        let width = lines[0].split(',').count();
        assert_eq!(width, 3);
        for line in &lines[1..] {
            assert_eq!(line.split(',').count(), width, "row {line:?}");
        }
    }

    #[test]
    fn lighting_schema_without_lighting_value_is_an_error() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        let req = request(&tmp, None);
        let writer = ManifestWriter::new(&root, DatasetSchema::with_lighting());
        let file = layout::target_dir(&root, &req).join("frame_0001.jpg");

        let err = writer.row_for(&req, &file).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::MissingLighting)
        ));
    }

    #[test]
    fn incremental_skips_frames_from_earlier_runs() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        let req = request(&tmp, None);
        let dir = layout::target_dir(&root, &req);
        frames(&dir, &[1, 2, 3, 4, 5]);

        let pattern = FramePattern::new("frame").unwrap();
        let selected =
            ManifestWriter::select_new_frames(&dir, &pattern, ManifestPolicy::Incremental, 3)
                .unwrap();
        let names: Vec<_> = selected
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["frame_0004.jpg", "frame_0005.jpg"]);
    }

    #[test]
    fn incremental_with_nothing_new_leaves_manifest_untouched() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        let req = request(&tmp, None);
        let dir = layout::target_dir(&root, &req);
        frames(&dir, &[1, 2]);

        let writer = ManifestWriter::new(&root, DatasetSchema::without_lighting());
        let pattern = FramePattern::new("frame").unwrap();
        let appended = writer
            .record(&req, &dir, &pattern, ManifestPolicy::Incremental, 2)
            .unwrap();

        assert_eq!(appended, 0);
        assert_eq!(manifest_lines(&writer).len(), 1);
    }

    #[test]
    fn full_rescan_duplicates_rows_for_existing_frames() {
        // Known defect of the full-rescan policy: earlier frames are recorded again.
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("dataset");
        let req = request(&tmp, None);
        let dir = layout::target_dir(&root, &req);
        let writer = ManifestWriter::new(&root, DatasetSchema::without_lighting());
        let pattern = FramePattern::new("frame").unwrap();

        frames(&dir, &[1, 2]);
        writer
            .record(&req, &dir, &pattern, ManifestPolicy::FullRescan, 0)
            .unwrap();
        frames(&dir, &[3]);
        writer
            .record(&req, &dir, &pattern, ManifestPolicy::FullRescan, 2)
            .unwrap();

        let lines = manifest_lines(&writer);
        assert_eq!(lines.len(), 1 + 2 + 3);
        let first = "1-2Interval/1_3Pounds/frame_0001.jpg,1-2,1.3";
        assert_eq!(lines.iter().filter(|l| l.as_str() == first).count(), 2);
    }
}
