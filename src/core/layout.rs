use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::request::{IngestionRequest, Lighting};
use crate::shared::constants;

pub fn interval_dir_name(interval: &str) -> String {
    format!("{}{}", interval.trim(), constants::INTERVAL_SUFFIX)
}

pub fn sub_interval_dir_name(sub_interval: &str) -> String {
    format!(
        "{}{}",
        sub_interval.trim().replacen('.', "_", 1),
        constants::SUB_INTERVAL_SUFFIX
    )
}

pub fn lighting_dir_name(lighting: Lighting) -> String {
    let value = lighting.as_str();
    let mut chars = value.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    format!("{}{}", capitalized, constants::LIGHT_SUFFIX)
}

/// Bucket directory for a request. Same request and root, same path.
pub fn target_dir(root: &Path, request: &IngestionRequest) -> PathBuf {
    bucket_dir(root, request.interval(), request.sub_interval(), request.lighting())
}

pub fn bucket_dir(
    root: &Path,
    interval: &str,
    sub_interval: &str,
    lighting: Option<Lighting>,
) -> PathBuf {
    let mut dir = root
        .join(interval_dir_name(interval))
        .join(sub_interval_dir_name(sub_interval));
    if let Some(lighting) = lighting {
        dir.push(lighting_dir_name(lighting));
    }
    dir
}

/// Creates the whole directory chain. Existing directories are fine.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create dataset directory {}", dir.display()))
}
