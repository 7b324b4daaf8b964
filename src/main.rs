mod core;
mod shared;
mod ui;
mod utils;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::launcher::{self, ReportFormat};
use crate::core::manifest::ManifestPolicy;
use crate::core::request;
use crate::core::{layout, resume};
use crate::core::{DatasetConfig, IngestionRequest, Lighting};
use crate::shared::constants;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Extract still frames from food pile clips into a labeled image dataset",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    dataset: DatasetOptions,
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the values in the config file.
#[derive(Args)]
struct DatasetOptions {
    /// Config file with `key = value` lines (missing file means defaults)
    #[arg(long, global = true, default_value = constants::CONFIG_FILE)]
    config: PathBuf,
    /// Dataset root directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Frames extracted per second of video
    #[arg(long, global = true)]
    fps: Option<u32>,
    /// Which image files count as new when updating the manifest
    #[arg(long, global = true, value_enum)]
    policy: Option<ManifestPolicy>,
    /// Dataset without the lighting level and column
    #[arg(long, global = true, default_value_t = false)]
    no_lighting: bool,
    /// Batch tag prepended to frame file names
    #[arg(long, global = true)]
    tag: Option<String>,
    /// ffmpeg binary to run
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,
}

impl DatasetOptions {
    fn resolve(&self) -> Result<DatasetConfig> {
        let mut config = DatasetConfig::load(&self.config)?;
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if self.no_lighting {
            config.lighting = false;
        }
        if let Some(tag) = &self.tag {
            config.tag = (!tag.trim().is_empty()).then(|| tag.trim().to_string());
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            config.ffmpeg = ffmpeg.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive wizard: ask for the clip and its labels, then ingest it
    Menu,
    /// Ingest one clip without prompting
    Ingest {
        #[arg(short, long)]
        video: PathBuf,
        #[arg(short, long)]
        interval: String,
        #[arg(short, long)]
        sub_interval: String,
        #[arg(short, long, value_enum)]
        light: Option<Lighting>,
        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        /// No spinner
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
    /// Print the next frame index for a bucket without extracting
    Resume {
        #[arg(short, long)]
        interval: String,
        #[arg(short, long)]
        sub_interval: String,
        #[arg(short, long, value_enum)]
        light: Option<Lighting>,
    },
    /// Report platform, ffmpeg and dataset settings as JSON
    Detect,
}

fn main() -> Result<()> {
    let cwd = std::env::current_dir().unwrap_or_default();
    crate::utils::logger::init(&cwd);

    let cli = Cli::parse();
    let result = run(cli);
    if let Err(err) = &result {
        crate::utils::logger::error(&format!("{:#}", err));
    }
    result
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.dataset.resolve()?;

    match cli.command {
        Commands::Menu => {
            // Reset terminal state left behind by an earlier crash.
            let _ = crossterm::terminal::disable_raw_mode();
            launcher::run(&config)?;
        }
        Commands::Ingest {
            video,
            interval,
            sub_interval,
            light,
            json,
            quiet,
        } => {
            let request =
                IngestionRequest::new(&video, &interval, &sub_interval, light, config.lighting)?;
            let format = if json {
                ReportFormat::Json
            } else {
                ReportFormat::Text
            };
            launcher::ingest(&config, &request, format, quiet)?;
        }
        Commands::Resume {
            interval,
            sub_interval,
            light,
        } => {
            let interval = request::validate_interval(&interval)?;
            let sub_interval = request::validate_sub_interval(&sub_interval)?;
            request::check_lighting(config.lighting, light)?;

            let target = layout::bucket_dir(&config.root, &interval, &sub_interval, light);
            let next = resume::next_start_index(&target, &config.frame_pattern()?)?;
            crate::utils::logger::info(&format!(
                "resume query target={} next={}",
                target.display(),
                next
            ));
            println!("{}", next);
        }
        Commands::Detect => {
            let info = crate::utils::platform::PlatformInfo::detect(&config);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}
