use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

use crate::core::extractor::ExtractionProgress;

/// Spinner fed by the extractor's progress callback. Hidden off a terminal.
pub struct ExtractionSpinner {
    bar: ProgressBar,
}

impl ExtractionSpinner {
    pub fn new(label: &str, quiet: bool) -> Self {
        let bar = if quiet || !std::io::stderr().is_terminal() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.yellow} [{elapsed_precise}] {prefix:.bold} {msg}")
                    .expect("valid spinner template")
                    .tick_chars("|/-\\ "),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        bar.set_prefix(label.to_string());
        bar.set_message("starting ffmpeg");
        Self { bar }
    }

    pub fn update(&self, progress: ExtractionProgress) {
        self.bar.set_message(format!(
            "{} frames extracted (latest index {})",
            progress.frames, progress.index
        ));
    }

    pub fn finish(&self, frames: u64) {
        self.bar
            .finish_with_message(format!("{} frames extracted", frames));
    }

    pub fn abandon(&self) {
        self.bar.abandon_with_message("extraction failed");
    }
}
