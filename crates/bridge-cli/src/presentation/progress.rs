//! Progress bar for model pulls.

use bridge_core::PullProgress;
use indicatif::{ProgressBar, ProgressStyle};

/// Renders pull progress records. Layers with known sizes get a byte bar;
/// everything else (manifest, verification) shows as a spinner message.
pub struct PullProgressBar {
    bar: ProgressBar,
    digest: Option<String>,
}

impl PullProgressBar {
    pub fn new(model: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.set_message(format!("pulling {model}"));
        Self { bar, digest: None }
    }

    pub fn update(&mut self, progress: &PullProgress) {
        match (progress.total, progress.completed) {
            (Some(total), completed) if total > 0 => {
                if self.digest != progress.digest || self.bar.length() != Some(total) {
                    self.digest.clone_from(&progress.digest);
                    self.bar.set_style(bytes_style());
                    self.bar.set_length(total);
                }
                self.bar.set_position(completed.unwrap_or(0));
                self.bar.set_message(short_digest(progress));
            }
            _ => {
                if self.digest.take().is_some() {
                    self.bar.set_style(spinner_style());
                }
                self.bar.set_message(progress.status.clone());
                self.bar.tick();
            }
        }
    }

    pub fn finish(self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn abandon(self) {
        self.bar.abandon();
    }
}

fn short_digest(progress: &PullProgress) -> String {
    progress.digest.as_deref().map_or_else(
        || progress.status.clone(),
        |digest| {
            let hex: String = digest.trim_start_matches("sha256:").chars().take(12).collect();
            format!("{} {hex}", progress.status)
        },
    )
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("█▓░"))
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
