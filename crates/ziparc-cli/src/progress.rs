//! Terminal progress sinks

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use ziparc_core::{ProgressEvent, ProgressSink};

/// Bar resolution; fractions are mapped onto `0..=BAR_LEN`
const BAR_LEN: u64 = 1000;

/// Renders progress events as an indicatif bar on stderr
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(BAR_LEN);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}%")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Clear the bar once the operation is over
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        self.bar
            .set_position((event.fraction * BAR_LEN as f64).round() as u64);
    }
}

/// Writes each event as a JSON line on stderr
pub struct JsonProgress;

impl ProgressSink for JsonProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{}", line);
        }
    }
}
