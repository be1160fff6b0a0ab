//! Transfer progress display
//!
//! The transfer engine reports through the [`Progress`] trait; the server
//! uses [`NoProgress`], the command-line client a [`TransferBar`].

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

pub trait Progress {
    fn start(&self, _total: Option<u64>) {}
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
    /// Transfer failed part-way.
    fn abandon(&self) {}
}

pub struct NoProgress;
impl Progress for NoProgress {}

/// Byte progress bar for sized transfers, spinner otherwise
pub struct TransferBar {
    bar: ProgressBar,
    label: String,
    start_time: Instant,
}

impl TransferBar {
    pub fn new(label: &str) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            label: label.to_string(),
            start_time: Instant::now(),
        }
    }
}

impl Progress for TransferBar {
    fn start(&self, total: Option<u64>) {
        match total {
            Some(len) => {
                self.bar.set_length(len);
                self.bar.set_style(
                    ProgressStyle::default_bar()
                        .template("  {msg} [{bar:30.green}] {bytes}/{total_bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
            }
            None => {
                self.bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("  {spinner} {msg} {bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                self.bar.enable_steady_tick(Duration::from_millis(120));
            }
        }
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_message(self.label.clone());
    }

    fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let bytes = self.bar.position();
        let rate = if elapsed > 0.0 {
            bytes as f64 / elapsed / 1_048_576.0
        } else {
            0.0
        };
        self.bar.finish_with_message(format!(
            "{} ({:.1} MB/s)",
            self.label, rate
        ));
    }

    fn abandon(&self) {
        self.bar
            .abandon_with_message(format!("{} (failed)", self.label));
    }
}
