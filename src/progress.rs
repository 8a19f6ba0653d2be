//! Download progress reporting.

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg} {spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const BAR_CHARS: &str = "█▓▒░  ";

/// Receives the size of every body piece read for one download.
pub trait ProgressReporter: Send {
    fn advance(&mut self, bytes: u64);
    fn finish(self: Box<Self>);

    /// Closes the reporter after a failed read, leaving it at its current
    /// position.
    fn abandon(self: Box<Self>) {
        self.finish();
    }
}

/// Creates a reporter for a download of `total` declared bytes.
pub trait ProgressFactory: Send + Sync {
    fn create(&self, total: u64, label: &str) -> Box<dyn ProgressReporter>;
}

/// Factory for clients that never display progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressFactory for NoProgress {
    fn create(&self, _total: u64, _label: &str) -> Box<dyn ProgressReporter> {
        Box::new(SilentReporter)
    }
}

struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn advance(&mut self, _bytes: u64) {}

    fn finish(self: Box<Self>) {}
}

/// Terminal progress bar drawn on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalProgress;

impl ProgressFactory for TerminalProgress {
    fn create(&self, total: u64, label: &str) -> Box<dyn ProgressReporter> {
        let bar = ProgressBar::new(total);
        bar.set_style(bar_style());
        bar.set_message(label.to_owned());
        Box::new(BarReporter { bar })
    }
}

fn bar_style() -> ProgressStyle {
    match ProgressStyle::with_template(BAR_TEMPLATE) {
        Ok(style) => style.tick_chars(TICK).progress_chars(BAR_CHARS),
        Err(_) => ProgressStyle::default_bar(),
    }
}

struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn advance(&mut self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(self: Box<Self>) {
        self.bar.finish();
    }

    fn abandon(self: Box<Self>) {
        self.bar.abandon();
    }
}
