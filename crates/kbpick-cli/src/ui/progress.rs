//! Spinner for remote mutations.
//!
//! Index and de-index calls can take several seconds. The spinner is only
//! drawn on an interactive terminal and never in `--quiet` or `--json` mode.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress feedback mode based on output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Interactive TTY: animated spinner
    Interactive,
    /// Non-TTY or `--quiet`: final results only
    Quiet,
    /// `--json`: no progress output at all
    Silent,
}

impl ProgressMode {
    /// Detect the appropriate mode from flags and stdout.
    pub fn detect(quiet: bool, json: bool) -> Self {
        if json {
            Self::Silent
        } else if quiet || !atty::is(atty::Stream::Stdout) {
            Self::Quiet
        } else {
            Self::Interactive
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// Spinner tick characters (Braille-based).
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// A spinner that wraps indicatif.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// Start a spinner, hidden unless `mode` is interactive.
    ///
    /// ```ignore
    /// let progress = Progress::spinner("Indexing 3 items...", mode);
    /// let outcome = explorer.index_selected().await;
    /// progress.finish_clear();
    /// ```
    pub fn spinner(message: &str, mode: ProgressMode) -> Self {
        let bar = if mode.is_interactive() {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .tick_chars(SPINNER_CHARS)
                    .template("{spinner:.cyan} {msg} ({elapsed})")
                    .expect("valid template"),
            );
            pb.set_message(message.to_string());
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            ProgressBar::hidden()
        };

        Self { bar }
    }

    /// Finish and clear the spinner line.
    pub fn finish_clear(&self) {
        self.bar.finish_and_clear();
    }
}
