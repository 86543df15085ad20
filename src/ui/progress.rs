//! ui::progress
//!
//! Terminal progress bar for a running publish.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::publish::{ProgressSink, ProgressUpdate, PublishState};

/// Renders [`ProgressUpdate`]s as a single 0-100 bar on stderr.
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    /// A visible bar, or a hidden one when `visible` is false.
    pub fn new(visible: bool) -> Self {
        let bar = ProgressBar::with_draw_target(
            Some(100),
            if visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        bar.set_style(
            ProgressStyle::with_template("{bar:30.cyan/blue} {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for TerminalProgress {
    fn update(&self, update: &ProgressUpdate) {
        self.bar.set_position(update.progress as u64);
        self.bar.set_message(message(update));
    }
}

fn message(update: &ProgressUpdate) -> String {
    match update.state {
        PublishState::UploadingBlobs | PublishState::BuildingTree if update.total > 0 => {
            format!("{} ({}/{})", update.state, update.completed, update.total)
        }
        state => state.to_string(),
    }
}
