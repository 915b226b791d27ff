//! Single-line progress rendering for the prepare and download phases.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress line redrawn in place: spinner, percentage, bar, and a label
/// truncated to the terminal width.
#[derive(Clone)]
pub struct PageProgress {
    bar: ProgressBar,
}

impl PageProgress {
    /// Creates a bar for `total` steps, drawn on stderr when it is a terminal.
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template("{spinner} {percent:>3}% [{bar:40.cyan/blue}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    /// Creates a bar that never draws.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Moves the bar to `current` of `total` with a new label.
    pub fn update(&self, current: u64, total: u64, label: impl Into<String>) {
        self.bar.set_length(total);
        self.bar.set_position(current.min(total));
        self.bar.set_message(label.into());
    }

    /// Runs `f` with the bar cleared, for printing or prompting.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    /// Returns the position of the bar.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Fills the bar and clears the line.
    pub fn finish(&self) {
        if let Some(total) = self.bar.length() {
            self.bar.set_position(total);
        }
        self.bar.finish_and_clear();
    }
}

/// Builds the label shown while pages download:
/// `Downloaded [ 3/20] pages of chapter 5 [1/4] of volume 2 [1/1]`.
pub fn download_label(
    page: (usize, usize),
    chapter: (&str, usize, usize),
    volume: Option<(&str, usize, usize)>,
) -> String {
    let width = |total: usize| total.to_string().len();
    let (page_index, page_total) = page;
    let (chapter_label, chapter_index, chapter_total) = chapter;

    let mut label = format!(
        "Downloaded [{:>w$}/{}] pages of chapter {} [{:>cw$}/{}]",
        page_index,
        page_total,
        chapter_label,
        chapter_index,
        chapter_total,
        w = width(page_total),
        cw = width(chapter_total),
    );

    if let Some((volume_label, volume_index, volume_total)) = volume {
        label.push_str(&format!(
            " of volume {} [{:>vw$}/{}]",
            volume_label,
            volume_index,
            volume_total,
            vw = width(volume_total),
        ));
    }
    label
}
