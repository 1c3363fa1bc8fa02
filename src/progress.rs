//! Progress reporting: one count-style bar per stage, ticking once per chunk.

use crate::config::PipelineOptions;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Count-style progress bar (chunks processed out of total), with an optional label.
pub fn make_count_progress(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
         it/s: {per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Bar for a stage over `total` chunks, or `None` when progress is off.
/// A user-supplied label overrides the stage's default.
pub fn stage_progress(opts: &PipelineOptions, total: usize, default_label: &str) -> Option<ProgressBar> {
    if !opts.progress {
        return None;
    }
    let label = opts.progress_label.as_deref().unwrap_or(default_label);
    Some(make_count_progress(total as u64, label))
}
