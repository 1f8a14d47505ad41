//! Progress reporting for concurrent snapshot ingestion
//!
//! Each in-flight snapshot gets its own bar under a shared `MultiProgress`
//! so several workers can render at once without interleaving. Bars are
//! sized from the schema manifest's expected row count; when the manifest
//! has none, a spinner with a running row count stands in.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Row-progress bar for one snapshot being merged
pub fn file_progress(multi: &MultiProgress, expected_rows: u64, message: &str) -> ProgressBar {
    let bar = if expected_rows > 0 {
        let bar = ProgressBar::new(expected_rows);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} rows ({eta})",
                )
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        bar
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} ({pos} rows)")
                .expect("Invalid spinner template"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };

    let bar = multi.add(bar);
    bar.set_message(message.to_string());
    bar
}
