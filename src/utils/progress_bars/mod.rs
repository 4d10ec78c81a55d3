pub mod logging;
pub mod progress_config;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Adds a determinate bar in the house style, or returns `None` when progress is off.
pub fn stage_bar(
    multi_progress: Option<&MultiProgress>,
    len: u64,
    message: &str,
) -> Option<ProgressBar> {
    multi_progress.map(|mp| {
        let pb = mp.add(ProgressBar::new(len));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "  {spinner:.cyan} [{elapsed_precise}] {bar:30.green/blue} {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message(message.to_string());
        pb
    })
}
