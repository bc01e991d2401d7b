use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const BAR_CHARS: &str = "█▓▒░  ";

/// Progress over a known number of sequential jobs.
pub fn job_bar(len: usize, prefix: &str) -> ProgressBar {
    let style = match ProgressStyle::with_template(BAR_TEMPLATE) {
        Ok(style) => style.tick_chars(TICK).progress_chars(BAR_CHARS),
        Err(_) => ProgressStyle::default_bar(),
    };
    let pb = ProgressBar::new(len as u64);
    pb.set_style(style);
    pb.set_message(prefix.to_string());
    pb
}
