//! Progress bars for TTY and non-TTY environments
//!
//! TTY mode: a bar on stderr, cleared on completion.
//! Non-TTY mode: hidden bar; the `info!` lines carry the progress.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<12.cyan.bold} {bar:30.green/dim} {pos:>6}/{len:6} {eta:>4} {wide_msg:.dim}",
    )
    .map(|style| style.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Bar counting `len` steps, drawn only when stderr is a terminal
pub fn bar(prefix: &str, len: u64) -> ProgressBar {
    bar_for(std::io::stderr().is_terminal(), prefix, len)
}

fn bar_for(is_tty: bool, prefix: &str, len: u64) -> ProgressBar {
    let pb = if is_tty {
        ProgressBar::new(len).with_style(bar_style())
    } else {
        ProgressBar::hidden()
    };
    pb.set_length(len);
    pb.set_prefix(prefix.to_string());
    pb
}
