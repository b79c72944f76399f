//! Progress bars for long running operations

use indicatif::{ProgressBar, ProgressStyle};
use mxt_core::ops::Progress;

/// `Progress` implementation drawing an indicatif bar on stderr
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Progress for BarProgress {
    fn start(&mut self, total: usize, what: &'static str) {
        let pb = ProgressBar::new(total as u64);
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})")
        {
            Ok(style) => pb.set_style(style.progress_chars("#>-")),
            Err(e) => log::debug!("Progress template rejected: {}", e),
        }
        pb.set_message(what);
        self.bar = Some(pb);
    }

    fn advance(&mut self, done: usize) {
        if let Some(pb) = &self.bar {
            pb.set_position(done as u64);
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message("done");
        }
    }
}
