use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use lightcurve_core::pipeline::{PipelineStage, ProgressReporter};

/// One progress bar per batch, stacked in a [`MultiProgress`].
pub struct BatchProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    style: ProgressStyle,
    spinner: ProgressStyle,
}

impl BatchProgress {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            style: ProgressStyle::default_bar()
                .template("{prefix:>24} {msg:22} [{bar:30}] {pos}/{len}")?
                .progress_chars("=> "),
            spinner: ProgressStyle::default_spinner().template("{prefix:>24} {spinner} {msg}")?,
        })
    }

    fn with_bar(&self, batch: &str, f: impl FnOnce(&ProgressBar)) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        let bar = bars.entry(batch.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(0));
            bar.set_prefix(batch.to_string());
            bar
        });
        f(bar);
    }

    /// Close every bar, leaving its final line on screen.
    pub fn finish(&self) {
        if let Ok(bars) = self.bars.lock() {
            for bar in bars.values() {
                bar.finish_with_message("done");
            }
        }
    }
}

impl ProgressReporter for BatchProgress {
    fn begin_stage(&self, batch: &str, stage: PipelineStage, total_items: Option<usize>) {
        self.with_bar(batch, |bar| {
            match total_items {
                Some(total) => {
                    bar.set_style(self.style.clone());
                    bar.set_length(total as u64);
                }
                None => {
                    bar.set_style(self.spinner.clone());
                }
            }
            bar.set_position(0);
            bar.set_message(stage.to_string());
        });
    }

    fn advance(&self, batch: &str, items_done: usize) {
        self.with_bar(batch, |bar| bar.set_position(items_done as u64));
    }

    fn finish_stage(&self, batch: &str) {
        self.with_bar(batch, |bar| {
            if let Some(len) = bar.length() {
                bar.set_position(len);
            }
        });
    }
}
