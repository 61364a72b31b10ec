//! Terminal progress reporting.
//!
//! A spinner runs while the tool itself is working. It is cleared before
//! every agent call, which takes over the terminal.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use relnotes_core::progress::PipelineProgress;
use relnotes_shared::WorkItem;

const RULE: &str = "==================================================";

/// CLI progress reporter using an indicatif spinner plus plain banners.
pub(crate) struct CliProgress {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn new_spinner() -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    }

    /// Stop and erase the spinner, if one is running.
    pub(crate) fn clear(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
    }

    fn println(&self, line: &str) {
        let guard = self.spinner.lock().ok();
        match guard.as_ref().and_then(|slot| slot.as_ref()) {
            Some(spinner) => spinner.println(line),
            None => println!("{line}"),
        }
    }
}

impl PipelineProgress for CliProgress {
    fn phase(&self, name: &str) {
        if let Ok(mut slot) = self.spinner.lock() {
            slot.get_or_insert_with(Self::new_spinner)
                .set_message(name.to_string());
        }
    }

    fn source_fetched(&self, id: &str, ok: bool) {
        let mark = if ok { "✓" } else { "✗ unavailable:" };
        self.println(&format!("  {mark} {id}"));
    }

    fn batch_started(&self, start: usize, end: usize, total: usize) {
        self.clear();
        println!("\nProcessing items {}-{end} of {total}...", start + 1);
    }

    fn job_started(&self, index: usize, total: usize, item: &WorkItem) {
        self.clear();
        println!("\n{RULE}");
        println!("Batch {index}/{total}: Issue #{}", item.id);
        println!("  {}", item.title);
        println!("{RULE}\n");
    }

    fn note(&self, message: &str) {
        self.clear();
        println!("  {message}");
    }
}
