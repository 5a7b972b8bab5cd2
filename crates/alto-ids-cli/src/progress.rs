use alto_ids_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Detect phase: progress bar over the ALTO files
/// - Backup phase: spinner
/// - Write phase: progress bar over the ALTO files
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn set_position(&self, position: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_position(position as u64);
            }
        }
    }

    fn file_bar(total_files: usize, label: &str) -> ProgressBar {
        let pb = ProgressBar::new(total_files as u64);
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} files",
            label
        );
        if let Ok(style) = ProgressStyle::with_template(&template) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }
}

impl ProgressReporter for CliReporter {
    fn on_detect_start(&self, total_files: usize) {
        self.set_bar(Self::file_bar(total_files, "Checking"));
    }

    fn on_detect_progress(&self, files_checked: usize, _total_files: usize) {
        self.set_position(files_checked);
    }

    fn on_detect_complete(&self, gap_found: bool, duration_secs: f64) {
        self.finish_bar();
        let verdict = if gap_found {
            "missing IDs found"
        } else {
            "no missing IDs"
        };
        eprintln!(
            "  \x1b[32m✓\x1b[0m Check complete: {} in {:.2}s",
            verdict, duration_secs
        );
    }

    fn on_backup_start(&self, source: &Path) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message(format!("Backing up {}...", source.display()));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_backup_complete(&self, target: &Path, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Backup complete: {} in {:.2}s",
            target.display(),
            duration_secs
        );
    }

    fn on_write_start(&self, total_files: usize) {
        self.set_bar(Self::file_bar(total_files, "Writing"));
    }

    fn on_write_progress(&self, files_written: usize, _total_files: usize) {
        self.set_position(files_written);
    }

    fn on_write_complete(&self, files_written: usize, ids_assigned: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Write complete: {} IDs in {} files in {:.2}s",
            ids_assigned, files_written, duration_secs
        );
    }
}
