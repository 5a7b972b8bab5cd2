use std::path::Path;

/// Trait for reporting run progress.
///
/// The CLI implements it with indicatif progress bars. All methods have
/// default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_detect_start(&self, _total_files: usize) {}
    fn on_detect_progress(&self, _files_checked: usize, _total_files: usize) {}
    fn on_detect_complete(&self, _gap_found: bool, _duration_secs: f64) {}
    fn on_backup_start(&self, _source: &Path) {}
    fn on_backup_complete(&self, _target: &Path, _duration_secs: f64) {}
    fn on_write_start(&self, _total_files: usize) {}
    fn on_write_progress(&self, _files_written: usize, _total_files: usize) {}
    fn on_write_complete(&self, _files_written: usize, _ids_assigned: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
