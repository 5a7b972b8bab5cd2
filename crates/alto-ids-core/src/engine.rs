use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::backfill;
use crate::backup::{BackupManager, VersionedBackup};
use crate::config::AppConfig;
use crate::detector::{self, GapCounts};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::scanner;
use crate::xml::Document;

pub struct BackfillEngine {
    config: AppConfig,
    backup: Box<dyn BackupManager>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub files_scanned: usize,
    pub gap_found: bool,
    pub backup_path: Option<PathBuf>,
    pub files_rewritten: usize,
    pub ids_assigned: GapCounts,
    pub detect_duration: Duration,
    pub backup_duration: Duration,
    pub write_duration: Duration,
}

/// Result of one run as seen by the host. Errors never escape [`BackfillEngine::run`].
#[derive(Debug)]
pub enum Outcome {
    Success(RunReport),
    Failure { message: String },
}

/// Files with missing IDs found by a full read-only scan.
#[derive(Debug, Default)]
pub struct GapSummary {
    pub files_scanned: usize,
    pub files_with_gaps: Vec<(PathBuf, GapCounts)>,
}

impl GapSummary {
    pub fn total(&self) -> GapCounts {
        let mut total = GapCounts::default();
        for (_, counts) in &self.files_with_gaps {
            total.blocks += counts.blocks;
            total.lines += counts.lines;
            total.words += counts.words;
        }
        total
    }
}

impl BackfillEngine {
    pub fn new(config: AppConfig) -> Self {
        let backup = Box::new(VersionedBackup::new(config.backup.retention));
        Self { config, backup }
    }

    pub fn with_backup_manager(mut self, backup: impl BackupManager + 'static) -> Self {
        self.backup = Box::new(backup);
        self
    }

    /// Run the backfill step, converting any error into [`Outcome::Failure`].
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Outcome {
        match self.backfill(reporter) {
            Ok(report) => {
                info!(
                    "ALTO ID generation finished: {} of {} files rewritten",
                    report.files_rewritten, report.files_scanned
                );
                Outcome::Success(report)
            }
            Err(err) => {
                error!("ALTO ID generation failed: {}", err);
                Outcome::Failure {
                    message: err.to_string(),
                }
            }
        }
    }

    /// The full pipeline:
    /// 1. Enumerate the ALTO files
    /// 2. Read-only scan, stopping at the first file with a missing ID
    /// 3. Back up the OCR directory
    /// 4. Re-read and rewrite every file
    pub fn backfill(&self, reporter: &dyn ProgressReporter) -> Result<RunReport, Error> {
        self.config.validate()?;
        let ocr_dir = self.config.ocr_dir()?;
        let files = self.list_files()?;
        let total = files.len();
        info!("Checking {} ALTO files for missing IDs", total);

        // Phase 1: Detect
        reporter.on_detect_start(total);
        let detect_start = Instant::now();
        let gap_file = detector::first_file_with_gap(&files, |checked| {
            reporter.on_detect_progress(checked, total)
        })?;
        let detect_duration = detect_start.elapsed();
        reporter.on_detect_complete(gap_file.is_some(), detect_duration.as_secs_f64());

        let mut report = RunReport {
            files_scanned: total,
            gap_found: gap_file.is_some(),
            detect_duration,
            ..RunReport::default()
        };

        let Some(gap_file) = gap_file else {
            info!("All ALTO elements already have IDs, nothing to do");
            return Ok(report);
        };
        debug!("First file with missing IDs: {}", gap_file.display());

        // Phase 2: Backup
        let (parent, name) = split_dir(&ocr_dir)?;
        info!("Backing up {}", ocr_dir.display());
        reporter.on_backup_start(&ocr_dir);
        let backup_start = Instant::now();
        // The ALTO folder lives below the OCR directory, so the copy must recurse.
        let backup_path = self.backup.create_backup(parent, name, true)?;
        report.backup_duration = backup_start.elapsed();
        reporter.on_backup_complete(&backup_path, report.backup_duration.as_secs_f64());
        report.backup_path = Some(backup_path);

        // Phase 3: Write
        info!("Generating missing IDs...");
        reporter.on_write_start(total);
        let write_start = Instant::now();
        let mut rewritten = 0;
        let assigned =
            backfill::backfill_file_set(&files, &self.config.prefixes, |index, _, _| {
                rewritten = index + 1;
                reporter.on_write_progress(rewritten, total);
            });
        report.write_duration = write_start.elapsed();

        match assigned {
            Ok(assigned) => {
                report.files_rewritten = rewritten;
                report.ids_assigned = assigned;
                reporter.on_write_complete(
                    rewritten,
                    assigned.total(),
                    report.write_duration.as_secs_f64(),
                );
                info!(
                    "Added {} block, {} line and {} word IDs",
                    assigned.blocks, assigned.lines, assigned.words
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "Stopped after rewriting {} of {} files; restore from {} if needed",
                    rewritten,
                    total,
                    report
                        .backup_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                );
                Err(err)
            }
        }
    }

    /// Full read-only scan reporting every file with missing IDs.
    pub fn check(&self, reporter: &dyn ProgressReporter) -> Result<GapSummary, Error> {
        self.config.validate()?;
        let files = self.list_files()?;
        let total = files.len();

        reporter.on_detect_start(total);
        let start = Instant::now();
        let mut summary = GapSummary {
            files_scanned: total,
            ..GapSummary::default()
        };
        for (index, path) in files.iter().enumerate() {
            let doc = Document::from_path(path)?;
            let counts = detector::count_gaps(&doc);
            if counts.total() > 0 {
                summary.files_with_gaps.push((path.clone(), counts));
            }
            reporter.on_detect_progress(index + 1, total);
        }
        reporter.on_detect_complete(
            !summary.files_with_gaps.is_empty(),
            start.elapsed().as_secs_f64(),
        );
        Ok(summary)
    }

    fn list_files(&self) -> Result<Vec<PathBuf>, Error> {
        let alto_dir = self.config.alto_dir()?;
        scanner::list_files(&alto_dir, &self.config.ignore_patterns)
    }
}

fn split_dir(dir: &Path) -> Result<(&Path, &str), Error> {
    let name = dir.file_name().and_then(|name| name.to_str());
    match (dir.parent(), name) {
        (Some(parent), Some(name)) => Ok((parent, name)),
        _ => Err(Error::InvalidConfig(format!(
            "cannot back up {}: no parent directory",
            dir.display()
        ))),
    }
}
