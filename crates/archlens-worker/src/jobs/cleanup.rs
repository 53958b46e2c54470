//! Temp directory and cached diagram cleanup.
//!
//! Three sweeps run on every tick. Each one collects its own failures and
//! never stops the others.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use archlens_core::config::SchedulerConfig;
use archlens_core::traits::DiagramIndex;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries removed.
    pub removed: u64,
    /// One line per entry (or listing) that could not be processed.
    pub failures: Vec<String>,
}

impl SweepReport {
    fn fail(&mut self, what: impl std::fmt::Display, e: impl std::fmt::Display) {
        self.failures.push(format!("{what}: {e}"));
    }
}

/// Outcome of one cleanup tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Expired upload temp directories.
    pub uploads: SweepReport,
    /// Expired clone temp directories.
    pub clones: SweepReport,
    /// Cached diagrams already migrated to object storage.
    pub diagrams: SweepReport,
}

impl CleanupReport {
    /// Total entries removed across sweeps.
    pub fn removed(&self) -> u64 {
        self.uploads.removed + self.clones.removed + self.diagrams.removed
    }

    /// Total failures across sweeps.
    pub fn failure_count(&self) -> usize {
        self.uploads.failures.len() + self.clones.failures.len() + self.diagrams.failures.len()
    }
}

/// Removes expired temporary data from local disk.
#[derive(Debug, Clone)]
pub struct CleanupJob {
    upload_dir: PathBuf,
    reserved_upload_subdir: String,
    clone_dir: PathBuf,
    clone_prefix: String,
    diagram_dir: PathBuf,
    diagram_extensions: Vec<String>,
    expiry: Duration,
    diagrams: Arc<dyn DiagramIndex>,
}

impl CleanupJob {
    /// Create a cleanup job from scheduler configuration.
    pub fn new(config: &SchedulerConfig, diagrams: Arc<dyn DiagramIndex>) -> Self {
        Self {
            upload_dir: PathBuf::from(&config.upload_dir),
            reserved_upload_subdir: config.reserved_upload_subdir.clone(),
            clone_dir: PathBuf::from(&config.clone_dir),
            clone_prefix: config.clone_prefix.clone(),
            diagram_dir: PathBuf::from(&config.diagram_dir),
            diagram_extensions: config.diagram_extensions.clone(),
            expiry: Duration::hours(config.temp_expiry_hours as i64),
            diagrams,
        }
    }

    /// Run all three sweeps as of `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> CleanupReport {
        let cutoff = now - self.expiry;

        let uploads = {
            let reserved = self.reserved_upload_subdir.as_str();
            sweep_expired_dirs(&self.upload_dir, cutoff, |name| name != reserved).await
        };
        let clones = {
            let prefix = self.clone_prefix.as_str();
            sweep_expired_dirs(&self.clone_dir, cutoff, |name| name.starts_with(prefix)).await
        };
        let diagrams = self.sweep_migrated_diagrams().await;

        let report = CleanupReport {
            uploads,
            clones,
            diagrams,
        };
        log_report(&report);
        report
    }

    async fn sweep_migrated_diagrams(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let ids = match self.diagrams.migrated_analysis_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                report.fail("migrated diagram lookup", e);
                return report;
            }
        };

        for id in ids {
            for ext in &self.diagram_extensions {
                let path = self.diagram_dir.join(format!("{id}.{ext}"));
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => report.removed += 1,
                    Err(e) if e.kind() == IoErrorKind::NotFound => {}
                    Err(e) => report.fail(path.display(), e),
                }
            }
        }
        report
    }
}

/// Remove every directory directly under `root` whose name passes `select`
/// and whose modification time is at or before `cutoff`.
///
/// A missing `root` is treated as empty.
async fn sweep_expired_dirs(
    root: &Path,
    cutoff: DateTime<Utc>,
    select: impl Fn(&str) -> bool,
) -> SweepReport {
    let mut report = SweepReport::default();

    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == IoErrorKind::NotFound => return report,
        Err(e) => {
            report.fail(root.display(), e);
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                report.fail(root.display(), e);
                break;
            }
        };

        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !select(&name) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                report.fail(path.display(), e);
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }
        let modified: DateTime<Utc> = match metadata.modified() {
            Ok(modified) => modified.into(),
            Err(e) => {
                report.fail(path.display(), e);
                continue;
            }
        };
        if modified > cutoff {
            continue;
        }

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed expired temp directory");
                report.removed += 1;
            }
            Err(e) => report.fail(path.display(), e),
        }
    }

    report
}

fn log_report(report: &CleanupReport) {
    for (sweep, r) in [
        ("uploads", &report.uploads),
        ("clones", &report.clones),
        ("diagrams", &report.diagrams),
    ] {
        for failure in &r.failures {
            tracing::warn!(sweep, failure = %failure, "Cleanup failure");
        }
    }
    tracing::info!(
        uploads_removed = report.uploads.removed,
        clones_removed = report.clones.removed,
        diagrams_removed = report.diagrams.removed,
        failures = report.failure_count(),
        "Cleanup finished"
    );
}
