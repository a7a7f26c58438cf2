//! Diff reports and the orchestrator-owned report sink
//!
//! Every oracle check emits one [`DiffReport`], pass or fail. The sink logs
//! each report to the error stream, keeps the run's check/failure tallies,
//! and optionally dumps failure images as `diff-N.png` for offline triage.
//! Dump failures are diagnostic-only and never abort a run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use whittle_driver::RasterImage;

/// How a comparison failed (or how exactly it passed)
#[derive(Debug, Clone)]
pub enum DiffOutcome {
    /// Dimensions differed; pixels never compared
    SizeMismatch {
        /// Baseline dimensions
        expected: (u32, u32),
        /// Current dimensions
        actual: (u32, u32),
    },
    /// Dimensions matched; `differing` is the exact pixel count
    PixelDiff {
        /// Differing pixel count (zero on a pass)
        differing: u64,
    },
}

/// One oracle-check result for one session
#[derive(Debug, Clone)]
pub struct DiffReport {
    /// Device name of the session that ran the check
    pub device: String,
    /// Human description of the attempted mutation
    pub description: String,
    /// Verdict
    pub passed: bool,
    /// Failure detail (or exact zero on a pass)
    pub outcome: DiffOutcome,
    /// The session's immutable baseline
    pub baseline: Arc<RasterImage>,
    /// The screenshot just taken
    pub current: RasterImage,
    /// Diff visualization, absent on size mismatch
    pub diff: Option<RasterImage>,
}

/// Shared sink for diff reports
///
/// Owned by the orchestrator; sessions hold an `Arc` to it.
#[derive(Debug)]
pub struct ReportSink {
    dump_dir: Option<PathBuf>,
    checks: AtomicU64,
    failures: AtomicU64,
}

impl ReportSink {
    /// Create a sink; `dump_dir` enables failure-image dumps
    #[must_use]
    pub fn new(dump_dir: Option<PathBuf>) -> Self {
        Self {
            dump_dir,
            checks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Record one report: log it, tally it, maybe dump images
    pub fn record(&self, report: &DiffReport) {
        self.checks.fetch_add(1, Ordering::Relaxed);

        if report.passed {
            tracing::debug!(
                device = %report.device,
                "ok: {}",
                report.description
            );
            return;
        }

        let failure_index = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        match &report.outcome {
            DiffOutcome::PixelDiff { differing } => {
                tracing::info!(
                    device = %report.device,
                    pixels = differing,
                    "reject: {}",
                    report.description
                );
            }
            DiffOutcome::SizeMismatch { expected, actual } => {
                tracing::info!(
                    device = %report.device,
                    expected = format!("{}x{}", expected.0, expected.1),
                    actual = format!("{}x{}", actual.0, actual.1),
                    "reject (bad size): {}",
                    report.description
                );
            }
        }

        if let Some(dir) = &self.dump_dir {
            let path = dir.join(format!("diff-{failure_index}.png"));
            // Dump the diff image when there is one, the raw screenshot when
            // the sizes did not even match.
            let image = report.diff.as_ref().unwrap_or(&report.current);
            match image.to_png_bytes() {
                Ok(bytes) => {
                    if let Err(error) = std::fs::write(&path, bytes) {
                        tracing::warn!(path = %path.display(), %error, "diff dump failed");
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "diff image encode failed");
                }
            }
        }
    }

    /// Total checks recorded (every check renders once per session)
    #[inline]
    #[must_use]
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }

    /// Total failed checks recorded
    #[inline]
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(width: u32, height: u32) -> RasterImage {
        RasterImage::new(
            width,
            height,
            vec![255; width as usize * height as usize * 4],
        )
    }

    fn report(passed: bool) -> DiffReport {
        DiffReport {
            device: "Desktop".to_string(),
            description: "rm node <div>".to_string(),
            passed,
            outcome: DiffOutcome::PixelDiff {
                differing: u64::from(!passed),
            },
            baseline: Arc::new(white(2, 2)),
            current: white(2, 2),
            diff: Some(white(2, 2)),
        }
    }

    #[test]
    fn tallies_checks_and_failures() {
        let sink = ReportSink::new(None);
        sink.record(&report(true));
        sink.record(&report(false));
        sink.record(&report(false));
        assert_eq!(sink.checks(), 3);
        assert_eq!(sink.failures(), 2);
    }

    #[test]
    fn dumps_failure_images_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ReportSink::new(Some(dir.path().to_path_buf()));
        sink.record(&report(false));
        assert!(dir.path().join("diff-1.png").exists());
    }
}
