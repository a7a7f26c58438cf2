//! Device sessions
//!
//! A session binds one device profile to one live rendering context and
//! holds exactly one baseline image, captured once before any mutation and
//! never overwritten. The session exclusively owns its context's lifecycle.

use crate::error::WhittleError;
use crate::report::{DiffOutcome, DiffReport, ReportSink};
use std::sync::Arc;
use whittle_driver::{
    compare, DeviceProfile, DocumentControl, PixelComparison, RasterImage, SettleProfile,
};

/// One emulated-device rendering context with its baseline
pub struct Session {
    profile: &'static DeviceProfile,
    control: Box<dyn DocumentControl>,
    baseline: Option<Arc<RasterImage>>,
    sink: Arc<ReportSink>,
}

impl Session {
    /// Bind a profile to a live control
    #[must_use]
    pub fn new(
        profile: &'static DeviceProfile,
        control: Box<dyn DocumentControl>,
        sink: Arc<ReportSink>,
    ) -> Self {
        Self {
            profile,
            control,
            baseline: None,
            sink,
        }
    }

    /// Device name this session emulates
    #[inline]
    #[must_use]
    pub fn device(&self) -> &'static str {
        self.profile.name
    }

    /// The underlying document control
    #[inline]
    #[must_use]
    pub fn control(&self) -> &dyn DocumentControl {
        self.control.as_ref()
    }

    /// Load content and settle before any measurement
    pub async fn initialize(&self, content: &str) -> Result<(), WhittleError> {
        self.control.set_content(content).await?;
        self.control.settle(SettleProfile::Standard).await?;
        Ok(())
    }

    /// Replace content (auxiliary propagation path)
    pub async fn set_content(&self, content: &str) -> Result<(), WhittleError> {
        self.initialize(content).await
    }

    /// Serialize the session's current document
    pub async fn content(&self) -> Result<String, WhittleError> {
        Ok(self.control.content().await?)
    }

    /// Capture the immutable baseline
    ///
    /// Uses the extended settle delay so entrance animations have finished.
    /// Must be called exactly once, before any mutation.
    pub async fn capture_baseline(&mut self) -> Result<(), WhittleError> {
        if self.baseline.is_some() {
            return Err(WhittleError::BaselineAlreadyCaptured {
                device: self.device().to_string(),
            });
        }
        self.control.settle(SettleProfile::Baseline).await?;
        let shot = self.control.screenshot().await?;
        tracing::debug!(
            device = self.device(),
            width = shot.width,
            height = shot.height,
            "baseline captured"
        );
        self.baseline = Some(Arc::new(shot));
        Ok(())
    }

    /// Does the current render still match the baseline exactly?
    ///
    /// Dimensions are compared first (cheap short-circuit); only on a match
    /// does the exact zero-tolerance pixel comparison run. Emits one
    /// [`DiffReport`] regardless of outcome.
    pub async fn is_pristine(&self, description: &str) -> Result<bool, WhittleError> {
        let baseline = self
            .baseline
            .as_ref()
            .ok_or_else(|| WhittleError::BaselineMissing {
                device: self.device().to_string(),
            })?;

        self.control.settle(SettleProfile::Standard).await?;
        let current = self.control.screenshot().await?;

        let (passed, outcome, diff) = match compare(baseline, &current) {
            PixelComparison::SizeMismatch { expected, actual } => {
                (false, DiffOutcome::SizeMismatch { expected, actual }, None)
            }
            PixelComparison::Pixels { differing, diff } => (
                differing == 0,
                DiffOutcome::PixelDiff { differing },
                Some(diff),
            ),
        };

        self.sink.record(&DiffReport {
            device: self.device().to_string(),
            description: description.to_string(),
            passed,
            outcome,
            baseline: Arc::clone(baseline),
            current,
            diff,
        });

        Ok(passed)
    }

    /// Release the rendering context
    pub async fn close(&self) -> Result<(), WhittleError> {
        self.control.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device())
            .field("baseline", &self.baseline.is_some())
            .finish_non_exhaustive()
    }
}
