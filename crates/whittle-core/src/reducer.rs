//! The orchestrator
//!
//! Builds the configured session set (fan-out/join: create, load, and
//! baseline concurrently per device, all joined before reduction starts),
//! runs the
//! enabled phases strictly in canonical order against the primary session,
//! and returns the final serialized document with the final verdict.
//!
//! All mutation work is single-threaded: no two mutations are ever attempted
//! concurrently, because each oracle check must observe one unambiguous
//! before/after state.

use crate::config::ReduceConfig;
use crate::error::WhittleError;
use crate::oracle::Oracle;
use crate::phase::{self, PhaseCx, PhaseName};
use crate::report::ReportSink;
use crate::session::Session;
use crate::stats::RunStats;
use std::sync::Arc;
use whittle_driver::{ChromeBrowser, DeviceProfile};

/// Output of one reduction run
#[derive(Debug, Clone)]
pub struct Reduction {
    /// Final serialized document from the primary session
    pub document: String,
    /// Final whole-document verdict
    pub pristine: bool,
    /// Run counters
    pub stats: RunStats,
}

/// Runs the phase pipeline against an assembled session set
///
/// Shared by the browser-backed entry point and by tests that assemble
/// sessions over their own controls. Sessions must already hold baselines.
pub async fn run_reduction(
    oracle: &Oracle,
    phases: &[PhaseName],
    source_len: usize,
) -> Result<Reduction, WhittleError> {
    let mut stats = RunStats::new(source_len);

    for name in PhaseName::CANONICAL_ORDER {
        if !phases.contains(&name) {
            continue;
        }
        tracing::info!(phase = %name, "== starting phase ==");

        let phase = phase::build(name);
        let mut cx = PhaseCx {
            oracle,
            stats: &mut stats,
        };
        phase.run(&mut cx).await?;

        // Diagnostic only: the phase committed nothing the oracle had not
        // already verified, so a failure here signals oracle nondeterminism.
        // It is logged, not corrected.
        let exit_pristine = oracle.check(&format!("{name} phase exit")).await?;
        if !exit_pristine {
            tracing::warn!(phase = %name, "phase exit check failed: oracle nondeterminism");
        }
    }

    let pristine = oracle.check("final check").await?;
    let document = oracle.primary().content().await?;

    stats.output_size = document.len();
    stats.pristine = pristine;
    stats.log_summary();

    Ok(Reduction {
        document,
        pristine,
        stats,
    })
}

/// Runs the pipeline and releases every session, success or not
///
/// Session release is deliberate, not left to process teardown: a pipeline
/// error still closes all tabs before the failure propagates.
pub async fn run_and_close(
    oracle: &Oracle,
    phases: &[PhaseName],
    source_len: usize,
) -> Result<Reduction, WhittleError> {
    let result = run_reduction(oracle, phases, source_len).await;
    let closed = oracle.close_all().await;
    let reduction = result?;
    closed?;
    Ok(reduction)
}

/// Browser-backed reduction entry point
#[derive(Debug)]
pub struct Reducer {
    config: ReduceConfig,
}

impl Reducer {
    /// Create a reducer for a configuration
    #[inline]
    #[must_use]
    pub fn new(config: ReduceConfig) -> Self {
        Self { config }
    }

    /// Reduce a source document
    ///
    /// Launches the browser, assembles the session set, runs the pipeline,
    /// and shuts the browser process down exactly once on every exit path.
    pub async fn reduce(&self, source: &str) -> Result<Reduction, WhittleError> {
        let profiles = self.resolve_profiles()?;
        let sink = Arc::new(ReportSink::new(self.config.dump_dir.clone()));

        let browser = ChromeBrowser::launch(self.config.headless).await?;
        let result = self.run(&browser, &profiles, &sink, source).await;

        // The process goes down whether the run succeeded or not.
        let shutdown = browser.shutdown().await;
        let reduction = result?;
        shutdown?;

        tracing::info!(
            checks = sink.checks(),
            rejections = sink.failures(),
            pristine = reduction.pristine,
            "reduction finished"
        );
        Ok(reduction)
    }

    fn resolve_profiles(&self) -> Result<Vec<&'static DeviceProfile>, WhittleError> {
        if self.config.devices.is_empty() {
            return Err(WhittleError::NoDevices);
        }
        self.config
            .devices
            .iter()
            .map(|name| {
                DeviceProfile::resolve(name).ok_or_else(|| WhittleError::UnknownDevice {
                    name: name.clone(),
                    known: whittle_driver::known_device_names(),
                })
            })
            .collect()
    }

    async fn run(
        &self,
        browser: &ChromeBrowser,
        profiles: &[&'static DeviceProfile],
        sink: &Arc<ReportSink>,
        source: &str,
    ) -> Result<Reduction, WhittleError> {
        // Fan-out/join: create every session, load the source, capture
        // baselines; reduction starts only after all have joined.
        let setups = profiles.iter().copied().map(|profile| {
            let sink = Arc::clone(sink);
            async move {
                let control = browser.open(profile).await?;
                let mut session = Session::new(profile, Box::new(control), sink);
                session.initialize(source).await?;
                session.capture_baseline().await?;
                Ok::<Session, WhittleError>(session)
            }
        });
        let mut sessions = futures::future::try_join_all(setups).await?.into_iter();

        let primary = sessions.next().ok_or(WhittleError::NoDevices)?;
        let oracle = Oracle::new(primary, sessions.collect());
        tracing::info!(
            primary = oracle.primary().device(),
            auxiliaries = oracle.auxiliaries().len(),
            "session set ready"
        );

        run_and_close(&oracle, &self.config.phases, source.len()).await
    }
}
