//! The cross-device equivalence oracle
//!
//! A mutation is accepted only if the primary session still matches its
//! baseline AND, after the primary's content is propagated, every auxiliary
//! session matches its own baseline too. The conjunction short-circuits on
//! primary failure so auxiliaries are never touched for a mutation the
//! primary already rejects.

use crate::error::WhittleError;
use crate::session::Session;

/// One primary session plus zero or more auxiliary validators
#[derive(Debug)]
pub struct Oracle {
    primary: Session,
    auxiliaries: Vec<Session>,
}

impl Oracle {
    /// Assemble the session set
    #[inline]
    #[must_use]
    pub fn new(primary: Session, auxiliaries: Vec<Session>) -> Self {
        Self {
            primary,
            auxiliaries,
        }
    }

    /// The session all mutations run against
    #[inline]
    #[must_use]
    pub fn primary(&self) -> &Session {
        &self.primary
    }

    /// Auxiliary sessions (diagnostics only)
    #[inline]
    #[must_use]
    pub fn auxiliaries(&self) -> &[Session] {
        &self.auxiliaries
    }

    /// Run the conjunctive cross-device check
    ///
    /// Primary first; on primary failure the auxiliaries are untouched.
    /// Auxiliaries are synchronized to the primary's content serially, then
    /// checked concurrently; the result is the logical AND of every check.
    /// Driver failures abort with `Err` and are fatal to the run.
    pub async fn check(&self, description: &str) -> Result<bool, WhittleError> {
        if !self.primary.is_pristine(description).await? {
            return Ok(false);
        }

        if self.auxiliaries.is_empty() {
            return Ok(true);
        }

        let content = self.primary.content().await?;
        for auxiliary in &self.auxiliaries {
            auxiliary.set_content(&content).await?;
        }

        let checks = self
            .auxiliaries
            .iter()
            .map(|auxiliary| auxiliary.is_pristine(description));
        let verdicts = futures::future::try_join_all(checks).await?;

        Ok(verdicts.into_iter().all(|pristine| pristine))
    }

    /// Release every session's rendering context
    pub async fn close_all(&self) -> Result<(), WhittleError> {
        self.primary.close().await?;
        for auxiliary in &self.auxiliaries {
            auxiliary.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportSink;
    use mockall::mock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use whittle_driver::{
        DetachPoint, DeviceProfile, DocumentControl, DriverError, NodeRef, RasterImage,
        SettleProfile,
    };

    mock! {
        Control {}

        #[async_trait::async_trait]
        impl DocumentControl for Control {
            async fn set_content(&self, html: &str) -> Result<(), DriverError>;
            async fn content(&self) -> Result<String, DriverError>;
            async fn settle(&self, profile: SettleProfile) -> Result<(), DriverError>;
            async fn screenshot(&self) -> Result<RasterImage, DriverError>;
            async fn root(&self) -> Result<NodeRef, DriverError>;
            async fn child_elements(&self, node: NodeRef) -> Result<Vec<NodeRef>, DriverError>;
            async fn tag_name(&self, node: NodeRef) -> Result<String, DriverError>;
            async fn detach(&self, node: NodeRef) -> Result<DetachPoint, DriverError>;
            async fn reattach(&self, node: NodeRef, at: &DetachPoint) -> Result<(), DriverError>;
            async fn attributes(&self, node: NodeRef) -> Result<Vec<(String, String)>, DriverError>;
            async fn attribute(&self, node: NodeRef, name: &str) -> Result<Option<String>, DriverError>;
            async fn set_attribute(&self, node: NodeRef, name: &str, value: &str) -> Result<(), DriverError>;
            async fn remove_attribute(&self, node: NodeRef, name: &str) -> Result<(), DriverError>;
            async fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, DriverError>;
            async fn text_content(&self, node: NodeRef) -> Result<String, DriverError>;
            async fn append_style(&self, css: &str) -> Result<NodeRef, DriverError>;
            async fn close(&self) -> Result<(), DriverError>;
        }
    }

    fn solid(value: u8) -> RasterImage {
        RasterImage::new(2, 2, vec![value; 2 * 2 * 4])
    }

    /// Mock whose first screenshot (the baseline) is white and whose later
    /// screenshots follow the given sequence value.
    fn control_with_renders(later: u8) -> MockControl {
        let mut control = MockControl::new();
        let calls = AtomicU32::new(0);
        control.expect_settle().returning(|_| Ok(()));
        control.expect_screenshot().returning(move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            Ok(if call == 0 { solid(255) } else { solid(later) })
        });
        control
    }

    async fn session_for(
        device: &str,
        control: MockControl,
        sink: &Arc<ReportSink>,
    ) -> Session {
        let profile = DeviceProfile::resolve(device).expect("registry device");
        let mut session = Session::new(profile, Box::new(control), Arc::clone(sink));
        session.capture_baseline().await.expect("baseline");
        session
    }

    #[tokio::test]
    async fn auxiliary_failure_vetoes_a_passing_primary() {
        let sink = Arc::new(ReportSink::new(None));

        // Primary keeps rendering its baseline; the auxiliary diverges after
        // the propagated content lands.
        let mut primary = control_with_renders(255);
        primary
            .expect_content()
            .returning(|| Ok("<html></html>".to_string()));

        let mut auxiliary = control_with_renders(0);
        auxiliary.expect_set_content().times(1).returning(|_| Ok(()));

        let primary = session_for("Desktop", primary, &sink).await;
        let auxiliary = session_for("Galaxy Note 3", auxiliary, &sink).await;

        let oracle = Oracle::new(primary, vec![auxiliary]);
        assert!(!oracle.check("rm node <div>").await.unwrap());
    }

    #[tokio::test]
    async fn primary_failure_short_circuits_auxiliaries() {
        let sink = Arc::new(ReportSink::new(None));

        let primary = control_with_renders(0);

        // The auxiliary must never be synchronized or re-rendered: only its
        // baseline screenshot is allowed.
        let mut auxiliary = MockControl::new();
        auxiliary.expect_settle().returning(|_| Ok(()));
        auxiliary.expect_screenshot().times(1).returning(|| Ok(solid(255)));
        auxiliary.expect_set_content().times(0);

        let primary = session_for("Desktop", primary, &sink).await;
        let auxiliary = session_for("Galaxy Note 3", auxiliary, &sink).await;

        let oracle = Oracle::new(primary, vec![auxiliary]);
        assert!(!oracle.check("rm node <div>").await.unwrap());
        // One baseline render + one failed primary check were recorded.
        assert_eq!(sink.failures(), 1);
    }

    #[tokio::test]
    async fn all_sessions_matching_is_a_pass() {
        let sink = Arc::new(ReportSink::new(None));

        let mut primary = control_with_renders(255);
        primary
            .expect_content()
            .returning(|| Ok("<html></html>".to_string()));

        let mut auxiliary = control_with_renders(255);
        auxiliary.expect_set_content().returning(|_| Ok(()));

        let primary = session_for("Desktop", primary, &sink).await;
        let auxiliary = session_for("Galaxy Note 3", auxiliary, &sink).await;

        let oracle = Oracle::new(primary, vec![auxiliary]);
        assert!(oracle.check("rm attr id on <div>").await.unwrap());
    }
}
