//! Run statistics
//!
//! Tallies what the phases processed and removed, plus input/output sizes
//! and the final verdict. Logged as one summary line at the end of a run.

/// Counters for one reduction run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Nodes visited by the node phase
    pub nodes_processed: u64,
    /// Nodes permanently removed
    pub nodes_removed: u64,
    /// Attributes tested by the attribute phase
    pub attributes_processed: u64,
    /// Attributes permanently removed
    pub attributes_removed: u64,
    /// Class tokens tested by the class phase
    pub classes_processed: u64,
    /// Class tokens permanently removed
    pub classes_removed: u64,
    /// Source document size in bytes
    pub input_size: usize,
    /// Final document size in bytes
    pub output_size: usize,
    /// Final whole-document verdict
    pub pristine: bool,
}

impl RunStats {
    /// Start a fresh tally for a source document
    #[inline]
    #[must_use]
    pub fn new(input_size: usize) -> Self {
        Self {
            input_size,
            ..Self::default()
        }
    }

    /// Log the end-of-run summary
    pub fn log_summary(&self) {
        tracing::info!(
            nodes = format!("{}/{}", self.nodes_removed, self.nodes_processed),
            attributes = format!("{}/{}", self.attributes_removed, self.attributes_processed),
            classes = format!("{}/{}", self.classes_removed, self.classes_processed),
            input_size = self.input_size,
            output_size = self.output_size,
            pristine = self.pristine,
            "run summary (removed/processed)"
        );
    }
}
