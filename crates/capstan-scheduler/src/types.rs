use capstan_core::DeploymentId;
use serde::Serialize;
use std::fmt;

/// What happened to one dequeued deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Capacity reserved, deployment is running
    Admitted,
    /// Target cluster does not exist, deployment is failed
    Failed,
    /// Not enough capacity, deployment was requeued
    Deferred,
    /// No record, or no longer queued; entry discarded
    Dropped,
}

/// Summary of one scheduling pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub admitted: Vec<DeploymentId>,
    pub failed: Vec<DeploymentId>,
    /// Each deferred deployment once, in the order it was first deferred
    pub deferred: Vec<DeploymentId>,
    pub dropped: Vec<DeploymentId>,
}

impl PassReport {
    pub(crate) fn record(&mut self, id: DeploymentId, outcome: AdmissionOutcome) {
        let bucket = match outcome {
            AdmissionOutcome::Admitted => &mut self.admitted,
            AdmissionOutcome::Failed => &mut self.failed,
            AdmissionOutcome::Deferred => &mut self.deferred,
            AdmissionOutcome::Dropped => &mut self.dropped,
        };
        bucket.push(id);
    }

    /// True if the pass changed no deployment
    pub fn is_noop(&self) -> bool {
        self.admitted.is_empty() && self.failed.is_empty()
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} admitted, {} failed, {} deferred, {} dropped",
            self.admitted.len(),
            self.failed.len(),
            self.deferred.len(),
            self.dropped.len()
        )
    }
}
