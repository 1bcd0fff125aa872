use crate::ledger::{Reservation, ResourceLedger};
use crate::queue::AdmissionQueue;
use crate::types::{AdmissionOutcome, PassReport};
use crate::{Result, SchedulerError};
use capstan_core::{DeploymentId, DeploymentStatus};
use capstan_storage::RecordStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the worker retries deferred deployments when nothing new arrives
    pub retry_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
        }
    }
}

/// Deployment scheduler
///
/// Owns the admission queue and the resource ledger. Callers hand
/// deployments in with [`Scheduler::submit`] (or [`Scheduler::enqueue`])
/// and drain the queue with [`Scheduler::run_pass`]; [`Scheduler::run`]
/// does the latter from a background task.
///
/// Deployment status may also be written directly to the store by other
/// parties. Those writes are not coordinated with the queue: the pass
/// simply discards entries whose deployment is no longer queued.
pub struct Scheduler {
    store: Arc<dyn RecordStore>,
    queue: AdmissionQueue,
    ledger: ResourceLedger,
    config: SchedulerConfig,
    pass_lock: Mutex<()>,
    work_available: Notify,
}

impl Scheduler {
    /// Create a new scheduler with an empty queue
    pub fn new(store: Arc<dyn RecordStore>, config: SchedulerConfig) -> Self {
        Self {
            ledger: ResourceLedger::new(store.clone()),
            store,
            queue: AdmissionQueue::new(),
            config,
            pass_lock: Mutex::new(()),
            work_available: Notify::new(),
        }
    }

    /// Handle to the admission queue
    pub fn queue(&self) -> AdmissionQueue {
        self.queue.clone()
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Append a deployment to the admission queue
    pub fn enqueue(&self, id: DeploymentId) {
        self.queue.enqueue(id);
    }

    /// Enqueue a deployment and wake the worker, if one is running
    pub fn submit(&self, id: DeploymentId) {
        self.queue.enqueue(id);
        self.work_available.notify_one();
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue every queued deployment in the store that the queue lacks
    ///
    /// The queue lives in memory, so a fresh process rebuilds it from the
    /// records. Deployments are added in creation order.
    pub fn recover_queue(&self) -> Result<usize> {
        let present: HashSet<DeploymentId> = self.queue.snapshot().into_iter().collect();

        let mut recovered = 0;
        for deployment in self.store.list_deployments()? {
            if deployment.is_queued() && !present.contains(&deployment.id) {
                self.queue.enqueue(deployment.id);
                recovered += 1;
            }
        }

        if recovered > 0 {
            info!("Recovered {} queued deployments from the store", recovered);
            self.work_available.notify_one();
        }

        Ok(recovered)
    }

    /// Drain the admission queue once
    ///
    /// Each dequeued deployment is admitted, failed, deferred or dropped,
    /// and each is tried at most once per pass. A deferred deployment goes
    /// back into the queue by priority; when the pass meets it again it is
    /// set aside and the pass keeps dequeuing. Once the queue is empty the
    /// set-aside deployments are requeued by priority, keeping their
    /// relative order, for the next pass.
    ///
    /// A deployment that does not fit never holds back one behind it.
    ///
    /// Only one pass runs at a time; a second caller waits for the first.
    pub fn run_pass(&self) -> Result<PassReport> {
        let _pass = self
            .pass_lock
            .lock()
            .map_err(|_| SchedulerError::internal_error("Scheduling pass lock poisoned"))?;

        debug!("Scheduling pass started with {} queued", self.queue.len());

        let mut report = PassReport::default();
        let mut deferred = HashSet::new();
        let mut set_aside = Vec::new();

        while let Some(id) = self.queue.dequeue() {
            if deferred.contains(&id) {
                debug!("Deployment {} already tried in this pass, setting it aside", id);
                set_aside.push(id);
                continue;
            }

            let outcome = match self.admit(id) {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Keep the entries so a later pass can retry them
                    self.queue.push_front(id);
                    self.restore(&set_aside);
                    return Err(e);
                }
            };

            if outcome == AdmissionOutcome::Deferred {
                deferred.insert(id);
            }
            report.record(id, outcome);
        }

        self.restore(&set_aside);

        if report.is_noop() && report.deferred.is_empty() && report.dropped.is_empty() {
            debug!("Scheduling pass finished with nothing to do");
        } else {
            info!(
                "Scheduling pass finished: {} ({} still queued)",
                report,
                self.queue.len()
            );
        }

        Ok(report)
    }

    /// Decide one dequeued deployment
    fn admit(&self, id: DeploymentId) -> Result<AdmissionOutcome> {
        let Some(mut deployment) = self.store.get_deployment(id)? else {
            warn!("Deployment {} not found, dropping it from the queue", id);
            return Ok(AdmissionOutcome::Dropped);
        };

        if !deployment.is_queued() {
            warn!(
                "Deployment {} is {} rather than queued, dropping it from the queue",
                id, deployment.status
            );
            return Ok(AdmissionOutcome::Dropped);
        }

        match self
            .ledger
            .try_reserve(deployment.cluster_id, &deployment.required)?
        {
            Reservation::Reserved(cluster) => {
                deployment.transition_to(DeploymentStatus::Running)?;

                if let Err(e) = self.store.save_deployment(&deployment) {
                    // Hand the capacity back; the deployment is still queued
                    if let Err(release_err) = self
                        .ledger
                        .release(deployment.cluster_id, &deployment.required)
                    {
                        error!(
                            "Failed to return {} to cluster {} after a failed save: {}",
                            deployment.required, deployment.cluster_id, release_err
                        );
                    }
                    return Err(e.into());
                }

                info!(
                    "Admitted deployment {} on cluster {} ({} left)",
                    id, cluster.id, cluster.available
                );
                Ok(AdmissionOutcome::Admitted)
            }
            Reservation::ClusterNotFound => {
                deployment.transition_to(DeploymentStatus::Failed)?;
                self.store.save_deployment(&deployment)?;

                warn!(
                    "Cluster {} for deployment {} not found, marking it failed",
                    deployment.cluster_id, id
                );
                Ok(AdmissionOutcome::Failed)
            }
            Reservation::InsufficientCapacity { available, .. } => {
                info!(
                    "Not enough resources for deployment {} on cluster {} (needs {}, has {}), requeueing",
                    id, deployment.cluster_id, deployment.required, available
                );
                self.queue
                    .requeue_by_priority(id, deployment.priority, |queued| self.priority_of(queued));
                Ok(AdmissionOutcome::Deferred)
            }
        }
    }

    /// Requeue set-aside ids; going back to front keeps equal priorities in order
    fn restore(&self, set_aside: &[DeploymentId]) {
        for id in set_aside.iter().rev() {
            self.requeue(*id);
        }
    }

    /// Requeue an id whose record must be read again for its priority
    fn requeue(&self, id: DeploymentId) {
        match self.priority_of(id) {
            Some(priority) => self
                .queue
                .requeue_by_priority(id, priority, |queued| self.priority_of(queued)),
            None => self.queue.push_front(id),
        }
    }

    fn priority_of(&self, id: DeploymentId) -> Option<i32> {
        match self.store.get_deployment(id) {
            Ok(deployment) => deployment.map(|d| d.priority),
            Err(e) => {
                warn!("Could not read priority of deployment {}: {}", id, e);
                None
            }
        }
    }

    /// Run passes until cancelled
    ///
    /// A pass starts whenever [`Scheduler::submit`] signals new work or the
    /// retry interval elapses with deployments still queued. Cancellation is
    /// observed between passes.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting scheduler (retry interval {:?})",
            self.config.retry_interval
        );

        let mut retry = tokio::time::interval(self.config.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler shutting down");
                    return Ok(());
                }
                _ = self.work_available.notified() => {}
                _ = retry.tick() => {}
            }

            if self.queue.is_empty() {
                continue;
            }

            if let Err(e) = self.run_pass() {
                error!("Scheduling pass failed: {}", e);
            }
        }
    }
}
