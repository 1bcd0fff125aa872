//! Admission queue
//!
//! An ordered list of pending deployment ids. It carries no resource state:
//! whoever dequeues must re-read the records before deciding anything.
//! `AdmissionQueue` is a cheap handle; clones share the same queue.

use capstan_core::DeploymentId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct AdmissionQueue {
    inner: Arc<Mutex<VecDeque<DeploymentId>>>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // Every operation leaves the deque consistent, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<DeploymentId>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail
    pub fn enqueue(&self, id: DeploymentId) {
        let mut queue = self.lock();
        queue.push_back(id);
        debug!("Deployment {} added to the queue ({} queued)", id, queue.len());
    }

    /// Remove and return the head, or `None` if the queue is empty
    pub fn dequeue(&self) -> Option<DeploymentId> {
        let id = self.lock().pop_front();
        if let Some(id) = id {
            debug!("Deployment {} removed from the queue", id);
        }
        id
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: DeploymentId) -> bool {
        self.lock().contains(&id)
    }

    /// Queue contents from head to tail
    pub fn snapshot(&self) -> Vec<DeploymentId> {
        self.lock().iter().copied().collect()
    }

    /// Put an id back at the head, undoing a dequeue
    pub(crate) fn push_front(&self, id: DeploymentId) {
        self.lock().push_front(id);
    }

    /// Reinsert `id` at the position its priority earns
    ///
    /// Afterwards the queue holds, in order: every other entry with priority
    /// strictly above `priority`, then `id`, then every other entry with
    /// priority at or below `priority`. Both groups keep their previous
    /// relative order. Earlier occurrences of `id` are removed rather than
    /// compared, so the id appears exactly once. Entries for which
    /// `priority_of` returns `None` count as lowest priority.
    ///
    /// Priorities are looked up from a snapshot before the queue is locked.
    /// An entry enqueued in between has no lookup and also counts as lowest,
    /// so it stays behind `id`.
    pub fn requeue_by_priority<F>(&self, id: DeploymentId, priority: i32, mut priority_of: F)
    where
        F: FnMut(DeploymentId) -> Option<i32>,
    {
        let mut priorities = HashMap::new();
        for queued in self.snapshot() {
            if queued != id && !priorities.contains_key(&queued) {
                priorities.insert(queued, priority_of(queued));
            }
        }

        let mut queue = self.lock();

        let (higher, rest): (Vec<_>, Vec<_>) = queue
            .drain(..)
            .filter(|queued| *queued != id)
            .partition(|queued| {
                priorities
                    .get(queued)
                    .copied()
                    .flatten()
                    .is_some_and(|p| p > priority)
            });

        queue.extend(higher);
        queue.push_back(id);
        queue.extend(rest);

        debug!(
            "Deployment {} requeued with priority {}. Current queue: {:?}",
            id, priority, queue
        );
    }
}
