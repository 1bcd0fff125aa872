//! Resource ledger
//!
//! The ledger is the only writer of cluster availability. A reservation is
//! all-or-nothing across memory, compute and accelerators, and the
//! check-and-decrement runs under one lock so two reservations never
//! interleave.

use crate::{Result, SchedulerError};
use capstan_core::{Cluster, ClusterId, Resources};
use capstan_storage::RecordStore;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Outcome of a reservation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// Capacity was taken; carries the cluster as persisted afterwards
    Reserved(Cluster),
    /// At least one dimension was short; nothing changed
    InsufficientCapacity {
        requested: Resources,
        available: Resources,
    },
    /// No cluster with that id
    ClusterNotFound,
}

/// Capacity ledger over the clusters held in a `RecordStore`
pub struct ResourceLedger {
    store: Arc<dyn RecordStore>,
    guard: Mutex<()>,
}

impl ResourceLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.guard
            .lock()
            .map_err(|_| SchedulerError::internal_error("Resource ledger lock poisoned"))
    }

    /// Reserve `request` on a cluster if every dimension fits
    pub fn try_reserve(&self, cluster_id: ClusterId, request: &Resources) -> Result<Reservation> {
        let _guard = self.lock()?;

        let Some(mut cluster) = self.store.get_cluster(cluster_id)? else {
            return Ok(Reservation::ClusterNotFound);
        };

        let Some(remaining) = cluster.available.checked_sub(request) else {
            debug!(
                "Cluster {} cannot fit {}: available {}, short by {}",
                cluster_id,
                request,
                cluster.available,
                request.shortfall(&cluster.available)
            );
            return Ok(Reservation::InsufficientCapacity {
                requested: *request,
                available: cluster.available,
            });
        };

        cluster.available = remaining;
        self.store.save_cluster(&cluster)?;

        debug!(
            "Reserved {} on cluster {}, {} left",
            request, cluster_id, cluster.available
        );
        Ok(Reservation::Reserved(cluster))
    }

    /// Return `amounts` to a cluster's available capacity
    ///
    /// Availability never rises above the cluster total: an over-release is
    /// clamped and logged. Returns `None` if the cluster does not exist.
    pub fn release(&self, cluster_id: ClusterId, amounts: &Resources) -> Result<Option<Cluster>> {
        let _guard = self.lock()?;

        let Some(mut cluster) = self.store.get_cluster(cluster_id)? else {
            warn!("Cannot release {} on missing cluster {}", amounts, cluster_id);
            return Ok(None);
        };

        if !amounts.fits_within(&cluster.allocated()) {
            warn!(
                "Release of {} on cluster {} exceeds allocated {}; clamping at total",
                amounts,
                cluster_id,
                cluster.allocated()
            );
        }

        cluster.available = cluster
            .available
            .saturating_add_capped(amounts, &cluster.total);
        self.store.save_cluster(&cluster)?;

        debug!(
            "Released {} on cluster {}, {} available",
            amounts, cluster_id, cluster.available
        );
        Ok(Some(cluster))
    }

    /// Current available capacity of a cluster, without changing anything
    pub fn available(&self, cluster_id: ClusterId) -> Result<Option<Resources>> {
        Ok(self.store.get_cluster(cluster_id)?.map(|c| c.available))
    }
}
