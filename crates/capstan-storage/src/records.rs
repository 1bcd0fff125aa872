//! Deployment/Cluster record store
//!
//! `RecordStore` is the only view of persistence the scheduler has. It is
//! assumed strongly consistent and synchronous. `KvRecordStore` implements
//! it over any `KVStore`, storing each record as JSON under its id key.

use crate::encoding::{IndexKey, KeyEncoder};
use crate::{KVStore, RedbBackend, Result, StorageError, Transaction};
use capstan_core::{
    CapstanError, Cluster, ClusterId, Deployment, DeploymentId, DeploymentStatus, NewCluster,
    NewDeployment, RecordKind,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Persistence operations for clusters and deployments
pub trait RecordStore: Send + Sync {
    /// Get a deployment by id
    fn get_deployment(&self, id: DeploymentId) -> Result<Option<Deployment>>;

    /// Get a cluster by id
    fn get_cluster(&self, id: ClusterId) -> Result<Option<Cluster>>;

    /// Persist a deployment (status changes)
    fn save_deployment(&self, deployment: &Deployment) -> Result<()>;

    /// Persist a cluster (availability changes)
    fn save_cluster(&self, cluster: &Cluster) -> Result<()>;

    /// Create a cluster, assigning its id; names are unique
    fn create_cluster(&self, request: NewCluster) -> Result<Cluster>;

    /// Create a queued deployment, assigning its id
    ///
    /// The target cluster is not checked: a deployment naming a missing
    /// cluster is accepted here and failed by the scheduler.
    fn create_deployment(&self, request: NewDeployment) -> Result<Deployment>;

    /// All clusters in id order
    fn list_clusters(&self) -> Result<Vec<Cluster>>;

    /// All deployments in id (creation) order
    fn list_deployments(&self) -> Result<Vec<Deployment>>;

    /// Look up a cluster by its unique name
    fn find_cluster_by_name(&self, name: &str) -> Result<Option<Cluster>>;

    /// Overwrite a deployment's status without consulting the state machine
    ///
    /// This is the external force-write: any status may be set from any
    /// other, the queue is not told, and a deployment moved out of
    /// `running` keeps its reservation.
    fn set_status(&self, id: DeploymentId, status: DeploymentStatus) -> Result<Deployment> {
        let mut deployment = self
            .get_deployment(id)?
            .ok_or_else(|| CapstanError::deployment_not_found(id))?;

        if deployment.status.is_terminal() && deployment.status != status {
            warn!(
                "Forcing deployment {} out of terminal status {} to {}",
                id, deployment.status, status
            );
        }

        deployment.status = status;
        self.save_deployment(&deployment)?;

        info!("Deployment {} status set to {}", id, status);
        Ok(deployment)
    }
}

/// `RecordStore` over a key-value backend
#[derive(Clone)]
pub struct KvRecordStore {
    kv: Arc<dyn KVStore>,
}

impl KvRecordStore {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    /// Open a record store on a redb database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Arc::new(RedbBackend::new(path)?)))
    }

    /// Record store backed by an in-memory redb database
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(RedbBackend::in_memory()?)))
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn list<T: DeserializeOwned>(&self, kind: RecordKind) -> Result<Vec<T>> {
        let prefix = KeyEncoder::encode_prefix(kind);
        let results = self.kv.scan(prefix.as_bytes())?;

        let mut records = Vec::with_capacity(results.len());

        for (key, data) in results.iter() {
            let key = String::from_utf8_lossy(key);
            if KeyEncoder::parse_key(&key).is_none() {
                warn!("Skipping malformed record key: {}", key);
                continue;
            }

            let record = serde_json::from_slice(data).map_err(|e| {
                StorageError::serialization_error(
                    format!("Failed to deserialize {} at {}: {}", kind, key, e),
                    Some(Box::new(e)),
                )
            })?;
            records.push(record);
        }

        Ok(records)
    }

    /// Bump and return the id sequence for `kind` inside `txn`
    fn next_id(txn: &mut dyn Transaction, kind: RecordKind) -> Result<u64> {
        let key = KeyEncoder::sequence_key(kind);

        let current = match txn.get(key.as_bytes())? {
            Some(raw) => {
                let bytes: [u8; 8] = raw.as_ref().try_into().map_err(|_| {
                    StorageError::serialization_error(
                        format!("Corrupt id sequence at {}", key),
                        None,
                    )
                })?;
                u64::from_be_bytes(bytes)
            }
            None => 0,
        };

        let next = current + 1;
        txn.put(key.as_bytes(), &next.to_be_bytes())?;

        Ok(next)
    }
}

impl RecordStore for KvRecordStore {
    fn get_deployment(&self, id: DeploymentId) -> Result<Option<Deployment>> {
        self.load(&KeyEncoder::deployment_key(id))
    }

    fn get_cluster(&self, id: ClusterId) -> Result<Option<Cluster>> {
        self.load(&KeyEncoder::cluster_key(id))
    }

    fn save_deployment(&self, deployment: &Deployment) -> Result<()> {
        let key = KeyEncoder::deployment_key(deployment.id);
        let data = serde_json::to_vec(deployment)?;
        self.kv.put(key.as_bytes(), &data)?;

        debug!("Saved deployment {} ({})", deployment.id, deployment.status);
        Ok(())
    }

    fn save_cluster(&self, cluster: &Cluster) -> Result<()> {
        cluster.validate().map_err(CapstanError::from)?;

        let key = KeyEncoder::cluster_key(cluster.id);
        let data = serde_json::to_vec(cluster)?;
        self.kv.put(key.as_bytes(), &data)?;

        debug!("Saved cluster {} (available {})", cluster.id, cluster.available);
        Ok(())
    }

    fn create_cluster(&self, request: NewCluster) -> Result<Cluster> {
        request.validate().map_err(CapstanError::from)?;

        let index = IndexKey::ClusterName(request.name.clone()).encode();

        let mut txn = self.kv.transaction()?;

        if txn.get(index.as_bytes())?.is_some() {
            return Err(CapstanError::already_exists(format!("cluster '{}'", request.name)).into());
        }

        let id = ClusterId::new(Self::next_id(txn.as_mut(), RecordKind::Cluster)?);
        let cluster = Cluster::from_request(id, request, Utc::now());

        let data = serde_json::to_vec(&cluster)?;
        txn.put(KeyEncoder::cluster_key(id).as_bytes(), &data)?;
        txn.put(index.as_bytes(), &id.get().to_be_bytes())?;
        txn.commit()?;

        info!("Created cluster {} '{}' with capacity {}", cluster.id, cluster.name, cluster.total);
        Ok(cluster)
    }

    fn create_deployment(&self, request: NewDeployment) -> Result<Deployment> {
        request.validate().map_err(CapstanError::from)?;

        let mut txn = self.kv.transaction()?;

        let id = DeploymentId::new(Self::next_id(txn.as_mut(), RecordKind::Deployment)?);
        let deployment = Deployment::from_request(id, request, Utc::now());

        let data = serde_json::to_vec(&deployment)?;
        txn.put(KeyEncoder::deployment_key(id).as_bytes(), &data)?;
        txn.commit()?;

        info!(
            "Created deployment {} '{}' for cluster {} requesting {} at priority {}",
            deployment.id,
            deployment.name,
            deployment.cluster_id,
            deployment.required,
            deployment.priority
        );
        Ok(deployment)
    }

    fn list_clusters(&self) -> Result<Vec<Cluster>> {
        self.list(RecordKind::Cluster)
    }

    fn list_deployments(&self) -> Result<Vec<Deployment>> {
        self.list(RecordKind::Deployment)
    }

    fn find_cluster_by_name(&self, name: &str) -> Result<Option<Cluster>> {
        let index = IndexKey::ClusterName(name.to_string()).encode();

        let Some(raw) = self.kv.get(index.as_bytes())? else {
            return Ok(None);
        };

        let bytes: [u8; 8] = raw.as_ref().try_into().map_err(|_| {
            StorageError::serialization_error(format!("Corrupt index entry at {}", index), None)
        })?;

        self.get_cluster(ClusterId::new(u64::from_be_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_core::Resources;
    use tempfile::tempdir;

    fn store() -> KvRecordStore {
        KvRecordStore::in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_cluster() {
        let store = store();

        let cluster = store
            .create_cluster(NewCluster::new("pool-a", Resources::new(10, 4, 2)))
            .unwrap();
        assert_eq!(cluster.id, ClusterId::new(1));
        assert_eq!(cluster.available, Resources::new(10, 4, 2));

        let loaded = store.get_cluster(cluster.id).unwrap().unwrap();
        assert_eq!(loaded, cluster);

        assert!(store.get_cluster(ClusterId::new(999)).unwrap().is_none());
    }

    #[test]
    fn test_cluster_names_are_unique() {
        let store = store();

        store
            .create_cluster(NewCluster::new("pool-a", Resources::new(10, 4, 2)))
            .unwrap();
        let err = store
            .create_cluster(NewCluster::new("pool-a", Resources::new(1, 1, 1)))
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Record(CapstanError::AlreadyExists { .. })
        ));
        // The failed create did not consume an id
        let next = store
            .create_cluster(NewCluster::new("pool-b", Resources::new(1, 1, 1)))
            .unwrap();
        assert_eq!(next.id, ClusterId::new(2));
    }

    #[test]
    fn test_create_cluster_rejects_invalid_name() {
        let err = store()
            .create_cluster(NewCluster::new("bad name", Resources::zero()))
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Record(CapstanError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_find_cluster_by_name() {
        let store = store();
        let cluster = store
            .create_cluster(NewCluster::new("pool-a", Resources::new(10, 4, 2)))
            .unwrap();

        assert_eq!(store.find_cluster_by_name("pool-a").unwrap(), Some(cluster));
        assert!(store.find_cluster_by_name("pool-z").unwrap().is_none());
    }

    #[test]
    fn test_deployment_ids_increase_in_creation_order() {
        let store = store();

        let a = store
            .create_deployment(NewDeployment::new(
                "a",
                ClusterId::new(1),
                "img",
                Resources::new(1, 1, 0),
            ))
            .unwrap();
        let b = store
            .create_deployment(NewDeployment::new(
                "b",
                ClusterId::new(1),
                "img",
                Resources::new(1, 1, 0),
            ))
            .unwrap();

        assert!(a.id < b.id);
        assert_eq!(a.status, DeploymentStatus::Queued);

        let listed: Vec<_> = store
            .list_deployments()
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(listed, vec![a.id, b.id]);
    }

    #[test]
    fn test_create_deployment_accepts_missing_cluster() {
        let deployment = store()
            .create_deployment(NewDeployment::new(
                "orphan",
                ClusterId::new(999),
                "img",
                Resources::new(1, 1, 0),
            ))
            .unwrap();
        assert_eq!(deployment.cluster_id, ClusterId::new(999));
    }

    #[test]
    fn test_save_deployment_persists_status() {
        let store = store();
        let mut deployment = store
            .create_deployment(NewDeployment::new(
                "web",
                ClusterId::new(1),
                "img",
                Resources::new(1, 1, 0),
            ))
            .unwrap();

        deployment.transition_to(DeploymentStatus::Running).unwrap();
        store.save_deployment(&deployment).unwrap();

        let loaded = store.get_deployment(deployment.id).unwrap().unwrap();
        assert_eq!(loaded.status, DeploymentStatus::Running);
    }

    #[test]
    fn test_set_status_bypasses_state_machine() {
        let store = store();
        let mut deployment = store
            .create_deployment(NewDeployment::new(
                "web",
                ClusterId::new(1),
                "img",
                Resources::new(1, 1, 0),
            ))
            .unwrap();
        deployment.transition_to(DeploymentStatus::Failed).unwrap();
        store.save_deployment(&deployment).unwrap();

        // Failed -> Queued is not a state machine transition
        let forced = store
            .set_status(deployment.id, DeploymentStatus::Queued)
            .unwrap();

        assert_eq!(forced.status, DeploymentStatus::Queued);
        assert_eq!(
            store.get_deployment(deployment.id).unwrap().unwrap().status,
            DeploymentStatus::Queued
        );
    }

    #[test]
    fn test_set_status_on_missing_deployment() {
        let store = store();

        let err = store
            .set_status(DeploymentId::new(42), DeploymentStatus::Running)
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Record(CapstanError::DeploymentNotFound { .. })
        ));
    }

    #[test]
    fn test_save_cluster_rejects_available_above_total() {
        let store = store();
        let mut cluster = store
            .create_cluster(NewCluster::new("pool-a", Resources::new(10, 4, 2)))
            .unwrap();

        cluster.available = Resources::new(11, 4, 2);
        assert!(store.save_cluster(&cluster).is_err());

        let loaded = store.get_cluster(cluster.id).unwrap().unwrap();
        assert_eq!(loaded.available, Resources::new(10, 4, 2));
    }

    #[test]
    fn test_list_clusters_ignores_other_collections() {
        let store = store();
        store
            .create_cluster(NewCluster::new("pool-a", Resources::new(10, 4, 2)))
            .unwrap();
        store
            .create_deployment(NewDeployment::new(
                "web",
                ClusterId::new(1),
                "img",
                Resources::zero(),
            ))
            .unwrap();

        assert_eq!(store.list_clusters().unwrap().len(), 1);
        assert_eq!(store.list_deployments().unwrap().len(), 1);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("records.redb");

        let id = {
            let store = KvRecordStore::open(&db_path).unwrap();
            store
                .create_cluster(NewCluster::new("pool-a", Resources::new(10, 4, 2)))
                .unwrap()
                .id
        };

        let store = KvRecordStore::open(&db_path).unwrap();
        assert!(store.get_cluster(id).unwrap().is_some());

        // The sequence continues where it left off
        let next = store
            .create_cluster(NewCluster::new("pool-b", Resources::new(1, 1, 1)))
            .unwrap();
        assert_eq!(next.id, ClusterId::new(id.get() + 1));
    }
}
