use capstan_core::{CapstanError, Cluster, ClusterId, Deployment};
use capstan_core::{NewCluster, NewDeployment, Resources, DEFAULT_OWNER, DEFAULT_PRIORITY};
use capstan_storage::RecordStore;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

/// A batch of clusters and deployments to create
///
/// ```yaml
/// clusters:
///   - name: pool-a
///     total: { memory: 10, cpu: 4, gpu: 2 }
/// deployments:
///   - name: web
///     cluster: pool-a
///     image: nginx:1.27
///     required: { memory: 2, cpu: 1, gpu: 0 }
///     priority: 3
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub clusters: Vec<NewCluster>,
    #[serde(default)]
    pub deployments: Vec<DeploymentEntry>,
}

/// Deployment entry; the cluster is named rather than numbered
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentEntry {
    pub name: String,
    pub cluster: String,
    pub image: String,
    pub required: Resources,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Records created (or reused) while applying a manifest
#[derive(Debug, Default)]
pub struct Applied {
    pub clusters: Vec<Cluster>,
    pub deployments: Vec<Deployment>,
}

impl Manifest {
    pub fn from_yaml(text: &str) -> miette::Result<Self> {
        capstan_core::from_yaml(text).map_err(miette::Report::new)
    }

    /// Create every cluster and deployment in the manifest
    ///
    /// Every entry is validated and every cluster reference resolved before
    /// anything is written, so a bad manifest creates nothing. Clusters
    /// whose name already exists are reused as-is. Deployments are created
    /// in manifest order, so they enter the queue in that order.
    pub fn apply(self, store: &dyn RecordStore) -> miette::Result<Applied> {
        let existing = self.check(store)?;
        let mut applied = Applied::default();
        let mut ids = HashMap::new();

        for request in self.clusters {
            let cluster = match existing.get(&request.name) {
                Some(cluster) => {
                    info!("Cluster '{}' already exists as {}", cluster.name, cluster.id);
                    cluster.clone()
                }
                None => store.create_cluster(request).map_err(miette::Report::new)?,
            };
            ids.insert(cluster.name.clone(), cluster.id);
            applied.clusters.push(cluster);
        }
        for (name, cluster) in &existing {
            ids.entry(name.clone()).or_insert(cluster.id);
        }

        for entry in self.deployments {
            let cluster_id = ids.get(&entry.cluster).copied().ok_or_else(|| {
                miette::miette!("Manifest references unknown cluster '{}'", entry.cluster)
            })?;
            applied.deployments.push(
                store
                    .create_deployment(entry.request(cluster_id))
                    .map_err(miette::Report::new)?,
            );
        }

        Ok(applied)
    }

    /// Validate every entry and look up every cluster name already stored
    fn check(&self, store: &dyn RecordStore) -> miette::Result<HashMap<String, Cluster>> {
        let mut existing = HashMap::new();
        let names = self
            .clusters
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.deployments.iter().map(|d| d.cluster.as_str()));
        for name in names {
            if existing.contains_key(name) {
                continue;
            }
            if let Some(cluster) = store
                .find_cluster_by_name(name)
                .map_err(miette::Report::new)?
            {
                existing.insert(name.to_string(), cluster);
            }
        }

        for (i, request) in self.clusters.iter().enumerate() {
            request
                .validate()
                .map_err(|e| miette::Report::new(CapstanError::from(e)))?;
            if self.clusters[..i].iter().any(|c| c.name == request.name) {
                return Err(miette::miette!(
                    "Manifest declares cluster '{}' twice",
                    request.name
                ));
            }
        }

        for entry in &self.deployments {
            let declared = self.clusters.iter().any(|c| c.name == entry.cluster);
            if !declared && !existing.contains_key(&entry.cluster) {
                return Err(miette::miette!(
                    "Manifest references unknown cluster '{}'",
                    entry.cluster
                ));
            }
            entry
                .request(ClusterId::new(0))
                .validate()
                .map_err(|e| miette::Report::new(CapstanError::from(e)))?;
        }

        Ok(existing)
    }
}

impl DeploymentEntry {
    fn request(&self, cluster_id: ClusterId) -> NewDeployment {
        NewDeployment::new(
            self.name.clone(),
            cluster_id,
            self.image.clone(),
            self.required,
        )
        .with_priority(self.priority.unwrap_or(DEFAULT_PRIORITY))
        .with_owner(
            self.owner
                .clone()
                .unwrap_or_else(|| DEFAULT_OWNER.to_string()),
        )
    }
}
