pub mod quantities;

pub use quantities::Resources;

use crate::status::DeploymentStatus;
use crate::types::{ClusterId, DeploymentId};
use crate::{CapstanError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority given to deployments that do not ask for one
///
/// Also the lowest priority a deployment may ask for, so an unspecified
/// priority always ranks last.
pub const DEFAULT_PRIORITY: i32 = 1;

/// Owner recorded for deployments created without one
pub const DEFAULT_OWNER: &str = "default";

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

/// Record-level validation errors
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Capacity invariant violated: {0}")]
    CapacityInvariant(String),

    #[error("Priority {0} is below the minimum of {min}", min = DEFAULT_PRIORITY)]
    PriorityTooLow(i32),
}

impl From<ResourceError> for CapstanError {
    fn from(err: ResourceError) -> Self {
        let help = match &err {
            ResourceError::MissingField(_) => "Provide a value for every required field",
            ResourceError::InvalidName(_) => {
                "Names use ASCII letters, digits, '-', '_' or '.', and start and end with a letter or digit"
            }
            ResourceError::CapacityInvariant(_) => {
                "Available capacity must never exceed total capacity"
            }
            ResourceError::PriorityTooLow(_) => {
                "Omit the priority for the lowest precedence, or use a larger value"
            }
        };
        CapstanError::validation_failed("record", err.to_string(), help)
    }
}

/// Validate a cluster or deployment name
///
/// Up to 253 characters of ASCII alphanumerics, '-', '_' or '.',
/// starting and ending with an alphanumeric.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    let bytes = name.as_bytes();

    if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
        return false;
    }

    bytes
        .iter()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b'.'))
}

/// Request to create a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCluster {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub total: Resources,
}

impl NewCluster {
    pub fn new(name: impl Into<String>, total: Resources) -> Self {
        Self {
            name: name.into(),
            organization: None,
            total,
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ResourceError> {
        if !is_valid_name(&self.name) {
            return Err(ResourceError::InvalidName(self.name.clone()));
        }
        Ok(())
    }
}

/// A finite resource pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Capacity fixed at creation
    pub total: Resources,
    /// Capacity not currently reserved; only the ledger changes it
    pub available: Resources,
    pub created_at: DateTime<Utc>,
}

impl Cluster {
    /// Materialize a create request; a new cluster starts fully available
    pub fn from_request(id: ClusterId, request: NewCluster, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: request.name,
            organization: request.organization,
            total: request.total,
            available: request.total,
            created_at,
        }
    }

    /// Capacity currently reserved by admitted deployments
    pub fn allocated(&self) -> Resources {
        self.total.checked_sub(&self.available).unwrap_or_default()
    }

    /// Check `available <= total` on every dimension
    pub fn validate(&self) -> std::result::Result<(), ResourceError> {
        if !is_valid_name(&self.name) {
            return Err(ResourceError::InvalidName(self.name.clone()));
        }
        if !self.available.fits_within(&self.total) {
            return Err(ResourceError::CapacityInvariant(format!(
                "cluster {} has available ({}) above total ({})",
                self.id, self.available, self.total
            )));
        }
        Ok(())
    }
}

/// Request to create a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeployment {
    pub name: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    pub cluster_id: ClusterId,
    pub image: String,
    pub required: Resources,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

impl NewDeployment {
    pub fn new(
        name: impl Into<String>,
        cluster_id: ClusterId,
        image: impl Into<String>,
        required: Resources,
    ) -> Self {
        Self {
            name: name.into(),
            owner: default_owner(),
            cluster_id,
            image: image.into(),
            required,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ResourceError> {
        if !is_valid_name(&self.name) {
            return Err(ResourceError::InvalidName(self.name.clone()));
        }
        if self.image.trim().is_empty() {
            return Err(ResourceError::MissingField("image".to_string()));
        }
        if self.owner.trim().is_empty() {
            return Err(ResourceError::MissingField("owner".to_string()));
        }
        if self.priority < DEFAULT_PRIORITY {
            return Err(ResourceError::PriorityTooLow(self.priority));
        }
        Ok(())
    }
}

/// A unit of requested work with fixed resource needs and a priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub name: String,
    pub owner: String,
    pub cluster_id: ClusterId,
    pub image: String,
    pub required: Resources,
    /// Higher value means higher precedence
    pub priority: i32,
    #[serde(default)]
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    /// Materialize a create request; a new deployment starts queued
    pub fn from_request(
        id: DeploymentId,
        request: NewDeployment,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: request.name,
            owner: request.owner,
            cluster_id: request.cluster_id,
            image: request.image,
            required: request.required,
            priority: request.priority,
            status: DeploymentStatus::Queued,
            created_at,
        }
    }

    /// Move to `to` if the status state machine allows it
    pub fn transition_to(&mut self, to: DeploymentStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(CapstanError::invalid_status_transition(
                self.id,
                self.status,
                to,
            ));
        }
        self.status = to;
        Ok(())
    }

    pub fn is_queued(&self) -> bool {
        self.status == DeploymentStatus::Queued
    }
}
