//! Capstan Core - Records and types shared by the Capstan scheduler
//!
//! This crate provides:
//! - Cluster and deployment records
//! - Resource quantity arithmetic across memory, compute and accelerators
//! - The deployment status state machine
//! - Error types with miette diagnostics
//! - Serialization helpers

pub mod error;
pub mod resources;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use error::{CapstanError, Result};
pub use resources::{
    is_valid_name, Cluster, Deployment, NewCluster, NewDeployment, ResourceError, Resources,
    DEFAULT_OWNER, DEFAULT_PRIORITY,
};
pub use status::DeploymentStatus;
pub use types::{ClusterId, DeploymentId, RecordKind};

/// Serialize a record to JSON
pub fn to_json<T: serde::Serialize>(record: &T) -> Result<String> {
    serde_json::to_string(record).map_err(|e| {
        CapstanError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a record to pretty JSON
pub fn to_json_pretty<T: serde::Serialize>(record: &T) -> Result<String> {
    serde_json::to_string_pretty(record).map_err(|e| {
        CapstanError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a record from JSON
pub fn from_json<T: for<'de> serde::Deserialize<'de>>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| {
        CapstanError::serialization_error(
            format!("Failed to deserialize from JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a record to YAML
pub fn to_yaml<T: serde::Serialize>(record: &T) -> Result<String> {
    serde_yaml::to_string(record).map_err(|e| {
        CapstanError::serialization_error(
            format!("Failed to serialize to YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a record from YAML
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        CapstanError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_cluster() -> Cluster {
        Cluster::from_request(
            ClusterId::new(1),
            NewCluster::new("pool-a", Resources::new(10, 4, 2)),
            Utc::now(),
        )
    }

    #[test]
    fn test_json_serialization() {
        let cluster = sample_cluster();

        let json = to_json(&cluster).unwrap();
        assert!(json.contains("pool-a"));

        let deserialized: Cluster = from_json(json.as_bytes()).unwrap();
        assert_eq!(deserialized, cluster);
    }

    #[test]
    fn test_yaml_serialization() {
        let cluster = sample_cluster();

        let yaml = to_yaml(&cluster).unwrap();
        assert!(yaml.contains("pool-a"));

        let deserialized: Cluster = from_yaml(&yaml).unwrap();
        assert_eq!(deserialized.name, "pool-a");
        assert_eq!(deserialized.total, Resources::new(10, 4, 2));
    }

    #[test]
    fn test_from_json_reports_serialization_error() {
        let err = from_json::<Cluster>(b"not json").unwrap_err();
        assert!(matches!(err, CapstanError::SerializationError { .. }));
    }
}
