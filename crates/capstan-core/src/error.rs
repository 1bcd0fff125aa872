// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Capstan operations
#[derive(Error, Debug, Diagnostic)]
pub enum CapstanError {
    /// Cluster not found
    #[error("Cluster not found: {cluster_id}")]
    #[diagnostic(
        code(capstan::cluster_not_found),
        help("List clusters with `capstan cluster list` and use one of the printed ids")
    )]
    ClusterNotFound {
        #[allow(unused)]
        cluster_id: String,
    },

    /// Deployment not found
    #[error("Deployment not found: {deployment_id}")]
    #[diagnostic(
        code(capstan::deployment_not_found),
        help("Verify the deployment id is correct")
    )]
    DeploymentNotFound {
        #[allow(unused)]
        deployment_id: String,
    },

    /// Record already exists
    #[error("Record already exists: {record}")]
    #[diagnostic(
        code(capstan::already_exists),
        help("Names must be unique. Pick a different name")
    )]
    AlreadyExists {
        #[allow(unused)]
        record: String,
    },

    /// Validation failed
    #[error("Validation failed for {record_kind}: {details}")]
    #[diagnostic(
        code(capstan::validation_failed),
        help("{help_text}")
    )]
    ValidationFailed {
        #[allow(unused)]
        record_kind: String,
        #[allow(unused)]
        details: String,
        #[allow(unused)]
        help_text: String,
    },

    /// Illegal deployment status change
    #[error("Deployment {deployment_id} cannot move from '{from}' to '{to}'")]
    #[diagnostic(
        code(capstan::invalid_status_transition),
        help("Only queued deployments can become running or failed; running and failed are final")
    )]
    InvalidStatusTransition {
        #[allow(unused)]
        deployment_id: String,
        #[allow(unused)]
        from: String,
        #[allow(unused)]
        to: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(capstan::serialization_error),
        help("Ensure the input is valid JSON or YAML and that quantities are non-negative integers")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(capstan::internal_error),
        help("This is likely a bug. Please report it with the full error details")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type alias for Capstan operations
pub type Result<T> = std::result::Result<T, CapstanError>;

impl CapstanError {
    /// Create a ClusterNotFound error
    pub fn cluster_not_found(cluster_id: impl ToString) -> Self {
        Self::ClusterNotFound {
            cluster_id: cluster_id.to_string(),
        }
    }

    /// Create a DeploymentNotFound error
    pub fn deployment_not_found(deployment_id: impl ToString) -> Self {
        Self::DeploymentNotFound {
            deployment_id: deployment_id.to_string(),
        }
    }

    /// Create an AlreadyExists error
    pub fn already_exists(record: impl Into<String>) -> Self {
        Self::AlreadyExists {
            record: record.into(),
        }
    }

    /// Create a ValidationFailed error
    pub fn validation_failed(
        record_kind: impl Into<String>,
        details: impl Into<String>,
        help_text: impl Into<String>,
    ) -> Self {
        Self::ValidationFailed {
            record_kind: record_kind.into(),
            details: details.into(),
            help_text: help_text.into(),
        }
    }

    /// Create an InvalidStatusTransition error
    pub fn invalid_status_transition(
        deployment_id: impl ToString,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidStatusTransition {
            deployment_id: deployment_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
