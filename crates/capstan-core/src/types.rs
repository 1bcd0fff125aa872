use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of record held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Cluster,
    Deployment,
}

impl RecordKind {
    /// Collection name used as the storage key prefix
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Cluster => "clusters",
            RecordKind::Deployment => "deployments",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Cluster => write!(f, "Cluster"),
            RecordKind::Deployment => write!(f, "Deployment"),
        }
    }
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(&self) -> u64 {
                self.0
            }

            /// Storage key encoding: {collection}/{zero-padded id}
            ///
            /// Zero padding keeps lexicographic key order equal to id order.
            pub fn storage_key(&self) -> String {
                format!("{}/{:020}", $kind.collection(), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }
    };
}

record_id!(
    /// Store-assigned identifier of a cluster
    ClusterId,
    RecordKind::Cluster
);

record_id!(
    /// Store-assigned identifier of a deployment, increasing in creation order
    DeploymentId,
    RecordKind::Deployment
);
