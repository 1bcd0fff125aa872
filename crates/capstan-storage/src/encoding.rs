use capstan_core::{ClusterId, DeploymentId, RecordKind};
use std::fmt;

/// Key encoder for storage keys
pub struct KeyEncoder;

impl KeyEncoder {
    /// Encode a cluster record key: clusters/{id:020}
    pub fn cluster_key(id: ClusterId) -> String {
        id.storage_key()
    }

    /// Encode a deployment record key: deployments/{id:020}
    pub fn deployment_key(id: DeploymentId) -> String {
        id.storage_key()
    }

    /// Encode a prefix for scanning every record of a kind
    pub fn encode_prefix(kind: RecordKind) -> String {
        format!("{}/", kind.collection())
    }

    /// Encode the id sequence counter key for a kind
    pub fn sequence_key(kind: RecordKind) -> String {
        format!("sequence/{}", kind.collection())
    }

    /// Parse a record key back to its kind and id
    pub fn parse_key(key: &str) -> Option<(RecordKind, u64)> {
        let (collection, id) = key.split_once('/')?;

        let kind = match collection {
            "clusters" => RecordKind::Cluster,
            "deployments" => RecordKind::Deployment,
            _ => return None,
        };

        Some((kind, id.parse().ok()?))
    }
}

/// Index key types for secondary indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKey {
    /// Unique cluster name: index/cluster-name/{name}
    ClusterName(String),
}

impl IndexKey {
    /// Encode the index key to a string
    pub fn encode(&self) -> String {
        match self {
            IndexKey::ClusterName(name) => format!("index/cluster-name/{}", name),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keys() {
        assert_eq!(
            KeyEncoder::cluster_key(ClusterId::new(1)),
            "clusters/00000000000000000001"
        );
        assert_eq!(
            KeyEncoder::deployment_key(DeploymentId::new(12)),
            "deployments/00000000000000000012"
        );
    }

    #[test]
    fn test_encode_prefix() {
        assert_eq!(KeyEncoder::encode_prefix(RecordKind::Cluster), "clusters/");
        assert_eq!(
            KeyEncoder::encode_prefix(RecordKind::Deployment),
            "deployments/"
        );
    }

    #[test]
    fn test_sequence_keys_do_not_share_record_prefixes() {
        let seq = KeyEncoder::sequence_key(RecordKind::Deployment);
        assert!(!seq.starts_with(&KeyEncoder::encode_prefix(RecordKind::Deployment)));
    }

    #[test]
    fn test_parse_key() {
        let (kind, id) = KeyEncoder::parse_key("deployments/00000000000000000012").unwrap();
        assert_eq!(kind, RecordKind::Deployment);
        assert_eq!(id, 12);

        assert!(KeyEncoder::parse_key("sequence/clusters").is_none());
        assert!(KeyEncoder::parse_key("clusters/abc").is_none());
        assert!(KeyEncoder::parse_key("clusters").is_none());
    }

    #[test]
    fn test_index_key_cluster_name() {
        let key = IndexKey::ClusterName("pool-a".to_string());
        assert_eq!(key.encode(), "index/cluster-name/pool-a");
        assert_eq!(key.to_string(), "index/cluster-name/pool-a");
    }
}
