//! Cluster resource types consumed by the placement core.
//!
//! All entities here are plain serde values: the scheduler takes an
//! immutable snapshot per decision and never writes back through them.

pub mod quantities;

pub use quantities::{NodeCapacity, ResourceQuantities};

use crate::labels::LabelMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Object metadata shared by every resource kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: LabelMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A container's scheduling-relevant surface: resource requests and ports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
    pub name: String,
    /// Requested quantities keyed by resource name (`cpu`, `memory`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerPort {
    /// Port exposed on the host. 0 means unspecified and is ignored in
    /// conflict checks.
    pub host_port: u16,
    pub container_port: u16,
}

/// Identity of a volume for conflict checking. Kinds the scheduler does
/// not understand are opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeSource {
    #[serde(rename_all = "camelCase")]
    GcePersistentDisk { pd_name: String, read_only: bool },
    #[serde(rename_all = "camelCase")]
    AwsElasticBlockStore { volume_id: String },
    #[serde(rename_all = "camelCase")]
    RbdImage {
        monitors: Vec<String>,
        pool: String,
        image: String,
    },
    #[serde(rename_all = "camelCase")]
    PersistentVolumeClaim { claim_name: String },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub source: VolumeSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
    /// Host this pod is placed on; empty until the pod is scheduled
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    pub containers: Vec<Container>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    /// Equality map the node's labels must cover
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: LabelMap,
    /// Legacy equality map matched against peer pods' labels by the
    /// service affinity priority
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub affinity_selector: LabelMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
}

impl Pod {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// `namespace/name`, the form used in log lines and error messages
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }

    /// Sum of CPU and memory requests across all containers
    pub fn resource_request(&self) -> ResourceQuantities {
        let mut total = ResourceQuantities::default();
        for container in &self.spec.containers {
            let request = ResourceQuantities::from_resource_map(&container.requests);
            total.cpu_millicores += request.cpu_millicores;
            total.memory_bytes += request.memory_bytes;
        }
        total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStatus {
    /// Capacity quantities keyed by resource name (`cpu`, `memory`, `pods`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub metadata: ObjectMeta,
    pub status: NodeStatus,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn capacity(&self) -> NodeCapacity {
        NodeCapacity::from_capacity_map(&self.status.capacity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSpec {
    /// Pods carrying these labels belong to the service
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: LabelMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentVolume {
    pub metadata: ObjectMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentVolumeClaimSpec {
    /// Name of the bound persistent volume; empty while unbound
    #[serde(skip_serializing_if = "String::is_empty")]
    pub volume_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentVolumeClaim {
    pub metadata: ObjectMeta,
    pub spec: PersistentVolumeClaimSpec,
}

/// Check a resource name against the DNS subdomain rules: 1 to 253
/// characters drawn from lowercase alphanumerics, '-' and '.', with an
/// alphanumeric at both ends.
pub fn is_valid_name(name: &str) -> bool {
    fn alnum(b: u8) -> bool {
        b.is_ascii_lowercase() || b.is_ascii_digit()
    }

    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(&first), Some(&last)) if alnum(first) && alnum(last) => {
            bytes.len() <= 253 && bytes.iter().all(|&b| alnum(b) || b == b'-' || b == b'.')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        for good in ["a", "pod-7", "web.backend", "0db"] {
            assert!(is_valid_name(good), "{} should be accepted", good);
        }

        let too_long = "a".repeat(254);
        for bad in ["", "Backend", "db_replica", ".hidden", "trailing.", "-x", &too_long] {
            assert!(!is_valid_name(bad), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_pod_resource_request() {
        let mut pod = Pod::default();
        pod.spec.containers = vec![
            Container {
                name: "a".to_string(),
                requests: BTreeMap::from([
                    ("cpu".to_string(), "500m".to_string()),
                    ("memory".to_string(), "1Gi".to_string()),
                ]),
                ports: vec![],
            },
            Container {
                name: "b".to_string(),
                requests: BTreeMap::from([("cpu".to_string(), "0.5".to_string())]),
                ports: vec![],
            },
        ];

        let request = pod.resource_request();
        assert_eq!(request.cpu_millicores, 1000);
        assert_eq!(request.memory_bytes, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_volume_source_round_trip() {
        let volume = Volume {
            name: "data".to_string(),
            source: VolumeSource::GcePersistentDisk {
                pd_name: "d1".to_string(),
                read_only: true,
            },
        };

        let json = serde_json::to_string(&volume).unwrap();
        assert!(json.contains("gcePersistentDisk"));
        assert!(json.contains("pdName"));

        let parsed: Volume = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, volume);
    }

    #[test]
    fn test_node_capacity() {
        let mut node = Node::default();
        node.metadata.name = "m1".to_string();
        node.status.capacity = BTreeMap::from([
            ("cpu".to_string(), "4".to_string()),
            ("memory".to_string(), "8Gi".to_string()),
            ("pods".to_string(), "110".to_string()),
        ]);

        let capacity = node.capacity();
        assert_eq!(capacity.cpu_millicores, 4000);
        assert_eq!(capacity.pods, 110);
    }
}
