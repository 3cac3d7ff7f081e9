//! Magnetar Core - data model for the placement decision core
//!
//! This crate provides:
//! - Cluster resource types (pods, nodes, services, volumes, claims)
//! - Label maps and the selector algebra
//! - Taints, tolerations, and affinity structures
//! - The scheduler annotation codecs
//! - Error types with miette diagnostics

pub mod affinity;
pub mod annotations;
pub mod error;
pub mod labels;
pub mod resources;
pub mod taints;

// Re-export commonly used types
pub use affinity::{
    Affinity, LabelSelector, NodeAffinity, PodAffinity, PodAffinityTerm, PreferredSchedulingTerm,
    WeightedPodAffinityTerm,
};
pub use error::{CoreError, Result};
pub use labels::{LabelMap, Operator, Requirement, Selector, SelectorError};
pub use resources::{
    Container, ContainerPort, Node, NodeCapacity, ObjectMeta, PersistentVolume,
    PersistentVolumeClaim, Pod, ResourceQuantities, Service, Volume, VolumeSource,
};
pub use taints::{Taint, TaintEffect, Toleration, TolerationOperator};

/// Serialize a resource to JSON
pub fn to_json<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_json::to_string(resource).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a resource from JSON
pub fn from_json<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to deserialize from JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a resource to YAML
pub fn to_yaml<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_yaml::to_string(resource).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to serialize to YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a resource from YAML
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_serialization() {
        let mut pod = Pod::default();
        pod.metadata.name = "nginx".to_string();

        let json = to_json(&pod).unwrap();
        assert!(json.contains("nginx"));

        let deserialized: Pod = from_json(&json).unwrap();
        assert_eq!(deserialized.metadata.name, "nginx");
    }

    #[test]
    fn test_yaml_serialization() {
        let mut node = Node::default();
        node.metadata.name = "m1".to_string();

        let yaml = to_yaml(&node).unwrap();
        assert!(yaml.contains("m1"));

        let deserialized: Node = from_yaml(&yaml).unwrap();
        assert_eq!(deserialized.metadata.name, "m1");
    }
}
