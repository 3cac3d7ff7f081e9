//! Read-only cluster views consumed by predicates and priorities.
//!
//! Every scheduling cycle captures an immutable [`ClusterSnapshot`]; all
//! predicates and priorities observe that one view, so a cycle never sees
//! external mutations midway through.

use crate::error::{Result, SchedulerError};
use magnetar_core::{
    Node, PersistentVolume, PersistentVolumeClaim, Pod, Selector, Service,
};
use std::collections::BTreeMap;

/// Lists every node in the cluster view
pub trait NodeLister: Send + Sync {
    fn list(&self) -> Result<Vec<Node>>;
}

/// Lists pods matching a label selector
pub trait PodLister: Send + Sync {
    fn list(&self, selector: &Selector) -> Result<Vec<Pod>>;
}

/// Lists services, and resolves which services select a given pod
pub trait ServiceLister: Send + Sync {
    fn list(&self, selector: &Selector) -> Result<Vec<Service>>;

    /// Services in the pod's namespace whose selector matches the pod's
    /// labels
    fn get_pod_services(&self, pod: &Pod) -> Result<Vec<Service>>;
}

/// Resolves a node by name
pub trait NodeInfo: Send + Sync {
    fn get_node_info(&self, name: &str) -> Result<Node>;
}

/// Resolves a persistent volume by name
pub trait PersistentVolumeInfo: Send + Sync {
    fn get_persistent_volume_info(&self, name: &str) -> Result<PersistentVolume>;
}

/// Resolves a persistent volume claim by namespace and name
pub trait PersistentVolumeClaimInfo: Send + Sync {
    fn get_persistent_volume_claim_info(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim>;
}

/// Node lookup over a plain node list
#[derive(Debug, Clone, Default)]
pub struct StaticNodeInfo {
    nodes: Vec<Node>,
}

impl StaticNodeInfo {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

impl NodeInfo for StaticNodeInfo {
    fn get_node_info(&self, name: &str) -> Result<Node> {
        self.nodes
            .iter()
            .find(|n| n.name() == name)
            .cloned()
            .ok_or_else(|| SchedulerError::node_not_found(name))
    }
}

impl NodeLister for StaticNodeInfo {
    fn list(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}

/// Already-placed pods on one host
#[derive(Debug, Clone, Default)]
pub struct HostInfo {
    pods: Vec<Pod>,
}

impl HostInfo {
    pub fn pods(&self) -> &[Pod] {
        &self.pods
    }
}

/// Derived view grouping already-placed pods by host name
pub type NodeNameToInfo = BTreeMap<String, HostInfo>;

/// Pivot the pod list into a host-name-to-pods map. Pods without a node
/// name are not yet placed and are excluded.
pub fn map_pods_to_hosts(lister: &dyn PodLister) -> Result<NodeNameToInfo> {
    let mut map = NodeNameToInfo::new();
    for pod in lister.list(&Selector::everything())? {
        if pod.spec.node_name.is_empty() {
            continue;
        }
        map.entry(pod.spec.node_name.clone())
            .or_insert_with(HostInfo::default)
            .pods
            .push(pod);
    }
    Ok(map)
}

/// An immutable, owned copy of cluster state for one scheduling cycle.
///
/// Implements every lister/info trait the decision core consumes.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub services: Vec<Service>,
    pub persistent_volumes: Vec<PersistentVolume>,
    pub claims: Vec<PersistentVolumeClaim>,
}

impl NodeLister for ClusterSnapshot {
    fn list(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}

impl NodeInfo for ClusterSnapshot {
    fn get_node_info(&self, name: &str) -> Result<Node> {
        self.nodes
            .iter()
            .find(|n| n.name() == name)
            .cloned()
            .ok_or_else(|| SchedulerError::node_not_found(name))
    }
}

impl PodLister for ClusterSnapshot {
    fn list(&self, selector: &Selector) -> Result<Vec<Pod>> {
        Ok(self
            .pods
            .iter()
            .filter(|p| selector.matches(&p.metadata.labels))
            .cloned()
            .collect())
    }
}

impl ServiceLister for ClusterSnapshot {
    fn list(&self, selector: &Selector) -> Result<Vec<Service>> {
        Ok(self
            .services
            .iter()
            .filter(|s| selector.matches(&s.metadata.labels))
            .cloned()
            .collect())
    }

    fn get_pod_services(&self, pod: &Pod) -> Result<Vec<Service>> {
        Ok(self
            .services
            .iter()
            .filter(|s| {
                s.metadata.namespace == pod.metadata.namespace
                    && !s.spec.selector.is_empty()
                    && Selector::from_set(&s.spec.selector).matches(&pod.metadata.labels)
            })
            .cloned()
            .collect())
    }
}

impl PersistentVolumeInfo for ClusterSnapshot {
    fn get_persistent_volume_info(&self, name: &str) -> Result<PersistentVolume> {
        self.persistent_volumes
            .iter()
            .find(|pv| pv.metadata.name == name)
            .cloned()
            .ok_or_else(|| SchedulerError::volume_not_found(name))
    }
}

impl PersistentVolumeClaimInfo for ClusterSnapshot {
    fn get_persistent_volume_claim_info(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim> {
        self.claims
            .iter()
            .find(|c| c.metadata.namespace == namespace && c.metadata.name == name)
            .cloned()
            .ok_or_else(|| SchedulerError::claim_not_found(namespace, name))
    }
}
