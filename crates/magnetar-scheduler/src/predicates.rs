//! Hard filters deciding node feasibility.
//!
//! Each predicate answers "can this pod run on that node" with an in-band
//! [`FilterResult`]; an `Err` means the snapshot could not answer and the
//! runner skips the node for this cycle instead of failing it.

use crate::cache::{NodeInfo, PersistentVolumeClaimInfo, PersistentVolumeInfo, PodLister, ServiceLister};
use crate::error::{Result, SchedulerError};
use crate::types::{FailureReason, FilterResult};
use magnetar_core::{
    taints::tolerates_taints, LabelMap, Node, Pod, Selector, Volume, VolumeSource,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Zone label consulted by the volume zone predicate
pub const ZONE_LABEL: &str = "failure-domain.beta.kubernetes.io/zone";
/// Region label consulted by the volume zone predicate
pub const REGION_LABEL: &str = "failure-domain.beta.kubernetes.io/region";

/// Hard filter trait: must pass for a node to be feasible
pub trait FitPredicate: Send + Sync {
    /// Filter a node for the given pod
    fn filter(&self, pod: &Pod, existing_pods: &[Pod], node_name: &str) -> Result<FilterResult>;

    /// Name of the predicate
    fn name(&self) -> &str;
}

/// Accepts any node when the pod has no host assignment, otherwise only
/// the assigned host
pub struct PodFitsHost;

impl FitPredicate for PodFitsHost {
    fn filter(&self, pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        if pod.spec.node_name.is_empty() || pod.spec.node_name == node_name {
            Ok(FilterResult::pass(node_name))
        } else {
            Ok(FilterResult::fail(node_name, FailureReason::HostMismatch))
        }
    }

    fn name(&self) -> &str {
        "PodFitsHost"
    }
}

fn used_host_ports(pods: &[Pod]) -> BTreeSet<u16> {
    let mut ports = BTreeSet::new();
    for pod in pods {
        for container in &pod.spec.containers {
            for port in &container.ports {
                if port.host_port != 0 {
                    ports.insert(port.host_port);
                }
            }
        }
    }
    ports
}

/// Rejects the node when a non-zero host port of the candidate is already
/// taken by a placed pod. Port 0 means unspecified and never conflicts.
pub struct PodFitsHostPorts;

impl FitPredicate for PodFitsHostPorts {
    fn filter(&self, pod: &Pod, existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        let existing_ports = used_host_ports(existing_pods);
        let wanted_ports = used_host_ports(std::slice::from_ref(pod));

        for port in wanted_ports {
            if existing_ports.contains(&port) {
                debug!(
                    "Host port {} for pod {} already in use on node {}",
                    port,
                    pod.full_name(),
                    node_name
                );
                return Ok(FilterResult::fail(node_name, FailureReason::HostPortConflict));
            }
        }
        Ok(FilterResult::pass(node_name))
    }

    fn name(&self) -> &str {
        "PodFitsHostPorts"
    }
}

/// Filter for pod resource requirements: pod count ceiling first, then
/// requested CPU and memory against capacity. Calculates fit based on
/// requested, rather than used, resources.
pub struct PodFitsResources {
    info: Arc<dyn NodeInfo>,
}

impl PodFitsResources {
    pub fn new(info: Arc<dyn NodeInfo>) -> Self {
        Self { info }
    }
}

impl FitPredicate for PodFitsResources {
    fn filter(&self, pod: &Pod, existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        let node = self.info.get_node_info(node_name)?;
        let capacity = node.capacity();

        if capacity.pods > 0 && existing_pods.len() as i64 + 1 > capacity.pods {
            debug!(
                "Cannot schedule pod {}: node {} is full, running {} out of {} pods",
                pod.full_name(),
                node_name,
                existing_pods.len(),
                capacity.pods
            );
            return Ok(FilterResult::fail(
                node_name,
                FailureReason::PodExceedsMaxPodNumber,
            ));
        }

        let request = pod.resource_request();
        if request.cpu_millicores == 0 && request.memory_bytes == 0 {
            return Ok(FilterResult::pass(node_name));
        }

        // Walk placed pods then the candidate, admitting each against the
        // capacity left by the previously admitted ones. A capacity of 0
        // means unlimited.
        let mut cpu_requested = 0i64;
        let mut memory_requested = 0i64;
        let mut exceeds_cpu = false;
        let mut exceeds_memory = false;

        for p in existing_pods.iter().chain(std::iter::once(pod)) {
            let r = p.resource_request();
            let fits_cpu = capacity.cpu_millicores == 0
                || capacity.cpu_millicores - cpu_requested >= r.cpu_millicores;
            let fits_memory = capacity.memory_bytes == 0
                || capacity.memory_bytes - memory_requested >= r.memory_bytes;

            if !fits_cpu {
                exceeds_cpu = true;
                continue;
            }
            if !fits_memory {
                exceeds_memory = true;
                continue;
            }
            cpu_requested += r.cpu_millicores;
            memory_requested += r.memory_bytes;
        }

        if exceeds_cpu {
            debug!(
                "Cannot schedule pod {}: node {} does not have sufficient CPU",
                pod.full_name(),
                node_name
            );
            return Ok(FilterResult::fail(node_name, FailureReason::PodExceedsFreeCPU));
        }
        if exceeds_memory {
            debug!(
                "Cannot schedule pod {}: node {} does not have sufficient memory",
                pod.full_name(),
                node_name
            );
            return Ok(FilterResult::fail(
                node_name,
                FailureReason::PodExceedsFreeMemory,
            ));
        }
        Ok(FilterResult::pass(node_name))
    }

    fn name(&self) -> &str {
        "PodFitsResources"
    }
}

/// True when the pod's node-selector (an equality map) is a subset of the
/// node's labels
pub fn pod_matches_node_labels(pod: &Pod, node: &Node) -> bool {
    if pod.spec.node_selector.is_empty() {
        return true;
    }
    Selector::from_set(&pod.spec.node_selector).matches(&node.metadata.labels)
}

/// Filter for the pod's node selector
pub struct NodeSelectorMatches {
    info: Arc<dyn NodeInfo>,
}

impl NodeSelectorMatches {
    pub fn new(info: Arc<dyn NodeInfo>) -> Self {
        Self { info }
    }
}

impl FitPredicate for NodeSelectorMatches {
    fn filter(&self, pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        let node = self.info.get_node_info(node_name)?;
        if pod_matches_node_labels(pod, &node) {
            Ok(FilterResult::pass(node_name))
        } else {
            Ok(FilterResult::fail(
                node_name,
                FailureReason::NodeSelectorMismatch,
            ))
        }
    }

    fn name(&self) -> &str {
        "NodeSelectorMatches"
    }
}

/// Checks whether the configured label keys are present on (or absent
/// from) the node, regardless of value.
///
/// With `presence: true` every listed key must exist on the node; with
/// `presence: false` none may. Useful for steering onto known
/// regions/zones/racks, or away from nodes marked e.g. "retiring".
pub struct NodeLabelPresence {
    info: Arc<dyn NodeInfo>,
    labels: Vec<String>,
    presence: bool,
}

impl NodeLabelPresence {
    pub fn new(info: Arc<dyn NodeInfo>, labels: Vec<String>, presence: bool) -> Self {
        Self {
            info,
            labels,
            presence,
        }
    }
}

impl FitPredicate for NodeLabelPresence {
    fn filter(&self, _pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        let node = self.info.get_node_info(node_name)?;
        for label in &self.labels {
            let exists = node.metadata.labels.contains_key(label);
            if exists != self.presence {
                return Ok(FilterResult::fail(
                    node_name,
                    FailureReason::NodeLabelPresenceViolated,
                ));
            }
        }
        Ok(FilterResult::pass(node_name))
    }

    fn name(&self) -> &str {
        "NodeLabelPresence"
    }
}

/// Matches the pod's tolerations against the node's taints. Every taint
/// whose effect blocks scheduling must be tolerated; PreferNoSchedule
/// taints are left to the taint toleration priority.
pub struct PodToleratesNodeTaints {
    info: Arc<dyn NodeInfo>,
}

impl PodToleratesNodeTaints {
    pub fn new(info: Arc<dyn NodeInfo>) -> Self {
        Self { info }
    }
}

impl FitPredicate for PodToleratesNodeTaints {
    fn filter(&self, pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        let node = self.info.get_node_info(node_name)?;
        if tolerates_taints(&pod.tolerations(), &node.taints()) {
            Ok(FilterResult::pass(node_name))
        } else {
            Ok(FilterResult::fail(
                node_name,
                FailureReason::TaintsNotTolerated,
            ))
        }
    }

    fn name(&self) -> &str {
        "PodToleratesNodeTaints"
    }
}

// search two monitor sets and report whether they share an element
fn have_common_monitor(a: &[String], b: &[String]) -> bool {
    a.iter().any(|m| b.iter().any(|other| m == other))
}

fn is_volume_conflict(volume: &Volume, pod: &Pod) -> bool {
    match &volume.source {
        VolumeSource::GcePersistentDisk { pd_name, read_only } => {
            pod.spec.volumes.iter().any(|v| match &v.source {
                VolumeSource::GcePersistentDisk {
                    pd_name: existing_name,
                    read_only: existing_read_only,
                } => existing_name == pd_name && !(*read_only && *existing_read_only),
                _ => false,
            })
        }
        VolumeSource::AwsElasticBlockStore { volume_id } => {
            pod.spec.volumes.iter().any(|v| match &v.source {
                VolumeSource::AwsElasticBlockStore {
                    volume_id: existing_id,
                } => existing_id == volume_id,
                _ => false,
            })
        }
        VolumeSource::RbdImage {
            monitors,
            pool,
            image,
        } => pod.spec.volumes.iter().any(|v| match &v.source {
            VolumeSource::RbdImage {
                monitors: existing_monitors,
                pool: existing_pool,
                image: existing_image,
            } => {
                existing_pool == pool
                    && existing_image == image
                    && have_common_monitor(monitors, existing_monitors)
            }
            _ => false,
        }),
        VolumeSource::PersistentVolumeClaim { .. } => false,
        VolumeSource::Other => false,
    }
}

/// Evaluates whether a pod can fit due to the volumes it requests and
/// those already mounted on the node:
/// - GCE PD allows multiple mounts as long as they're all read-only
/// - AWS EBS forbids any two pods mounting the same volume ID
/// - Ceph RBD forbids two pods sharing at least one monitor with matching
///   pool and image
pub struct NoDiskConflict;

impl FitPredicate for NoDiskConflict {
    fn filter(&self, pod: &Pod, existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        for volume in &pod.spec.volumes {
            for existing in existing_pods {
                if is_volume_conflict(volume, existing) {
                    return Ok(FilterResult::fail(node_name, FailureReason::DiskConflict));
                }
            }
        }
        Ok(FilterResult::pass(node_name))
    }

    fn name(&self) -> &str {
        "NoDiskConflict"
    }
}

/// Evaluates whether the zone constraints of the pod's persistent volumes
/// allow the node.
///
/// Any zone/region label on a bound volume must match the node's value.
/// The node may carry more zone labels than the volume; a node with no
/// zone labels accepts everything (the fast path for unzoned clusters).
/// Only claims are supported; the labels are read from the bound volume.
pub struct VolumeZone {
    node_info: Arc<dyn NodeInfo>,
    pv_info: Arc<dyn PersistentVolumeInfo>,
    pvc_info: Arc<dyn PersistentVolumeClaimInfo>,
}

impl VolumeZone {
    pub fn new(
        node_info: Arc<dyn NodeInfo>,
        pv_info: Arc<dyn PersistentVolumeInfo>,
        pvc_info: Arc<dyn PersistentVolumeClaimInfo>,
    ) -> Self {
        Self {
            node_info,
            pv_info,
            pvc_info,
        }
    }
}

impl FitPredicate for VolumeZone {
    fn filter(&self, pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        let node = self.node_info.get_node_info(node_name)?;

        let mut node_constraints = LabelMap::new();
        for (key, value) in &node.metadata.labels {
            if key != ZONE_LABEL && key != REGION_LABEL {
                continue;
            }
            node_constraints.insert(key.clone(), value.clone());
        }

        if node_constraints.is_empty() {
            return Ok(FilterResult::pass(node_name));
        }

        let namespace = pod.namespace();
        for volume in &pod.spec.volumes {
            let claim_name = match &volume.source {
                VolumeSource::PersistentVolumeClaim { claim_name } => claim_name,
                _ => continue,
            };
            if claim_name.is_empty() {
                return Err(SchedulerError::internal_error(format!(
                    "PersistentVolumeClaim in pod {} has no name",
                    pod.full_name()
                )));
            }

            let claim = self
                .pvc_info
                .get_persistent_volume_claim_info(namespace, claim_name)?;
            if claim.spec.volume_name.is_empty() {
                return Err(SchedulerError::claim_not_bound(namespace, claim_name));
            }

            let pv = self
                .pv_info
                .get_persistent_volume_info(&claim.spec.volume_name)?;

            for (key, value) in &pv.metadata.labels {
                if key != ZONE_LABEL && key != REGION_LABEL {
                    continue;
                }
                if node_constraints.get(key) != Some(value) {
                    debug!(
                        "Won't schedule pod {} onto node {} due to volume {} (mismatch on {})",
                        pod.full_name(),
                        node_name,
                        claim.spec.volume_name,
                        key
                    );
                    return Ok(FilterResult::fail(
                        node_name,
                        FailureReason::VolumeZoneConflict { label: key.clone() },
                    ));
                }
            }
        }

        Ok(FilterResult::pass(node_name))
    }

    fn name(&self) -> &str {
        "VolumeZone"
    }
}

/// Ensures that pods of a service converge onto the same slice of the
/// label space.
///
/// An implicit selector requiring value V for label L is added to the pod
/// if L is in the configured label list, the pod's node-selector does not
/// already pin L, and some peer pod of the same service is already placed
/// on a node with value V for L.
pub struct ServiceAffinityFit {
    pod_lister: Arc<dyn PodLister>,
    service_lister: Arc<dyn ServiceLister>,
    node_info: Arc<dyn NodeInfo>,
    labels: Vec<String>,
}

impl ServiceAffinityFit {
    pub fn new(
        pod_lister: Arc<dyn PodLister>,
        service_lister: Arc<dyn ServiceLister>,
        node_info: Arc<dyn NodeInfo>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            pod_lister,
            service_lister,
            node_info,
            labels,
        }
    }
}

impl FitPredicate for ServiceAffinityFit {
    fn filter(&self, pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> Result<FilterResult> {
        let mut affinity_labels = LabelMap::new();
        let mut labels_exist = true;
        for label in &self.labels {
            match pod.spec.node_selector.get(label) {
                Some(value) => {
                    affinity_labels.insert(label.clone(), value.clone());
                }
                None => labels_exist = false,
            }
        }

        // Look at peer pods of the first service selecting this pod for
        // any label the pod does not pin itself
        if !labels_exist {
            if let Ok(services) = self.service_lister.get_pod_services(pod) {
                if let Some(service) = services.first() {
                    let selector = Selector::from_set(&service.spec.selector);
                    let service_pods = self.pod_lister.list(&selector)?;
                    let peer = service_pods
                        .iter()
                        .find(|p| p.metadata.namespace == pod.metadata.namespace);
                    if let Some(peer) = peer {
                        let peer_node = self.node_info.get_node_info(&peer.spec.node_name)?;
                        for label in &self.labels {
                            if affinity_labels.contains_key(label) {
                                continue;
                            }
                            if let Some(value) = peer_node.metadata.labels.get(label) {
                                affinity_labels.insert(label.clone(), value.clone());
                            }
                        }
                    }
                }
            }
        }

        // No placed peers: every node is acceptable
        let affinity_selector = if affinity_labels.is_empty() {
            Selector::everything()
        } else {
            Selector::from_set(&affinity_labels)
        };

        let node = self.node_info.get_node_info(node_name)?;
        if affinity_selector.matches(&node.metadata.labels) {
            Ok(FilterResult::pass(node_name))
        } else {
            Ok(FilterResult::fail(
                node_name,
                FailureReason::ServiceAffinityViolated,
            ))
        }
    }

    fn name(&self) -> &str {
        "ServiceAffinityFit"
    }
}

/// The always-on predicates, in evaluation order
pub fn default_predicates(info: Arc<dyn NodeInfo>) -> Vec<Arc<dyn FitPredicate>> {
    vec![
        Arc::new(PodFitsHost),
        Arc::new(PodFitsHostPorts),
        Arc::new(PodFitsResources::new(info.clone())),
        Arc::new(NoDiskConflict),
        Arc::new(NodeSelectorMatches::new(info.clone())),
        Arc::new(PodToleratesNodeTaints::new(info)),
    ]
}
