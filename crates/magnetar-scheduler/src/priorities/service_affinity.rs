use crate::cache::{NodeLister, NodeNameToInfo};
use crate::error::Result;
use crate::priorities::{PriorityFunction, MAX_PRIORITY};
use crate::types::HostPriority;
use magnetar_core::Pod;
use std::collections::BTreeMap;
use tracing::debug;

/// Legacy ranker affiliating a pod with existing pods whose labels match
/// its affinity selector.
///
/// Every (key, value) entry of the pod's `affinity_selector` satisfied by
/// a same-namespace placed pod's label increments that pod's host. The
/// more matching pods a host runs, the higher it scores; hosts with no
/// matches score 0.
pub struct ServiceAffinityPriority;

impl PriorityFunction for ServiceAffinityPriority {
    fn score(
        &self,
        pod: &Pod,
        node_name_to_info: &NodeNameToInfo,
        node_lister: &dyn NodeLister,
    ) -> Result<Vec<HostPriority>> {
        let affinity_selector = &pod.spec.affinity_selector;

        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        let mut max_count = 0i64;
        for (host, host_info) in node_name_to_info {
            for placed in host_info.pods() {
                // Only match pods in the same namespace
                if placed.metadata.namespace != pod.metadata.namespace {
                    continue;
                }
                // Every matched label adds to the host's tally
                for (key, value) in &placed.metadata.labels {
                    if affinity_selector.get(key) == Some(value) {
                        let count = counts.entry(host.as_str()).or_insert(0);
                        *count += 1;
                        max_count = max_count.max(*count);
                    }
                }
            }
        }

        let nodes = node_lister.list()?;
        let result = nodes
            .iter()
            .map(|node| {
                let score = if max_count > 0 {
                    let count = counts.get(node.name()).copied().unwrap_or(0);
                    MAX_PRIORITY * count / max_count
                } else {
                    0
                };
                debug!(
                    "{} -> {}: ServiceAffinityPriority, Score: ({})",
                    pod.name(),
                    node.name(),
                    score
                );
                HostPriority::new(node.name(), score)
            })
            .collect();

        Ok(result)
    }

    fn name(&self) -> &str {
        "ServiceAffinityPriority"
    }
}
