use crate::cache::{NodeInfo, NodeLister, NodeNameToInfo};
use crate::error::Result;
use crate::priorities::util::{nodes_have_same_topology_key, term_selects_pod};
use crate::priorities::{PriorityFunction, MAX_PRIORITY};
use crate::types::HostPriority;
use magnetar_core::{Affinity, Node, Pod};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Hard pod affinity is not symmetric, but every required term on a placed
/// pod implies a preference for keeping matching pods nearby. This is the
/// weight of that implicit preference.
pub const HARD_POD_AFFINITY_IMPLICIT_WEIGHT: i64 = 1;

/// Scores nodes by inter-pod affinity and anti-affinity.
///
/// For each candidate node the priority accumulates a signed total over
/// every placed pod: the candidate's own soft (anti-)affinity terms count
/// forward, and every placed pod's terms count symmetrically back onto the
/// candidate. Two pods are "near" each other when their nodes share a
/// topology under the term's topology key. Totals are rescaled to [0, 10]
/// at the end, which keeps anti-affinity pushing scores toward zero.
pub struct InterPodAffinityPriority {
    info: Arc<dyn NodeInfo>,
}

impl InterPodAffinityPriority {
    pub fn new(info: Arc<dyn NodeInfo>) -> Self {
        Self { info }
    }
}

// Signed contribution of one placed pod toward one candidate node
fn count_for_placed_pod(
    pod: &Pod,
    affinity: Option<&Affinity>,
    placed: &Pod,
    placed_affinity: Option<&Affinity>,
    placed_node: &Node,
    node: &Node,
) -> i64 {
    let mut total = 0i64;

    // Forward direction: the candidate's soft terms against the
    // placed pod
    if let Some(affinity) = affinity {
        if let Some(pod_affinity) = &affinity.pod_affinity {
            for weighted in pod_affinity.preferred_terms() {
                if term_selects_pod(pod, placed, &weighted.pod_affinity_term)
                    && nodes_have_same_topology_key(
                        placed_node,
                        node,
                        &weighted.pod_affinity_term.topology_key,
                    )
                {
                    total += weighted.weight;
                }
            }
        }
        if let Some(anti_affinity) = &affinity.pod_anti_affinity {
            for weighted in anti_affinity.preferred_terms() {
                if term_selects_pod(pod, placed, &weighted.pod_affinity_term)
                    && nodes_have_same_topology_key(
                        placed_node,
                        node,
                        &weighted.pod_affinity_term.topology_key,
                    )
                {
                    total -= weighted.weight;
                }
            }
        }
    }

    // Reverse direction: terms the placed pod carries, matched
    // against the candidate
    if let Some(placed_affinity) = placed_affinity {
        if let Some(pod_affinity) = &placed_affinity.pod_affinity {
            for term in pod_affinity.required_terms() {
                if term_selects_pod(placed, pod, term)
                    && nodes_have_same_topology_key(placed_node, node, &term.topology_key)
                {
                    total += HARD_POD_AFFINITY_IMPLICIT_WEIGHT;
                }
            }
            for weighted in pod_affinity.preferred_terms() {
                if term_selects_pod(placed, pod, &weighted.pod_affinity_term)
                    && nodes_have_same_topology_key(
                        placed_node,
                        node,
                        &weighted.pod_affinity_term.topology_key,
                    )
                {
                    total += weighted.weight;
                }
            }
        }
        if let Some(anti_affinity) = &placed_affinity.pod_anti_affinity {
            for weighted in anti_affinity.preferred_terms() {
                if term_selects_pod(placed, pod, &weighted.pod_affinity_term)
                    && nodes_have_same_topology_key(
                        placed_node,
                        node,
                        &weighted.pod_affinity_term.topology_key,
                    )
                {
                    total -= weighted.weight;
                }
            }
        }
    }

    total
}

impl PriorityFunction for InterPodAffinityPriority {
    fn score(
        &self,
        pod: &Pod,
        node_name_to_info: &NodeNameToInfo,
        node_lister: &dyn NodeLister,
    ) -> Result<Vec<HostPriority>> {
        let nodes = node_lister.list()?;

        // Resolve hosts and parse affinity annotations once, not per
        // candidate node
        let affinity = pod.affinity();
        let mut placed_entries = Vec::new();
        for (host, host_info) in node_name_to_info {
            let placed_node = self.info.get_node_info(host)?;
            for placed in host_info.pods() {
                placed_entries.push((placed, placed.affinity(), placed_node.clone()));
            }
        }

        let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
        for node in &nodes {
            let mut total = 0i64;
            for (placed, placed_affinity, placed_node) in &placed_entries {
                total += count_for_placed_pod(
                    pod,
                    affinity.as_ref(),
                    placed,
                    placed_affinity.as_ref(),
                    placed_node,
                    node,
                );
            }
            totals.insert(node.name(), total);
        }

        let max_total = totals.values().copied().max().unwrap_or(0);
        let min_total = totals.values().copied().min().unwrap_or(0);

        let result = nodes
            .iter()
            .map(|node| {
                let score = if max_total > min_total {
                    let total = totals.get(node.name()).copied().unwrap_or(0);
                    MAX_PRIORITY * (total - min_total) / (max_total - min_total)
                } else {
                    0
                };
                debug!(
                    "{} -> {}: InterPodAffinityPriority, Score: ({})",
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
        "InterPodAffinityPriority"
    }
}
