//! Shared matching helpers for the affinity priorities.

use magnetar_core::{Node, Pod, PodAffinityTerm};
use tracing::warn;

/// Whether two nodes sit in the same topology under the given key.
///
/// An empty key means any two nodes share a topology; a non-empty key
/// requires both nodes to carry it with equal, non-empty values.
pub(crate) fn nodes_have_same_topology_key(
    node_a: &Node,
    node_b: &Node,
    topology_key: &str,
) -> bool {
    if topology_key.is_empty() {
        return true;
    }
    match (
        node_a.metadata.labels.get(topology_key),
        node_b.metadata.labels.get(topology_key),
    ) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// Whether `term`, owned by `owner`, selects `target`.
///
/// A term without a label selector selects no pods. `namespaces` of `None`
/// restricts to the owner's namespace; an empty list means all namespaces.
/// A term whose selector fails to construct is skipped.
pub(crate) fn term_selects_pod(owner: &Pod, target: &Pod, term: &PodAffinityTerm) -> bool {
    let selector = match &term.label_selector {
        None => return false,
        Some(wire) => match wire.to_selector() {
            Ok(selector) => selector,
            Err(e) => {
                warn!(
                    "Skipping affinity term with invalid selector on pod {}: {}",
                    owner.full_name(),
                    e
                );
                return false;
            }
        },
    };

    let in_namespace = match &term.namespaces {
        None => target.metadata.namespace == owner.metadata.namespace,
        Some(list) if list.is_empty() => true,
        Some(list) => list.iter().any(|ns| ns == &target.metadata.namespace),
    };

    in_namespace && selector.matches(&target.metadata.labels)
}
