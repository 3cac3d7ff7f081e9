use crate::cache::{NodeLister, NodeNameToInfo};
use crate::error::Result;
use crate::priorities::{PriorityFunction, MAX_PRIORITY};
use crate::types::HostPriority;
use magnetar_core::Pod;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Scores nodes by the pod's soft node-affinity terms.
///
/// Each term adds its weight to every node its preference matches; the
/// node(s) with the highest sum are the most preferred. A pod without soft
/// terms scores every node 0.
pub struct NodeAffinityPriority;

impl PriorityFunction for NodeAffinityPriority {
    fn score(
        &self,
        pod: &Pod,
        _node_name_to_info: &NodeNameToInfo,
        node_lister: &dyn NodeLister,
    ) -> Result<Vec<HostPriority>> {
        let nodes = node_lister.list()?;

        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        let mut max_count = 0i64;

        let affinity = pod.affinity();
        let preferred = affinity
            .as_ref()
            .and_then(|a| a.node_affinity.as_ref())
            .and_then(|na| na.preferred.as_deref())
            .unwrap_or(&[]);

        for term in preferred {
            if term.weight == 0 {
                continue;
            }
            // An empty preference matches every node
            let selector = match term.preference.to_selector() {
                Ok(selector) => selector,
                Err(e) => {
                    warn!(
                        "Skipping soft node-affinity term on pod {}: {}",
                        pod.full_name(),
                        e
                    );
                    continue;
                }
            };

            for node in &nodes {
                if selector.matches(&node.metadata.labels) {
                    let count = counts.entry(node.name()).or_insert(0);
                    *count += term.weight;
                    max_count = max_count.max(*count);
                }
            }
        }

        let result = nodes
            .iter()
            .map(|node| {
                let count = counts.get(node.name()).copied().unwrap_or(0);
                let score = if max_count > 0 {
                    MAX_PRIORITY * count / max_count
                } else {
                    0
                };
                debug!(
                    "{} -> {}: NodeAffinityPriority, Score: ({})",
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
        "NodeAffinityPriority"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StaticNodeInfo;
    use magnetar_core::annotations::AFFINITY_ANNOTATION_KEY;
    use magnetar_core::Node;

    fn node_with(name: &str, labels: &[(&str, &str)]) -> Node {
        let mut node = Node::default();
        node.metadata.name = name.to_string();
        node.metadata.labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        node
    }

    fn pod_with_soft_terms(terms_json: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = "candidate".to_string();
        pod.metadata.annotations.insert(
            AFFINITY_ANNOTATION_KEY.to_string(),
            format!(
                r#"{{"nodeAffinity":{{"preferredDuringSchedulingIgnoredDuringExecution":{}}}}}"#,
                terms_json
            ),
        );
        pod
    }

    fn scores_by_host(result: Vec<HostPriority>) -> BTreeMap<String, i64> {
        result.into_iter().map(|hp| (hp.host, hp.score)).collect()
    }

    #[test]
    fn test_single_matching_term() {
        let lister = StaticNodeInfo::new(vec![
            node_with("m1", &[("foo", "bar")]),
            node_with("m2", &[("key", "value")]),
            node_with("m3", &[("az", "az1")]),
        ]);
        let pod = pod_with_soft_terms(
            r#"[{"weight":2,"preference":{"matchExpressions":[{"key":"foo","operator":"In","values":["bar"]}]}}]"#,
        );

        let result = NodeAffinityPriority
            .score(&pod, &NodeNameToInfo::new(), &lister)
            .unwrap();
        let scores = scores_by_host(result);

        assert_eq!(scores["m1"], 10);
        assert_eq!(scores["m2"], 0);
        assert_eq!(scores["m3"], 0);
    }

    #[test]
    fn test_weights_accumulate_across_terms() {
        let lister = StaticNodeInfo::new(vec![
            node_with("m1", &[("foo", "bar"), ("az", "az1")]),
            node_with("m2", &[("foo", "bar")]),
            node_with("m3", &[]),
        ]);
        let pod = pod_with_soft_terms(
            r#"[
                {"weight":5,"preference":{"matchExpressions":[{"key":"foo","operator":"In","values":["bar"]}]}},
                {"weight":3,"preference":{"matchExpressions":[{"key":"az","operator":"In","values":["az1"]}]}}
            ]"#,
        );

        let result = NodeAffinityPriority
            .score(&pod, &NodeNameToInfo::new(), &lister)
            .unwrap();
        let scores = scores_by_host(result);

        // m1 tallies 8, m2 tallies 5: floor(10*5/8) = 6
        assert_eq!(scores["m1"], 10);
        assert_eq!(scores["m2"], 6);
        assert_eq!(scores["m3"], 0);
    }

    #[test]
    fn test_no_soft_terms_scores_zero() {
        let lister = StaticNodeInfo::new(vec![node_with("m1", &[("foo", "bar")])]);
        let pod = Pod::default();

        let result = NodeAffinityPriority
            .score(&pod, &NodeNameToInfo::new(), &lister)
            .unwrap();
        assert_eq!(scores_by_host(result)["m1"], 0);
    }

    #[test]
    fn test_invalid_term_is_skipped() {
        let lister = StaticNodeInfo::new(vec![node_with("m1", &[("foo", "bar")])]);
        // In with no values cannot build a selector; the weight-2 term
        // still applies
        let pod = pod_with_soft_terms(
            r#"[
                {"weight":7,"preference":{"matchExpressions":[{"key":"foo","operator":"In"}]}},
                {"weight":2,"preference":{"matchExpressions":[{"key":"foo","operator":"Exists"}]}}
            ]"#,
        );

        let result = NodeAffinityPriority
            .score(&pod, &NodeNameToInfo::new(), &lister)
            .unwrap();
        assert_eq!(scores_by_host(result)["m1"], 10);
    }
}
