use crate::cache::{NodeLister, NodeNameToInfo};
use crate::error::Result;
use crate::priorities::{PriorityFunction, MAX_PRIORITY};
use crate::types::HostPriority;
use magnetar_core::{Pod, Taint, TaintEffect, Toleration};
use std::collections::BTreeMap;

// Count of the node's PreferNoSchedule taints not matched by any of the
// pod's PreferNoSchedule tolerations
fn count_intolerable_taints_prefer_no_schedule(
    taints: &[Taint],
    tolerations: &[Toleration],
) -> i64 {
    taints
        .iter()
        .filter(|taint| taint.effect == TaintEffect::PreferNoSchedule)
        .filter(|taint| !tolerations.iter().any(|t| t.tolerates(taint)))
        .count() as i64
}

/// Prefers nodes with fewer intolerable PreferNoSchedule taints.
///
/// Nodes with none score 10; the node with the most scores 0. Taints with
/// other effects are the predicate's business, not this ranker's.
pub struct TaintTolerationPriority;

impl PriorityFunction for TaintTolerationPriority {
    fn score(
        &self,
        pod: &Pod,
        _node_name_to_info: &NodeNameToInfo,
        node_lister: &dyn NodeLister,
    ) -> Result<Vec<HostPriority>> {
        let nodes = node_lister.list()?;

        let tolerations: Vec<Toleration> = pod
            .tolerations()
            .into_iter()
            .filter(|t| t.effect == TaintEffect::PreferNoSchedule)
            .collect();

        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        let mut max_count = 0i64;
        for node in &nodes {
            let count =
                count_intolerable_taints_prefer_no_schedule(&node.taints(), &tolerations);
            counts.insert(node.name(), count);
            max_count = max_count.max(count);
        }

        let result = nodes
            .iter()
            .map(|node| {
                let score = if max_count > 0 {
                    let count = counts.get(node.name()).copied().unwrap_or(0);
                    ((1.0 - count as f64 / max_count as f64) * MAX_PRIORITY as f64) as i64
                } else {
                    MAX_PRIORITY
                };
                HostPriority::new(node.name(), score)
            })
            .collect();

        Ok(result)
    }

    fn name(&self) -> &str {
        "TaintTolerationPriority"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StaticNodeInfo;
    use magnetar_core::annotations::TOLERATIONS_ANNOTATION_KEY;
    use magnetar_core::Node;

    fn node_with_prefer_taints(name: &str, taints: &[(&str, &str)]) -> Node {
        let mut node = Node::default();
        node.metadata.name = name.to_string();
        let taints: Vec<Taint> = taints
            .iter()
            .map(|(k, v)| Taint {
                key: k.to_string(),
                value: v.to_string(),
                effect: TaintEffect::PreferNoSchedule,
            })
            .collect();
        node.set_taints(&taints).unwrap();
        node
    }

    fn scores_by_host(result: Vec<HostPriority>) -> BTreeMap<String, i64> {
        result.into_iter().map(|hp| (hp.host, hp.score)).collect()
    }

    #[test]
    fn test_untainted_nodes_score_max() {
        let lister = StaticNodeInfo::new(vec![
            node_with_prefer_taints("m1", &[]),
            node_with_prefer_taints("m2", &[]),
        ]);

        let result = TaintTolerationPriority
            .score(&Pod::default(), &NodeNameToInfo::new(), &lister)
            .unwrap();
        let scores = scores_by_host(result);
        assert_eq!(scores["m1"], 10);
        assert_eq!(scores["m2"], 10);
    }

    #[test]
    fn test_most_tainted_node_scores_zero() {
        let lister = StaticNodeInfo::new(vec![
            node_with_prefer_taints("m1", &[]),
            node_with_prefer_taints("m2", &[("cpu-hungry", "yes")]),
            node_with_prefer_taints("m3", &[("cpu-hungry", "yes"), ("mem-hungry", "yes")]),
        ]);

        let result = TaintTolerationPriority
            .score(&Pod::default(), &NodeNameToInfo::new(), &lister)
            .unwrap();
        let scores = scores_by_host(result);
        assert_eq!(scores["m1"], 10);
        assert_eq!(scores["m2"], 5);
        assert_eq!(scores["m3"], 0);
    }

    #[test]
    fn test_tolerated_prefer_taints_do_not_count() {
        let lister = StaticNodeInfo::new(vec![
            node_with_prefer_taints("m1", &[("cpu-hungry", "yes")]),
            node_with_prefer_taints("m2", &[("mem-hungry", "yes")]),
        ]);

        let mut pod = Pod::default();
        pod.metadata.annotations.insert(
            TOLERATIONS_ANNOTATION_KEY.to_string(),
            r#"[{"key":"cpu-hungry","operator":"Exists","effect":"PreferNoSchedule"}]"#
                .to_string(),
        );

        let result = TaintTolerationPriority
            .score(&pod, &NodeNameToInfo::new(), &lister)
            .unwrap();
        let scores = scores_by_host(result);
        assert_eq!(scores["m1"], 10);
        assert_eq!(scores["m2"], 0);
    }

    #[test]
    fn test_hard_taints_are_ignored_by_the_ranker() {
        let mut hard_tainted = Node::default();
        hard_tainted.metadata.name = "m1".to_string();
        hard_tainted
            .set_taints(&[Taint {
                key: "dedicated".to_string(),
                value: "db".to_string(),
                effect: TaintEffect::NoSchedule,
            }])
            .unwrap();
        let lister = StaticNodeInfo::new(vec![hard_tainted]);

        let result = TaintTolerationPriority
            .score(&Pod::default(), &NodeNameToInfo::new(), &lister)
            .unwrap();
        assert_eq!(scores_by_host(result)["m1"], 10);
    }
}
