//! The policy runner: composes predicates and weighted priorities into a
//! single ranked placement decision.

use crate::cache::{map_pods_to_hosts, ClusterSnapshot, NodeLister, NodeNameToInfo, StaticNodeInfo};
use crate::error::{Result, SchedulerError};
use crate::predicates::{default_predicates, FitPredicate};
use crate::priorities::{
    InterPodAffinityPriority, NodeAffinityPriority, PriorityFunction, TaintTolerationPriority,
};
use crate::types::{FailureExplanation, HostPriority, RankedNodes};
use futures_util::stream::{self, StreamExt};
use magnetar_core::{Node, Pod};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A priority function with its weight in the combined score
pub struct PriorityConfig {
    pub function: Arc<dyn PriorityFunction>,
    pub weight: i64,
}

impl PriorityConfig {
    pub fn new(function: Arc<dyn PriorityFunction>, weight: i64) -> Self {
        Self { function, weight }
    }
}

/// The enabled predicates (evaluated in order) and weighted priorities
/// for a scheduling cycle
pub struct Policy {
    pub predicates: Vec<Arc<dyn FitPredicate>>,
    pub priorities: Vec<PriorityConfig>,
}

impl Policy {
    pub fn new(predicates: Vec<Arc<dyn FitPredicate>>, priorities: Vec<PriorityConfig>) -> Self {
        Self {
            predicates,
            priorities,
        }
    }

    /// The always-on predicates plus the weight-1 priorities, all bound
    /// to the given snapshot. Parameterized entries (label presence,
    /// service affinity, volume zone) are added explicitly by the caller.
    pub fn with_defaults(snapshot: Arc<ClusterSnapshot>) -> Self {
        Self {
            predicates: default_predicates(snapshot.clone()),
            priorities: vec![
                PriorityConfig::new(Arc::new(NodeAffinityPriority), 1),
                PriorityConfig::new(Arc::new(TaintTolerationPriority), 1),
                PriorityConfig::new(Arc::new(InterPodAffinityPriority::new(snapshot)), 1),
            ],
        }
    }
}

/// Configuration for the scheduler
#[derive(Clone)]
pub struct SchedulerConfig {
    /// Width of the worker pool evaluating predicates across nodes.
    /// Results are identical at any width.
    pub parallelism: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { parallelism: 16 }
    }
}

enum Verdict {
    Feasible,
    Rejected(String),
}

struct NodeOutcome {
    verdict: Verdict,
}

fn evaluate_node(
    pod: &Pod,
    node: &Node,
    host_map: &NodeNameToInfo,
    predicates: &[Arc<dyn FitPredicate>],
    token: &CancellationToken,
) -> Result<NodeOutcome> {
    if token.is_cancelled() {
        return Err(SchedulerError::Cancelled);
    }

    let existing = host_map
        .get(node.name())
        .map(|h| h.pods())
        .unwrap_or(&[]);

    for predicate in predicates {
        match predicate.filter(pod, existing, node.name()) {
            Ok(result) if result.passed => continue,
            Ok(result) => {
                let reason = result
                    .reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| predicate.name().to_string());
                debug!(
                    "Node {} filtered out by {}: {}",
                    node.name(),
                    predicate.name(),
                    reason
                );
                return Ok(NodeOutcome {
                    verdict: Verdict::Rejected(reason),
                });
            }
            // The snapshot could not answer: skip the node this cycle
            // rather than failing it or the cycle
            Err(e) => {
                debug!(
                    "Node {} skipped, {} could not answer: {}",
                    node.name(),
                    predicate.name(),
                    e
                );
                return Ok(NodeOutcome {
                    verdict: Verdict::Rejected(format!("{}: {}", predicate.name(), e)),
                });
            }
        }
    }

    Ok(NodeOutcome {
        verdict: Verdict::Feasible,
    })
}

/// Pod scheduler: one `schedule` call is one scheduling cycle
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Decide placement for one pod against one snapshot.
    ///
    /// Predicates run across nodes with bounded parallelism; the first
    /// failing predicate's reason is the node's reject reason. Feasible
    /// nodes are then scored by each enabled priority, combined as
    /// Σ weightᵢ × scoreᵢ, and returned descending with ties broken by
    /// node name. An empty feasible set is an error carrying the per-node
    /// explanation.
    pub async fn schedule(
        &self,
        pod: &Pod,
        snapshot: Arc<ClusterSnapshot>,
        policy: &Policy,
        token: &CancellationToken,
    ) -> Result<RankedNodes> {
        let nodes = NodeLister::list(&*snapshot)?;
        let host_map = Arc::new(map_pods_to_hosts(&*snapshot)?);
        let pod = Arc::new(pod.clone());
        let predicates: Arc<Vec<Arc<dyn FitPredicate>>> = Arc::new(policy.predicates.clone());

        let width = self.config.parallelism.max(1);
        let outcomes: Vec<Result<NodeOutcome>> = stream::iter(nodes.clone().into_iter().map(
            |node| {
                let pod = pod.clone();
                let host_map = host_map.clone();
                let predicates = predicates.clone();
                let token = token.clone();
                async move {
                    tokio::task::spawn_blocking(move || {
                        evaluate_node(&pod, &node, &host_map, &predicates, &token)
                    })
                    .await
                    .map_err(|e| {
                        SchedulerError::internal_error(format!("predicate worker failed: {}", e))
                    })?
                }
            },
        ))
        .buffered(width)
        .collect()
        .await;

        let mut feasible: Vec<Node> = Vec::new();
        let mut explanation = FailureExplanation::new();
        for (node, outcome) in nodes.iter().zip(outcomes) {
            match outcome?.verdict {
                Verdict::Feasible => feasible.push(node.clone()),
                Verdict::Rejected(reason) => {
                    explanation.insert(node.name().to_string(), reason);
                }
            }
        }

        if feasible.is_empty() {
            return Err(SchedulerError::no_feasible_nodes(pod.full_name(), explanation));
        }

        info!(
            "Pod {} has {} feasible nodes",
            pod.full_name(),
            feasible.len()
        );

        // Priorities run in configured order; the combination is a sum,
        // so order never changes the result, but keeping it fixed keeps
        // debug traces reproducible
        let feasible_lister = StaticNodeInfo::new(feasible.clone());
        let mut combined: BTreeMap<String, i64> = feasible
            .iter()
            .map(|n| (n.name().to_string(), 0))
            .collect();

        for config in &policy.priorities {
            if token.is_cancelled() {
                return Err(SchedulerError::Cancelled);
            }
            let scores = config.function.score(&pod, &host_map, &feasible_lister)?;
            for host_priority in scores {
                if let Some(total) = combined.get_mut(&host_priority.host) {
                    *total += config.weight * host_priority.score;
                }
            }
        }

        let mut hosts: Vec<HostPriority> = combined
            .into_iter()
            .map(|(host, score)| HostPriority { host, score })
            .collect();
        hosts.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.host.cmp(&b.host)));

        Ok(RankedNodes { hosts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureReason, FilterResult};
    use magnetar_core::{Taint, TaintEffect};
    use std::collections::BTreeMap as Map;

    fn test_node(name: &str, labels: &[(&str, &str)]) -> Node {
        let mut node = Node::default();
        node.metadata.name = name.to_string();
        node.metadata.labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        node
    }

    fn test_pod(name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = name.to_string();
        pod.metadata.namespace = "default".to_string();
        pod
    }

    /// Scores every node from a fixed table, 0 when absent
    struct StaticScores {
        scores: Map<String, i64>,
    }

    impl PriorityFunction for StaticScores {
        fn score(
            &self,
            _pod: &Pod,
            _node_name_to_info: &NodeNameToInfo,
            node_lister: &dyn NodeLister,
        ) -> Result<Vec<HostPriority>> {
            Ok(node_lister
                .list()?
                .iter()
                .map(|n| {
                    HostPriority::new(n.name(), self.scores.get(n.name()).copied().unwrap_or(0))
                })
                .collect())
        }

        fn name(&self) -> &str {
            "StaticScores"
        }
    }

    /// A predicate whose snapshot lookup always fails for one node
    struct FailsFor {
        node: String,
    }

    impl FitPredicate for FailsFor {
        fn filter(&self, _pod: &Pod, _existing: &[Pod], node_name: &str) -> Result<FilterResult> {
            if node_name == self.node {
                Err(SchedulerError::node_not_found(node_name))
            } else {
                Ok(FilterResult::pass(node_name))
            }
        }

        fn name(&self) -> &str {
            "FailsFor"
        }
    }

    #[tokio::test]
    async fn test_default_policy_end_to_end() {
        let mut tainted = test_node("m2", &[]);
        tainted
            .set_taints(&[Taint {
                key: "dedicated".to_string(),
                value: "db".to_string(),
                effect: TaintEffect::NoSchedule,
            }])
            .unwrap();

        let snapshot = Arc::new(ClusterSnapshot {
            nodes: vec![test_node("m1", &[]), tainted],
            ..Default::default()
        });
        let policy = Policy::with_defaults(snapshot.clone());
        let scheduler = Scheduler::new(SchedulerConfig::default());

        let ranked = scheduler
            .schedule(
                &test_pod("p"),
                snapshot,
                &policy,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(ranked.hosts.len(), 1);
        assert_eq!(ranked.best().unwrap().host, "m1");
    }

    #[tokio::test]
    async fn test_weighted_combination_and_tie_break() {
        let snapshot = Arc::new(ClusterSnapshot {
            nodes: vec![
                test_node("m3", &[]),
                test_node("m1", &[]),
                test_node("m2", &[]),
            ],
            ..Default::default()
        });

        let policy = Policy::new(
            vec![],
            vec![
                PriorityConfig::new(
                    Arc::new(StaticScores {
                        scores: Map::from([("m1".to_string(), 5), ("m2".to_string(), 10)]),
                    }),
                    2,
                ),
                PriorityConfig::new(
                    Arc::new(StaticScores {
                        scores: Map::from([("m1".to_string(), 10), ("m3".to_string(), 20)]),
                    }),
                    1,
                ),
            ],
        );

        let scheduler = Scheduler::new(SchedulerConfig::default());
        let ranked = scheduler
            .schedule(
                &test_pod("p"),
                snapshot,
                &policy,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // m1: 2*5 + 1*10 = 20; m2: 2*10 = 20; m3: 1*20 = 20.
        // All tie at 20, so the order is name-ascending.
        let hosts: Vec<&str> = ranked.hosts.iter().map(|h| h.host.as_str()).collect();
        assert_eq!(hosts, vec!["m1", "m2", "m3"]);
        assert!(ranked.hosts.iter().all(|h| h.score == 20));
    }

    #[tokio::test]
    async fn test_no_feasible_nodes_explanation() {
        let snapshot = Arc::new(ClusterSnapshot {
            nodes: vec![test_node("m1", &[]), test_node("m2", &[])],
            ..Default::default()
        });
        let policy = Policy::with_defaults(snapshot.clone());
        let scheduler = Scheduler::new(SchedulerConfig::default());

        // The pod insists on a host that is not in the cluster
        let mut pod = test_pod("p");
        pod.spec.node_name = "m9".to_string();

        let err = scheduler
            .schedule(&pod, snapshot, &policy, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            SchedulerError::NoFeasibleNodes { explanation, .. } => {
                assert_eq!(
                    explanation.get("m1").unwrap(),
                    &FailureReason::HostMismatch.to_string()
                );
                assert_eq!(
                    explanation.get("m2").unwrap(),
                    &FailureReason::HostMismatch.to_string()
                );
            }
            other => panic!("expected NoFeasibleNodes, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_snapshot_miss_skips_node_not_cycle() {
        let snapshot = Arc::new(ClusterSnapshot {
            nodes: vec![test_node("m1", &[]), test_node("m2", &[])],
            ..Default::default()
        });
        let policy = Policy::new(
            vec![Arc::new(FailsFor {
                node: "m1".to_string(),
            })],
            vec![],
        );
        let scheduler = Scheduler::new(SchedulerConfig::default());

        let ranked = scheduler
            .schedule(
                &test_pod("p"),
                snapshot,
                &policy,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let hosts: Vec<&str> = ranked.hosts.iter().map(|h| h.host.as_str()).collect();
        assert_eq!(hosts, vec!["m2"]);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let snapshot = Arc::new(ClusterSnapshot {
            nodes: vec![test_node("m1", &[])],
            ..Default::default()
        });
        let policy = Policy::with_defaults(snapshot.clone());
        let scheduler = Scheduler::new(SchedulerConfig::default());

        let token = CancellationToken::new();
        token.cancel();

        let err = scheduler
            .schedule(&test_pod("p"), snapshot, &policy, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Cancelled));
    }

    // Feasibility is per-node: removing one node from the snapshot never
    // changes another node's verdict
    #[tokio::test]
    async fn test_predicate_monotonicity() {
        let full = Arc::new(ClusterSnapshot {
            nodes: vec![test_node("m1", &[]), test_node("m2", &[])],
            ..Default::default()
        });
        let reduced = Arc::new(ClusterSnapshot {
            nodes: vec![test_node("m1", &[])],
            ..Default::default()
        });
        let scheduler = Scheduler::new(SchedulerConfig::default());
        let pod = test_pod("p");

        let with_both = scheduler
            .schedule(
                &pod,
                full.clone(),
                &Policy::with_defaults(full),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let with_one = scheduler
            .schedule(
                &pod,
                reduced.clone(),
                &Policy::with_defaults(reduced),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(with_both.hosts.iter().any(|h| h.host == "m1"));
        assert!(with_one.hosts.iter().any(|h| h.host == "m1"));
    }

    #[tokio::test]
    async fn test_deterministic_across_widths() {
        let nodes: Vec<Node> = (0..20)
            .map(|i| test_node(&format!("node-{:02}", i), &[]))
            .collect();
        let snapshot = Arc::new(ClusterSnapshot {
            nodes,
            ..Default::default()
        });
        let policy = Policy::with_defaults(snapshot.clone());
        let pod = test_pod("p");

        let wide = Scheduler::new(SchedulerConfig { parallelism: 8 })
            .schedule(&pod, snapshot.clone(), &policy, &CancellationToken::new())
            .await
            .unwrap();
        let narrow = Scheduler::new(SchedulerConfig { parallelism: 1 })
            .schedule(&pod, snapshot, &policy, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(wide, narrow);
    }
}
