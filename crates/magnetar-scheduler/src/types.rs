use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a predicate rejected a node.
///
/// Carried in-band inside [`FilterResult`] so that concurrent evaluations
/// never share mutable failure state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    PodExceedsMaxPodNumber,
    PodExceedsFreeCPU,
    PodExceedsFreeMemory,
    HostMismatch,
    HostPortConflict,
    NodeSelectorMismatch,
    NodeLabelPresenceViolated,
    TaintsNotTolerated,
    DiskConflict,
    VolumeZoneConflict { label: String },
    ServiceAffinityViolated,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::PodExceedsMaxPodNumber => write!(f, "PodExceedsMaxPodNumber"),
            FailureReason::PodExceedsFreeCPU => write!(f, "PodExceedsFreeCPU"),
            FailureReason::PodExceedsFreeMemory => write!(f, "PodExceedsFreeMemory"),
            FailureReason::HostMismatch => write!(f, "HostMismatch"),
            FailureReason::HostPortConflict => write!(f, "HostPortConflict"),
            FailureReason::NodeSelectorMismatch => write!(f, "NodeSelectorMismatch"),
            FailureReason::NodeLabelPresenceViolated => write!(f, "NodeLabelPresenceViolated"),
            FailureReason::TaintsNotTolerated => write!(f, "TaintsNotTolerated"),
            FailureReason::DiskConflict => write!(f, "DiskConflict"),
            FailureReason::VolumeZoneConflict { label } => {
                write!(f, "VolumeZoneConflict({})", label)
            }
            FailureReason::ServiceAffinityViolated => write!(f, "ServiceAffinityViolated"),
        }
    }
}

/// Result of filtering a node
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// Node name
    pub node_name: String,
    /// Whether the node passed the filter
    pub passed: bool,
    /// Reason for failure (if any)
    pub reason: Option<FailureReason>,
}

impl FilterResult {
    /// Create a passing filter result
    pub fn pass(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            passed: true,
            reason: None,
        }
    }

    /// Create a failing filter result
    pub fn fail(node_name: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            node_name: node_name.into(),
            passed: false,
            reason: Some(reason),
        }
    }
}

/// A node's score from a single priority function, in [0, 10]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPriority {
    pub host: String,
    pub score: i64,
}

impl HostPriority {
    pub fn new(host: impl Into<String>, score: i64) -> Self {
        Self {
            host: host.into(),
            score,
        }
    }
}

/// Per-node explanation of why a scheduling cycle found no feasible node:
/// node name mapped to the first rejection (or skip) reason
pub type FailureExplanation = BTreeMap<String, String>;

/// The ranked feasible nodes for one scheduling cycle, combined scores
/// descending, ties broken by host name ascending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedNodes {
    pub hosts: Vec<HostPriority>,
}

impl RankedNodes {
    /// The winning host, if any
    pub fn best(&self) -> Option<&HostPriority> {
        self.hosts.first()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
