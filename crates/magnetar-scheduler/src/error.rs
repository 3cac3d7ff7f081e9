// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use crate::types::FailureExplanation;
use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// Node missing from the snapshot
    #[error("Node not found in snapshot: {node}")]
    #[diagnostic(
        code(scheduler::node_not_found),
        help("The node may have been removed between snapshot and evaluation; retry the cycle")
    )]
    NodeNotFound { node: String },

    /// Persistent volume missing from the snapshot
    #[error("PersistentVolume not found: {name}")]
    #[diagnostic(
        code(scheduler::volume_not_found),
        help("Check that the volume bound to the claim still exists")
    )]
    VolumeNotFound { name: String },

    /// Persistent volume claim missing from the snapshot
    #[error("PersistentVolumeClaim not found: {namespace}/{name}")]
    #[diagnostic(
        code(scheduler::claim_not_found),
        help("The pod references a claim that does not exist in its namespace")
    )]
    ClaimNotFound { namespace: String, name: String },

    /// Persistent volume claim exists but is not bound to a volume
    #[error("PersistentVolumeClaim is not bound: {namespace}/{name}")]
    #[diagnostic(
        code(scheduler::claim_not_bound),
        help("Wait for the claim to bind before scheduling pods that use it")
    )]
    ClaimNotBound { namespace: String, name: String },

    /// No node survived the predicate phase
    #[error("No feasible nodes found for pod {pod_name}")]
    #[diagnostic(
        code(scheduler::no_feasible_nodes),
        help("Check node resources, taints, and pod requirements; per-node reasons are attached")
    )]
    NoFeasibleNodes {
        pod_name: String,
        explanation: FailureExplanation,
    },

    /// The caller cancelled the scheduling cycle
    #[error("Scheduling cycle cancelled")]
    #[diagnostic(
        code(scheduler::cancelled),
        help("Partial results were discarded; the caller is responsible for retry")
    )]
    Cancelled,

    /// Core error
    #[error("Core error: {0}")]
    #[diagnostic(code(scheduler::core_error), help("This is an internal error"))]
    CoreError(#[from] magnetar_core::CoreError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError { message: String },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create a NodeNotFound error
    pub fn node_not_found(node: impl Into<String>) -> Self {
        Self::NodeNotFound { node: node.into() }
    }

    /// Create a VolumeNotFound error
    pub fn volume_not_found(name: impl Into<String>) -> Self {
        Self::VolumeNotFound { name: name.into() }
    }

    /// Create a ClaimNotFound error
    pub fn claim_not_found(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ClaimNotFound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a ClaimNotBound error
    pub fn claim_not_bound(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ClaimNotBound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a NoFeasibleNodes error
    pub fn no_feasible_nodes(pod_name: impl Into<String>, explanation: FailureExplanation) -> Self {
        Self::NoFeasibleNodes {
            pod_name: pod_name.into(),
            explanation,
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
