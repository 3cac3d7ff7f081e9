//! Magnetar Scheduler - the placement decision core
//!
//! This crate provides:
//! - Read-only cluster snapshot views (listers, pods-by-host map)
//! - Fit predicates (hard filters over nodes)
//! - Priority functions (soft rankers in [0, 10])
//! - The policy runner combining both into a ranked node list

pub mod cache;
pub mod error;
pub mod predicates;
pub mod priorities;
pub mod runner;
pub mod types;

// Re-export commonly used types
pub use cache::{
    map_pods_to_hosts, ClusterSnapshot, HostInfo, NodeInfo, NodeLister, NodeNameToInfo,
    PersistentVolumeClaimInfo, PersistentVolumeInfo, PodLister, ServiceLister, StaticNodeInfo,
};
pub use error::{Result, SchedulerError};
pub use predicates::FitPredicate;
pub use priorities::{PriorityFunction, MAX_PRIORITY};
pub use runner::{Policy, PriorityConfig, Scheduler, SchedulerConfig};
pub use types::{FailureExplanation, FailureReason, FilterResult, HostPriority, RankedNodes};
