//! Soft rankers scoring feasible nodes.
//!
//! Every priority emits one score per node in [0, `MAX_PRIORITY`]; the
//! runner rescales nothing further, it only applies the configured weights
//! and sums. Normalization happens at each function's boundary so signed
//! intermediates (anti-affinity) survive accumulation.

pub mod interpod_affinity;
pub mod node_affinity;
pub mod service_affinity;
pub mod taint_toleration;
pub(crate) mod util;

pub use interpod_affinity::{InterPodAffinityPriority, HARD_POD_AFFINITY_IMPLICIT_WEIGHT};
pub use node_affinity::NodeAffinityPriority;
pub use service_affinity::ServiceAffinityPriority;
pub use taint_toleration::TaintTolerationPriority;

use crate::cache::{NodeLister, NodeNameToInfo};
use crate::error::Result;
use crate::types::HostPriority;
use magnetar_core::Pod;

/// The maximum score a priority may give to a node
pub const MAX_PRIORITY: i64 = 10;

/// Soft ranker trait: emits a score in [0, 10] per node
pub trait PriorityFunction: Send + Sync {
    /// Score every node the lister returns for the given pod
    fn score(
        &self,
        pod: &Pod,
        node_name_to_info: &NodeNameToInfo,
        node_lister: &dyn NodeLister,
    ) -> Result<Vec<HostPriority>>;

    /// Name of the priority function
    fn name(&self) -> &str;
}
