//! Codecs for the scheduler annotations.
//!
//! Affinity, taints, and tolerations are persisted as JSON inside object
//! annotations. The strict accessors return an error for malformed JSON
//! (used by tooling that writes the annotations); the lenient accessors on
//! [`Pod`] and [`Node`] degrade to "absent" with a warning, which is the
//! behavior scheduling code wants.

use crate::affinity::Affinity;
use crate::error::{CoreError, Result};
use crate::resources::{Node, Pod};
use crate::taints::{Taint, Toleration};
use std::collections::BTreeMap;
use tracing::warn;

/// Annotation holding the pod's affinity document
pub const AFFINITY_ANNOTATION_KEY: &str = "scheduler.alpha.kubernetes.io/affinity";
/// Annotation holding the node's taint list
pub const TAINTS_ANNOTATION_KEY: &str = "scheduler.alpha.kubernetes.io/taints";
/// Annotation holding the pod's toleration list
pub const TOLERATIONS_ANNOTATION_KEY: &str = "scheduler.alpha.kubernetes.io/tolerations";

fn parse_annotation<T: serde::de::DeserializeOwned>(
    annotations: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>> {
    match annotations.get(key) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| CoreError::malformed_annotation(key, e.to_string())),
    }
}

/// Parse the affinity annotation, or `None` when absent
pub fn affinity_from_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<Option<Affinity>> {
    parse_annotation(annotations, AFFINITY_ANNOTATION_KEY)
}

/// Parse the taints annotation, or an empty list when absent
pub fn taints_from_annotations(annotations: &BTreeMap<String, String>) -> Result<Vec<Taint>> {
    Ok(parse_annotation(annotations, TAINTS_ANNOTATION_KEY)?.unwrap_or_default())
}

/// Parse the tolerations annotation, or an empty list when absent
pub fn tolerations_from_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<Vec<Toleration>> {
    Ok(parse_annotation(annotations, TOLERATIONS_ANNOTATION_KEY)?.unwrap_or_default())
}

impl Pod {
    /// The pod's affinity, if any. Malformed annotations degrade to `None`.
    pub fn affinity(&self) -> Option<Affinity> {
        match affinity_from_annotations(&self.metadata.annotations) {
            Ok(affinity) => affinity,
            Err(e) => {
                warn!("Ignoring affinity annotation on pod {}: {}", self.full_name(), e);
                None
            }
        }
    }

    /// The pod's tolerations. Malformed annotations degrade to empty.
    pub fn tolerations(&self) -> Vec<Toleration> {
        match tolerations_from_annotations(&self.metadata.annotations) {
            Ok(tolerations) => tolerations,
            Err(e) => {
                warn!(
                    "Ignoring tolerations annotation on pod {}: {}",
                    self.full_name(),
                    e
                );
                Vec::new()
            }
        }
    }
}

impl Node {
    /// The node's taints. Malformed annotations degrade to empty.
    pub fn taints(&self) -> Vec<Taint> {
        match taints_from_annotations(&self.metadata.annotations) {
            Ok(taints) => taints,
            Err(e) => {
                warn!("Ignoring taints annotation on node {}: {}", self.name(), e);
                Vec::new()
            }
        }
    }

    /// Replace the node's taint list, rewriting the annotation
    pub fn set_taints(&mut self, taints: &[Taint]) -> Result<()> {
        let raw = serde_json::to_string(taints).map_err(|e| {
            CoreError::serialization_error(
                format!("Failed to serialize taints: {}", e),
                Some(Box::new(e)),
            )
        })?;
        self.metadata
            .annotations
            .insert(TAINTS_ANNOTATION_KEY.to_string(), raw);
        Ok(())
    }
}
