//! Affinity structures carried in the scheduler affinity annotation.
//!
//! The JSON shapes here are wire-compatible with what the annotation
//! stores: camelCase keys, term lists named
//! `requiredDuringSchedulingIgnoredDuringExecution` and
//! `preferredDuringSchedulingIgnoredDuringExecution`.

use crate::labels::{LabelMap, Operator, Requirement, Selector, SelectorError};
use serde::{Deserialize, Serialize};

/// Scheduling affinity for a pod: node affinity plus pod (anti-)affinity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affinity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_affinity: Option<PodAffinity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_anti_affinity: Option<PodAffinity>,
}

/// Node affinity: hard node-selector terms plus weighted soft terms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAffinity {
    #[serde(
        default,
        rename = "requiredDuringSchedulingIgnoredDuringExecution",
        skip_serializing_if = "Option::is_none"
    )]
    pub required: Option<NodeSelector>,
    #[serde(
        default,
        rename = "preferredDuringSchedulingIgnoredDuringExecution",
        skip_serializing_if = "Option::is_none"
    )]
    pub preferred: Option<Vec<PreferredSchedulingTerm>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelector {
    pub node_selector_terms: Vec<NodeSelectorTerm>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorTerm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<SelectorRequirement>>,
}

impl NodeSelectorTerm {
    /// Convert the term's expressions into a selector
    pub fn to_selector(&self) -> Result<Selector, SelectorError> {
        requirements_as_selector(self.match_expressions.as_deref().unwrap_or(&[]))
    }
}

/// A soft node-affinity term: weight in [1, 100] plus a preference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredSchedulingTerm {
    pub weight: i64,
    pub preference: NodeSelectorTerm,
}

/// Pod affinity or anti-affinity: hard terms plus weighted soft terms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodAffinity {
    #[serde(
        default,
        rename = "requiredDuringSchedulingIgnoredDuringExecution",
        skip_serializing_if = "Option::is_none"
    )]
    pub required: Option<Vec<PodAffinityTerm>>,
    #[serde(
        default,
        rename = "preferredDuringSchedulingIgnoredDuringExecution",
        skip_serializing_if = "Option::is_none"
    )]
    pub preferred: Option<Vec<WeightedPodAffinityTerm>>,
}

impl PodAffinity {
    pub fn required_terms(&self) -> &[PodAffinityTerm] {
        self.required.as_deref().unwrap_or(&[])
    }

    pub fn preferred_terms(&self) -> &[WeightedPodAffinityTerm] {
        self.preferred.as_deref().unwrap_or(&[])
    }
}

/// A pod affinity term: which pods, in which namespaces, within which
/// topology.
///
/// `namespaces` of `None` means the owning pod's own namespace; an empty
/// list means all namespaces. An empty `topology_key` means any two nodes
/// are considered to share a topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodAffinityTerm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topology_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedPodAffinityTerm {
    pub weight: i64,
    pub pod_affinity_term: PodAffinityTerm,
}

/// Wire form of a label selector: an equality map AND-ed with a
/// requirement list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<LabelMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<SelectorRequirement>>,
}

impl LabelSelector {
    /// Convert into the selector algebra form
    pub fn to_selector(&self) -> Result<Selector, SelectorError> {
        let mut selector = match &self.match_labels {
            Some(set) => Selector::from_set(set),
            None => Selector::everything(),
        };
        for requirement in self.match_expressions.as_deref().unwrap_or(&[]) {
            selector.add(requirement.to_requirement()?);
        }
        Ok(selector)
    }
}

/// Wire form of a single selector requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl SelectorRequirement {
    pub fn to_requirement(&self) -> Result<Requirement, SelectorError> {
        Requirement::new(
            self.key.clone(),
            self.operator,
            self.values.clone().unwrap_or_default(),
        )
    }
}

fn requirements_as_selector(
    requirements: &[SelectorRequirement],
) -> Result<Selector, SelectorError> {
    let mut selector = Selector::everything();
    for requirement in requirements {
        selector.add(requirement.to_requirement()?);
    }
    Ok(selector)
}
