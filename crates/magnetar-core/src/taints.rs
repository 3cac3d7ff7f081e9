//! Taints, tolerations, and their matching rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Effect of a taint on pods that do not tolerate it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
    NoScheduleNoAdmit,
    NoScheduleNoAdmitNoExecute,
}

impl TaintEffect {
    /// Whether an untolerated taint with this effect keeps a pod off the
    /// node at scheduling time. Only PreferNoSchedule is advisory; eviction
    /// for NoExecute is handled outside the placement core, but placement
    /// still refuses the node.
    pub fn blocks_scheduling(&self) -> bool {
        !matches!(self, TaintEffect::PreferNoSchedule)
    }
}

impl fmt::Display for TaintEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaintEffect::NoSchedule => "NoSchedule",
            TaintEffect::PreferNoSchedule => "PreferNoSchedule",
            TaintEffect::NoExecute => "NoExecute",
            TaintEffect::NoScheduleNoAdmit => "NoScheduleNoAdmit",
            TaintEffect::NoScheduleNoAdmitNoExecute => "NoScheduleNoAdmitNoExecute",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TaintEffect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NoSchedule" => Ok(TaintEffect::NoSchedule),
            "PreferNoSchedule" => Ok(TaintEffect::PreferNoSchedule),
            "NoExecute" => Ok(TaintEffect::NoExecute),
            "NoScheduleNoAdmit" => Ok(TaintEffect::NoScheduleNoAdmit),
            "NoScheduleNoAdmitNoExecute" => Ok(TaintEffect::NoScheduleNoAdmitNoExecute),
            other => Err(format!("unknown taint effect: {}", other)),
        }
    }
}

/// A taint on a node. (key, effect) is unique per node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    pub effect: TaintEffect,
}

/// How a toleration's value is compared against a taint's
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    #[default]
    Equal,
    Exists,
}

/// A toleration on a pod, allowing it onto nodes carrying a matching taint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default)]
    pub operator: TolerationOperator,
    pub effect: TaintEffect,
}

impl Toleration {
    /// Whether this toleration matches the given taint.
    ///
    /// Equal requires key, value, and effect to all agree; Exists ignores
    /// the value and requires only key and effect.
    pub fn tolerates(&self, taint: &Taint) -> bool {
        if self.key != taint.key {
            return false;
        }
        match self.operator {
            TolerationOperator::Equal => {
                self.value == taint.value && self.effect == taint.effect
            }
            TolerationOperator::Exists => self.effect == taint.effect,
        }
    }
}

/// Whether the pod's tolerations admit it onto a node with the given
/// taints: every taint whose effect blocks scheduling must be matched by
/// at least one toleration.
pub fn tolerates_taints(tolerations: &[Toleration], taints: &[Taint]) -> bool {
    taints
        .iter()
        .filter(|taint| taint.effect.blocks_scheduling())
        .all(|taint| tolerations.iter().any(|t| t.tolerates(taint)))
}
