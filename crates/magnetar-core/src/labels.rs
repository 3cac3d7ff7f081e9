//! Label maps and the selector algebra used by predicates and priorities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A set of labels on a resource, keyed by label name
pub type LabelMap = BTreeMap<String, String>;

/// Selector requirement operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::In => "In",
            Operator::NotIn => "NotIn",
            Operator::Exists => "Exists",
            Operator::DoesNotExist => "DoesNotExist",
        };
        write!(f, "{}", s)
    }
}

/// Selector-related errors
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("Requirement key must not be empty")]
    EmptyKey,

    #[error("Operator {0} requires at least one value")]
    MissingValues(Operator),

    #[error("Operator {0} must not have values")]
    UnexpectedValues(Operator),
}

/// A single selector requirement: key, operator, and an optional value set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: Vec<String>,
}

impl Requirement {
    /// Build a requirement, validating the operator/values arity
    pub fn new(
        key: impl Into<String>,
        operator: Operator,
        values: Vec<String>,
    ) -> Result<Self, SelectorError> {
        let key = key.into();
        if key.is_empty() {
            return Err(SelectorError::EmptyKey);
        }
        match operator {
            Operator::In | Operator::NotIn => {
                if values.is_empty() {
                    return Err(SelectorError::MissingValues(operator));
                }
            }
            Operator::Exists | Operator::DoesNotExist => {
                if !values.is_empty() {
                    return Err(SelectorError::UnexpectedValues(operator));
                }
            }
        }
        Ok(Self {
            key,
            operator,
            values,
        })
    }

    /// Check whether this requirement holds against the supplied labels
    pub fn matches(&self, labels: &LabelMap) -> bool {
        match self.operator {
            Operator::In => labels
                .get(&self.key)
                .map_or(false, |v| self.values.iter().any(|want| want == v)),
            Operator::NotIn => labels
                .get(&self.key)
                .map_or(true, |v| !self.values.iter().any(|want| want == v)),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// A label selector: a conjunction of requirements.
///
/// The empty selector matches everything; `from_set` builds the common
/// "all equality requirements AND-ed together" shorthand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// A selector that matches any label set
    pub fn everything() -> Self {
        Self::default()
    }

    /// Build a selector from an equality map: every entry becomes an
    /// `In` requirement with a single value
    pub fn from_set(set: &LabelMap) -> Self {
        let requirements = set
            .iter()
            .map(|(k, v)| Requirement {
                key: k.clone(),
                operator: Operator::In,
                values: vec![v.clone()],
            })
            .collect();
        Self { requirements }
    }

    pub fn with_requirements(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    pub fn add(&mut self, requirement: Requirement) {
        self.requirements.push(requirement);
    }

    /// True iff every requirement holds against the supplied labels
    pub fn matches(&self, labels: &LabelMap) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> LabelMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_requirement_validation() {
        assert!(Requirement::new("k", Operator::In, vec![]).is_err());
        assert!(Requirement::new("k", Operator::NotIn, vec![]).is_err());
        assert!(Requirement::new("k", Operator::Exists, vec!["v".into()]).is_err());
        assert!(Requirement::new("", Operator::Exists, vec![]).is_err());
        assert!(Requirement::new("k", Operator::In, vec!["v".into()]).is_ok());
    }

    #[test]
    fn test_requirement_in_not_in() {
        let set = labels(&[("env", "prod")]);

        let req = Requirement::new("env", Operator::In, vec!["prod".into(), "canary".into()])
            .unwrap();
        assert!(req.matches(&set));

        let req = Requirement::new("env", Operator::NotIn, vec!["prod".into()]).unwrap();
        assert!(!req.matches(&set));

        // NotIn holds when the key is absent
        let req = Requirement::new("tier", Operator::NotIn, vec!["web".into()]).unwrap();
        assert!(req.matches(&set));
    }

    #[test]
    fn test_requirement_exists() {
        let set = labels(&[("env", "prod")]);

        let req = Requirement::new("env", Operator::Exists, vec![]).unwrap();
        assert!(req.matches(&set));

        let req = Requirement::new("env", Operator::DoesNotExist, vec![]).unwrap();
        assert!(!req.matches(&set));

        let req = Requirement::new("tier", Operator::DoesNotExist, vec![]).unwrap();
        assert!(req.matches(&set));
    }

    #[test]
    fn test_selector_from_set() {
        let selector = Selector::from_set(&labels(&[("app", "db"), ("tier", "backend")]));

        assert!(selector.matches(&labels(&[("app", "db"), ("tier", "backend"), ("x", "y")])));
        assert!(!selector.matches(&labels(&[("app", "db")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "backend")])));
    }

    #[test]
    fn test_selector_everything() {
        assert!(Selector::everything().matches(&labels(&[])));
        assert!(Selector::everything().matches(&labels(&[("a", "b")])));
    }
}
