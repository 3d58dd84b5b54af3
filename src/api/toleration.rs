//! Taints, tolerations, and the matching predicate between them.
//!
//! Field names and JSON encoding follow the `core/v1` Kubernetes API so a
//! decoded list can be written back without disturbing unrelated fields.
//! Absent and empty strings are equivalent for `key`, `value`, and `effect`.

use serde::{Deserialize, Deserializer, Serialize};

/// Effect a taint has on pods that do not tolerate it.
///
/// Effects this crate does not know are kept verbatim in [`TaintEffect::Other`]
/// so newer API values never make a pod undecodable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaintEffect {
    /// New pods are not scheduled onto the node.
    NoSchedule,
    /// The scheduler tries to avoid the node.
    PreferNoSchedule,
    /// Running pods are evicted from the node.
    NoExecute,
    /// Any other effect string.
    Other(String),
}

impl TaintEffect {
    /// Wire name of the effect.
    pub fn as_str(&self) -> &str {
        match self {
            TaintEffect::NoSchedule => "NoSchedule",
            TaintEffect::PreferNoSchedule => "PreferNoSchedule",
            TaintEffect::NoExecute => "NoExecute",
            TaintEffect::Other(other) => other,
        }
    }
}

impl From<String> for TaintEffect {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "NoSchedule" => TaintEffect::NoSchedule,
            "PreferNoSchedule" => TaintEffect::PreferNoSchedule,
            "NoExecute" => TaintEffect::NoExecute,
            _ => TaintEffect::Other(raw),
        }
    }
}

impl From<TaintEffect> for String {
    fn from(effect: TaintEffect) -> Self {
        match effect {
            TaintEffect::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

/// Comparison applied between a toleration and a taint.
///
/// An absent or empty operator means `Equal`, matching the API server default.
/// Unknown operators are kept in [`TolerationOperator::Other`] and match
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TolerationOperator {
    /// Key and effect compatibility is enough.
    Exists,
    /// Value must also equal the taint's value.
    #[default]
    Equal,
    /// Any other operator string.
    Other(String),
}

impl From<String> for TolerationOperator {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Exists" => TolerationOperator::Exists,
            "Equal" | "" => TolerationOperator::Equal,
            _ => TolerationOperator::Other(raw),
        }
    }
}

impl From<TolerationOperator> for String {
    fn from(operator: TolerationOperator) -> Self {
        match operator {
            TolerationOperator::Exists => "Exists".to_owned(),
            TolerationOperator::Equal => "Equal".to_owned(),
            TolerationOperator::Other(other) => other,
        }
    }
}

/// A node taint. Never persisted on the pod; used as the match target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taint {
    /// Taint key, e.g. `node.kubernetes.io/unreachable`.
    pub key: String,
    /// Taint value. Empty for the node condition taints.
    pub value: String,
    /// Effect of the taint.
    pub effect: TaintEffect,
}

impl Taint {
    /// Build a value-less taint.
    pub fn new(key: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            value: String::new(),
            effect,
        }
    }
}

/// A pod's declaration that it accepts nodes carrying a matching taint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    /// Taint key to match. Empty matches every key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    /// How `value` is compared.
    #[serde(default)]
    pub operator: TolerationOperator,

    /// Value to match under [`TolerationOperator::Equal`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,

    /// Taint effect to match. `None` matches every effect.
    #[serde(
        default,
        deserialize_with = "deserialize_effect",
        skip_serializing_if = "Option::is_none"
    )]
    pub effect: Option<TaintEffect>,

    /// Seconds the pod stays bound after a matching `NoExecute` taint
    /// appears. `None` tolerates forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

impl Toleration {
    /// An `Exists` toleration for `key` with `effect` and no time bound.
    pub fn exists(key: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            operator: TolerationOperator::Exists,
            effect: Some(effect),
            ..Self::default()
        }
    }

    /// Set the grace period.
    #[must_use]
    pub fn with_seconds(mut self, seconds: i64) -> Self {
        self.toleration_seconds = Some(seconds);
        self
    }

    /// Whether this toleration matches `taint`.
    ///
    /// Empty key and absent effect act as wildcards, so
    /// `{operator: Exists}` alone tolerates every taint. An unknown operator
    /// never matches.
    pub fn tolerates(&self, taint: &Taint) -> bool {
        if let Some(effect) = &self.effect {
            if *effect != taint.effect {
                return false;
            }
        }

        if !self.key.is_empty() && self.key != taint.key {
            return false;
        }

        match &self.operator {
            TolerationOperator::Exists => true,
            TolerationOperator::Equal => self.value == taint.value,
            TolerationOperator::Other(_) => false,
        }
    }
}

/// Empty string decodes to `None` so `"effect": ""` stays a wildcard.
fn deserialize_effect<'de, D>(deserializer: D) -> Result<Option<TaintEffect>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|r| !r.is_empty()).map(TaintEffect::from))
}
