//! Default `NoExecute` tolerations for the node condition taints.
//!
//! For each known node condition, in fixed order, the reconciler checks
//! whether the pod already tolerates the condition's taint. If nothing does,
//! it appends an `Exists` toleration bounded by the configured grace period.
//! Existing entries are never modified or reordered.

use crate::api::toleration::{Taint, TaintEffect, Toleration};

/// Taint key the node lifecycle controller sets on nodes that are not ready.
pub const TAINT_NODE_NOT_READY: &str = "node.kubernetes.io/not-ready";

/// Taint key the node lifecycle controller sets on unreachable nodes.
pub const TAINT_NODE_UNREACHABLE: &str = "node.kubernetes.io/unreachable";

/// Grace period used when nothing else is configured.
pub const DEFAULT_TOLERATION_SECONDS: i64 = 300;

/// Node health conditions that get a default toleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCondition {
    /// Node is not ready.
    NotReady,
    /// Node controller cannot reach the node.
    Unreachable,
}

impl NodeCondition {
    /// All conditions, in the order their tolerations are appended.
    pub const ALL: [NodeCondition; 2] = [NodeCondition::NotReady, NodeCondition::Unreachable];

    /// Taint key for this condition.
    pub fn taint_key(self) -> &'static str {
        match self {
            NodeCondition::NotReady => TAINT_NODE_NOT_READY,
            NodeCondition::Unreachable => TAINT_NODE_UNREACHABLE,
        }
    }

    /// The `NoExecute` taint carried by nodes in this condition.
    pub fn taint(self) -> Taint {
        Taint::new(self.taint_key(), TaintEffect::NoExecute)
    }
}

/// Grace periods, in seconds, for each node condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePeriods {
    /// Seconds to stay bound to a not-ready node.
    pub not_ready: i64,
    /// Seconds to stay bound to an unreachable node.
    pub unreachable: i64,
}

impl GracePeriods {
    /// Same grace period for every condition.
    pub fn uniform(seconds: i64) -> Self {
        Self {
            not_ready: seconds,
            unreachable: seconds,
        }
    }

    /// Grace period for `condition`.
    pub fn for_condition(&self, condition: NodeCondition) -> i64 {
        match condition {
            NodeCondition::NotReady => self.not_ready,
            NodeCondition::Unreachable => self.unreachable,
        }
    }
}

impl Default for GracePeriods {
    fn default() -> Self {
        Self::uniform(DEFAULT_TOLERATION_SECONDS)
    }
}

/// Computes the defaulted toleration list for a pod.
///
/// Holds only its grace periods and is `Copy`, so one value can be shared
/// by every in-flight admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToleranceReconciler {
    grace: GracePeriods,
}

impl ToleranceReconciler {
    /// Reconciler using `default_seconds` for every condition.
    pub fn new(default_seconds: i64) -> Self {
        Self::with_grace_periods(GracePeriods::uniform(default_seconds))
    }

    /// Reconciler with per-condition grace periods.
    pub fn with_grace_periods(grace: GracePeriods) -> Self {
        Self { grace }
    }

    /// Configured grace periods.
    pub fn grace_periods(&self) -> GracePeriods {
        self.grace
    }

    /// Append a default toleration for every condition `current` does not
    /// already tolerate.
    pub fn reconcile(&self, current: &[Toleration]) -> Reconciled {
        let mut tolerations = current.to_vec();

        for condition in NodeCondition::ALL {
            let taint = condition.taint();
            if current.iter().any(|t| t.tolerates(&taint)) {
                continue;
            }
            tolerations.push(
                Toleration::exists(taint.key, taint.effect)
                    .with_seconds(self.grace.for_condition(condition)),
            );
        }

        Reconciled {
            tolerations,
            original_len: current.len(),
        }
    }
}

/// Output of [`ToleranceReconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    tolerations: Vec<Toleration>,
    original_len: usize,
}

impl Reconciled {
    /// Whether any toleration was appended.
    pub fn changed(&self) -> bool {
        self.tolerations.len() != self.original_len
    }

    /// Full list: the input entries followed by the appended ones.
    pub fn tolerations(&self) -> &[Toleration] {
        &self.tolerations
    }

    /// Only the appended entries.
    pub fn added(&self) -> &[Toleration] {
        self.tolerations.get(self.original_len..).unwrap_or(&[])
    }

    /// Take the full list.
    pub fn into_tolerations(self) -> Vec<Toleration> {
        self.tolerations
    }
}

/// Reconcile `current` with one grace period for both conditions.
///
/// Returns the updated list and whether it differs from the input.
pub fn reconcile(current: &[Toleration], default_seconds: i64) -> (Vec<Toleration>, bool) {
    let reconciled = ToleranceReconciler::new(default_seconds).reconcile(current);
    let changed = reconciled.changed();
    (reconciled.into_tolerations(), changed)
}
