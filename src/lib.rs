//! Toleration defaults: a mutating admission webhook for pods.
//!
//! Every admitted pod gets a time-bounded `NoExecute` toleration for the
//! `node.kubernetes.io/not-ready` and `node.kubernetes.io/unreachable`
//! taints, unless it already tolerates them. Explicit tolerations always win.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod logging;
pub mod reconciler;

pub mod admission;
pub mod server;

pub use reconciler::{reconcile, GracePeriods, NodeCondition, Reconciled, ToleranceReconciler};
