//! Admission plumbing around the reconciler.
//!
//! Wire types come from `kube::core::admission`; this module adds the
//! plugin, its decode-failure policy, and its error type.

pub mod errors;
pub mod plugin;

pub use errors::{AdmissionError, AdmissionResult};
pub use plugin::{DecodeErrorPolicy, DefaultTolerationSeconds, Mutation, PLUGIN_NAME};
