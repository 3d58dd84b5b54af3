//! Kubernetes object types the plugin reads and writes.

pub mod pod;
pub mod toleration;

pub use pod::{PodTolerations, TolerationStorage, TOLERATIONS_ANNOTATION_KEY};
pub use toleration::{Taint, TaintEffect, Toleration, TolerationOperator};
