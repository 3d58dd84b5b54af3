//! Locating a pod's tolerations and writing updates back as a JSON patch.
//!
//! Tolerations live either in `spec.tolerations` or, on older clusters, in
//! the `scheduler.alpha.kubernetes.io/tolerations` annotation as a JSON
//! string. The annotation wins when present. Updates go back to wherever
//! the list was read from, and stored entries are copied through as raw
//! JSON so fields this crate does not model survive.

use std::fmt;

use json_patch::Patch;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::admission::errors::{AdmissionError, AdmissionResult};
use crate::api::toleration::Toleration;
use crate::reconciler::Reconciled;

/// Annotation key holding JSON-encoded tolerations.
pub const TOLERATIONS_ANNOTATION_KEY: &str = "scheduler.alpha.kubernetes.io/tolerations";

/// Where a pod's tolerations are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TolerationStorage {
    /// The structured `spec.tolerations` field.
    #[default]
    Spec,
    /// The tolerations annotation.
    Annotation,
}

impl fmt::Display for TolerationStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TolerationStorage::Spec => f.write_str("spec.tolerations"),
            TolerationStorage::Annotation => {
                write!(f, "annotation {TOLERATIONS_ANNOTATION_KEY}")
            }
        }
    }
}

/// Tolerations decoded from a pod, with their location.
#[derive(Debug, Clone, PartialEq)]
pub struct PodTolerations {
    storage: TolerationStorage,
    tolerations: Vec<Toleration>,
    raw: Vec<Value>,
    field_present: bool,
    spec_present: bool,
    metadata_present: bool,
    annotations_present: bool,
}

impl PodTolerations {
    /// Decode tolerations from `pod`.
    ///
    /// `fallback` decides where new tolerations go when the pod has none
    /// stored anywhere.
    pub fn read(pod: &Value, fallback: TolerationStorage) -> AdmissionResult<Self> {
        let object = pod
            .as_object()
            .ok_or_else(|| AdmissionError::NotAPod(format!("object is {}", type_name(pod))))?;

        if let Some(kind) = object.get("kind").and_then(Value::as_str) {
            if kind != "Pod" {
                return Err(AdmissionError::NotAPod(format!("kind is {kind}")));
            }
        }

        let metadata = object.get("metadata").filter(|m| m.is_object());
        let annotations = metadata
            .and_then(|m| m.get("annotations"))
            .and_then(Value::as_object);
        let spec = object.get("spec");

        let annotation = annotations.and_then(|a| a.get(TOLERATIONS_ANNOTATION_KEY));
        let field = spec.and_then(|s| s.get("tolerations"));
        let (storage, raw, field_present) = match (annotation, field) {
            (Some(raw), _) => {
                let raw = String::deserialize(raw).map_err(|source| {
                    AdmissionError::InvalidTolerations {
                        storage: TolerationStorage::Annotation,
                        source,
                    }
                })?;
                (TolerationStorage::Annotation, decode_annotation(&raw)?, true)
            }
            (None, Some(field)) if !field.is_null() => {
                let raw = Vec::<Value>::deserialize(field).map_err(|source| {
                    AdmissionError::InvalidTolerations {
                        storage: TolerationStorage::Spec,
                        source,
                    }
                })?;
                (TolerationStorage::Spec, raw, true)
            }
            _ => (fallback, Vec::new(), false),
        };
        let tolerations = raw
            .iter()
            .map(Toleration::deserialize)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| AdmissionError::InvalidTolerations { storage, source })?;

        Ok(Self {
            storage,
            tolerations,
            raw,
            field_present,
            spec_present: spec.is_some_and(Value::is_object),
            metadata_present: metadata.is_some(),
            annotations_present: annotations.is_some(),
        })
    }

    /// Where the tolerations were found, or will be written.
    pub fn storage(&self) -> TolerationStorage {
        self.storage
    }

    /// Decoded tolerations, in stored order.
    pub fn tolerations(&self) -> &[Toleration] {
        &self.tolerations
    }

    /// Patch that writes `reconciled` back to the pod.
    ///
    /// Empty when nothing changed. Only the appended entries are encoded;
    /// stored ones are written back exactly as they were read. Spec storage
    /// appends one element per new toleration, while the annotation is a
    /// single string and is replaced whole.
    pub fn patch_for(&self, reconciled: &Reconciled) -> AdmissionResult<Patch> {
        if !reconciled.changed() {
            return Ok(Patch(Vec::new()));
        }

        let added = reconciled
            .added()
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let ops = match self.storage {
            TolerationStorage::Spec => self.spec_ops(added),
            TolerationStorage::Annotation => self.annotation_ops(added)?,
        };
        Ok(serde_json::from_value(Value::Array(ops))?)
    }

    fn spec_ops(&self, added: Vec<Value>) -> Vec<Value> {
        if self.field_present {
            return added
                .into_iter()
                .map(|value| json!({ "op": "add", "path": "/spec/tolerations/-", "value": value }))
                .collect();
        }

        if self.spec_present {
            vec![json!({ "op": "add", "path": "/spec/tolerations", "value": added })]
        } else {
            vec![json!({ "op": "add", "path": "/spec", "value": { "tolerations": added } })]
        }
    }

    fn annotation_ops(&self, added: Vec<Value>) -> AdmissionResult<Vec<Value>> {
        let mut list = self.raw.clone();
        list.extend(added);
        let encoded = Value::String(serde_json::to_string(&list)?);

        let op = if self.annotations_present {
            let path = format!(
                "/metadata/annotations/{}",
                escape_pointer_segment(TOLERATIONS_ANNOTATION_KEY)
            );
            let verb = if self.field_present { "replace" } else { "add" };
            json!({ "op": verb, "path": path, "value": encoded })
        } else {
            let mut annotations = Map::new();
            annotations.insert(TOLERATIONS_ANNOTATION_KEY.to_owned(), encoded);
            if self.metadata_present {
                json!({ "op": "add", "path": "/metadata/annotations", "value": annotations })
            } else {
                json!({ "op": "add", "path": "/metadata", "value": { "annotations": annotations } })
            }
        };
        Ok(vec![op])
    }
}

/// Escape one JSON pointer reference token.
fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn decode_annotation(raw: &str) -> AdmissionResult<Vec<Value>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|source| AdmissionError::InvalidTolerations {
        storage: TolerationStorage::Annotation,
        source,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
