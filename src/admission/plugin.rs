//! The `DefaultTolerationSeconds` mutating admission plugin.
//!
//! Gates on operation and resource, decodes the pod's tolerations, runs the
//! [`ToleranceReconciler`], and turns the result into a JSON patch.

use json_patch::Patch;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::admission::errors::{AdmissionError, AdmissionResult, STATUS_BAD_REQUEST};
use crate::api::pod::{PodTolerations, TolerationStorage};
use crate::reconciler::ToleranceReconciler;

/// Plugin name as registered with the API server.
pub const PLUGIN_NAME: &str = "DefaultTolerationSeconds";

/// What to do when a pod's stored tolerations cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeErrorPolicy {
    /// Deny the request.
    #[default]
    Reject,
    /// Admit the object unchanged.
    Allow,
}

/// Result of running the plugin on one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Operation or resource is not handled.
    Skipped,
    /// The pod already tolerates both conditions.
    Unchanged,
    /// The pod needs these patch operations.
    Patched(Patch),
}

/// Mutating plugin adding default `NoExecute` tolerations to pods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefaultTolerationSeconds {
    reconciler: ToleranceReconciler,
    storage: TolerationStorage,
    on_decode_error: DecodeErrorPolicy,
}

impl DefaultTolerationSeconds {
    /// Plugin backed by `reconciler`, writing new lists to `spec.tolerations`
    /// and rejecting undecodable pods.
    pub fn new(reconciler: ToleranceReconciler) -> Self {
        Self {
            reconciler,
            storage: TolerationStorage::default(),
            on_decode_error: DecodeErrorPolicy::default(),
        }
    }

    /// Where tolerations go when a pod has none stored.
    #[must_use]
    pub fn with_storage(mut self, storage: TolerationStorage) -> Self {
        self.storage = storage;
        self
    }

    /// Policy for undecodable tolerations.
    #[must_use]
    pub fn with_decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.on_decode_error = policy;
        self
    }

    /// The reconciler in use.
    pub fn reconciler(&self) -> &ToleranceReconciler {
        &self.reconciler
    }

    /// Whether the plugin acts on `operation`. Only creates and updates.
    pub fn handles(&self, operation: &Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    /// Compute the mutation for `request`.
    ///
    /// Requests for anything other than the core `pods` resource itself,
    /// including its subresources, are skipped.
    pub fn admit(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResult<Mutation> {
        if !self.handles(&request.operation) {
            return Ok(Mutation::Skipped);
        }
        let resource = &request.resource;
        let sub_resource = request.sub_resource.as_deref().unwrap_or_default();
        if !resource.group.is_empty() || resource.resource != "pods" || !sub_resource.is_empty() {
            debug!(
                resource = %resource.resource,
                sub_resource,
                "skipping non-pod resource"
            );
            return Ok(Mutation::Skipped);
        }

        let pod = request.object.as_ref().ok_or(AdmissionError::MissingObject)?;
        let pod = serde_json::to_value(pod)?;
        let stored = PodTolerations::read(&pod, self.storage)?;
        let reconciled = self.reconciler.reconcile(stored.tolerations());
        if !reconciled.changed() {
            return Ok(Mutation::Unchanged);
        }

        let patch = stored.patch_for(&reconciled)?;
        info!(
            uid = %request.uid,
            namespace = request.namespace.as_deref().unwrap_or_default(),
            name = %request.name,
            storage = %stored.storage(),
            added = reconciled.added().len(),
            "defaulted node condition tolerations"
        );
        Ok(Mutation::Patched(patch))
    }

    /// Answer a full review.
    pub fn review(&self, review: AdmissionReview<DynamicObject>) -> AdmissionReview<DynamicObject> {
        let request: AdmissionRequest<DynamicObject> = match review.try_into() {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "invalid admission review");
                let mut response = AdmissionResponse::invalid(err.to_string());
                response.result.code = STATUS_BAD_REQUEST;
                return response.into_review();
            }
        };

        let response = match self
            .admit(&request)
            .and_then(|m| respond(AdmissionResponse::from(&request), m))
        {
            Ok(response) => response,
            Err(err) => self.on_error(&request, &err),
        };
        response.into_review()
    }

    fn on_error(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        err: &AdmissionError,
    ) -> AdmissionResponse {
        let response = AdmissionResponse::from(request);
        match (self.on_decode_error, err) {
            (DecodeErrorPolicy::Allow, AdmissionError::InvalidTolerations { .. }) => {
                warn!(
                    uid = %request.uid,
                    error = %err,
                    "admitting pod with undecodable tolerations unchanged"
                );
                response
            }
            _ => {
                warn!(
                    uid = %request.uid,
                    operation = ?request.operation,
                    error = %err,
                    "denied"
                );
                let mut response = response.deny(err.to_string());
                response.result.code = err.code();
                response
            }
        }
    }
}

fn respond(response: AdmissionResponse, mutation: Mutation) -> AdmissionResult<AdmissionResponse> {
    match mutation {
        Mutation::Patched(patch) if !patch.0.is_empty() => Ok(response.with_patch(patch)?),
        _ => Ok(response),
    }
}
