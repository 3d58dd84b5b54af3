//! Errors raised while decoding or encoding a pod during admission.
//!
//! Defaulting never fails on its own; every variant here comes from the
//! object plumbing around it.

use kube::core::admission::SerializePatchError;

use crate::api::pod::TolerationStorage;

/// HTTP-style status code for a malformed request.
pub const STATUS_BAD_REQUEST: u16 = 400;

/// HTTP-style status code for a failure on our side.
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Errors from the admission plumbing.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The request carried no object.
    #[error("admission request has no object")]
    MissingObject,

    /// The object is not shaped like a pod.
    #[error("expected a pod object: {0}")]
    NotAPod(String),

    /// Stored tolerations could not be decoded.
    #[error("invalid tolerations in {storage}: {source}")]
    InvalidTolerations {
        /// Where the tolerations were read from.
        storage: TolerationStorage,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// The updated tolerations or the patch could not be encoded.
    #[error("failed to encode patch: {0}")]
    Encode(#[from] serde_json::Error),

    /// The patch could not be attached to the response.
    #[error(transparent)]
    Patch(#[from] SerializePatchError),
}

impl AdmissionError {
    /// Status code reported back to the API server.
    pub fn code(&self) -> u16 {
        match self {
            AdmissionError::Encode(_) | AdmissionError::Patch(_) => STATUS_INTERNAL_ERROR,
            _ => STATUS_BAD_REQUEST,
        }
    }
}

/// Result alias for admission plumbing.
pub type AdmissionResult<T> = Result<T, AdmissionError>;
