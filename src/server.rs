//! HTTP surface for the mutating webhook.
//!
//! `POST /mutate` answers an `AdmissionReview`; `GET /healthz` is a liveness
//! probe. TLS is terminated in front of this listener.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use kube::core::admission::AdmissionReview;
use kube::core::DynamicObject;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::admission::plugin::DefaultTolerationSeconds;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    plugin: Arc<DefaultTolerationSeconds>,
}

/// Build the webhook router.
pub fn router(plugin: DefaultTolerationSeconds) -> Router {
    let state = AppState {
        plugin: Arc::new(plugin),
    };
    Router::new()
        .route("/mutate", post(mutate))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the listener's I/O error if serving fails.
pub async fn serve(
    listener: TcpListener,
    plugin: DefaultTolerationSeconds,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "admission webhook listening");
    }
    axum::serve(listener, router(plugin))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn mutate(
    State(state): State<AppState>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(state.plugin.review(review))
}

async fn healthz() -> &'static str {
    "ok"
}
