use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::header::{ACCEPT, CONTENT_TYPE, ORIGIN};
use http::Method;
use tower_http::cors::{Any, CorsLayer};

use common::prelude::PeerIdentity;

pub mod client;
pub mod download;
pub mod files;
pub mod ips;
pub mod upload;

use crate::ServiceState;

pub fn router() -> Router<ServiceState> {
    let cors_layer = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST])
        .allow_headers(vec![ACCEPT, CONTENT_TYPE, ORIGIN])
        .allow_origin(Any)
        .allow_credentials(false);

    Router::new()
        .route("/upload", post(upload::handler))
        .route("/get_files", get(files::handler))
        .route("/get_ips", get(ips::handler))
        .route("/download/:object_id", get(download::handler))
        .layer(cors_layer)
}

/// Callers are identified by the address their connection comes from
pub(crate) fn requester(addr: SocketAddr) -> PeerIdentity {
    PeerIdentity::from(addr.ip())
}

/// Logs `err`; the caller only ever sees a generic message
pub(crate) fn internal_error(err: &dyn std::error::Error) -> Response {
    tracing::error!(error = %err, "request failed");
    let msg = serde_json::json!({"error": "internal server error"});
    (StatusCode::INTERNAL_SERVER_ERROR, Json(msg)).into_response()
}

pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}
