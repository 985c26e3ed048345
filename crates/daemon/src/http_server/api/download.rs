use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::relay::RelayError;
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(object_id): Path<String>,
) -> Result<Response, DownloadError> {
    let requester = super::requester(addr);
    let download = state.relay().download(&requester, &object_id).await?;

    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        ),
        (
            header::CONTENT_DISPOSITION,
            attachment(&download.object.object_id),
        ),
        (header::CONTENT_LENGTH, HeaderValue::from(download.size)),
    ];

    Ok((StatusCode::OK, headers, Body::from_stream(download.body)).into_response())
}

/// `attachment; filename="..."` with anything outside printable ASCII replaced
fn attachment(file_name: &str) -> HeaderValue {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        match self {
            DownloadError::Relay(RelayError::NotFound(_)) => {
                super::json_error(StatusCode::NOT_FOUND, "file not found")
            }
            DownloadError::Relay(RelayError::AccessDenied { .. }) => {
                super::json_error(StatusCode::FORBIDDEN, "access denied")
            }
            DownloadError::Relay(e) => super::internal_error(&e),
        }
    }
}
