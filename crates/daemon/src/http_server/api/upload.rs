use std::net::SocketAddr;

use axum::extract::multipart::MultipartError;
use axum::extract::{ConnectInfo, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::prelude::Recipient;

use super::client::{ApiError, ApiRequest};
use crate::relay::{FileListing, RelayError, UploadRequest};
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub file: FileListing,
}

pub async fn handler(
    State(state): State<ServiceState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, UploadError> {
    let sender = super::requester(addr);
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                request.file_name = field.file_name().map(str::to_string);
                request.data = Some(field.bytes().await?);
            }
            "recipient" => {
                let text = field.text().await?;
                request.recipient = Recipient::parse(&text);
            }
            _ => {}
        }
    }

    let file = state.relay().upload(&sender, request).await?;

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            message: format!("{} uploaded", file.original_name),
            file,
        }),
    ))
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("unreadable multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let plain = |status: StatusCode, msg: String| {
            (status, [(header::CONTENT_TYPE, "text/plain")], msg).into_response()
        };

        match self {
            // 413 once the body limit trips, 400 for anything else malformed
            UploadError::Multipart(e) => plain(e.status(), e.body_text()),
            UploadError::Relay(RelayError::BadRequest(msg)) => plain(StatusCode::BAD_REQUEST, msg),
            UploadError::Relay(e) => super::internal_error(&e),
        }
    }
}

/// Client side of `POST /upload`
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub data: Vec<u8>,
    /// Peer identity to address the file to; everyone when unset
    pub recipient: Option<String>,
}

impl ApiRequest for UploadFile {
    type Response = UploadResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/upload")?;
        let mut form = Form::new().part("file", Part::bytes(self.data).file_name(self.file_name));
        if let Some(recipient) = self.recipient {
            form = form.text("recipient", recipient);
        }
        Ok(client.post(full_url).multipart(form))
    }
}
