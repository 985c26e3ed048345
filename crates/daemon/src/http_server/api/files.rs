use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, RequestBuilder};
use url::Url;

use super::client::{ApiError, ApiRequest};
use crate::relay::{FileListing, ListQuery, RelayError};
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, FilesError> {
    let requester = super::requester(addr);
    let listings = state.relay().list(&requester, &query).await?;
    Ok(Json(listings))
}

#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl IntoResponse for FilesError {
    fn into_response(self) -> Response {
        match self {
            FilesError::Relay(e) => super::internal_error(&e),
        }
    }
}

impl ApiRequest for ListQuery {
    type Response = Vec<FileListing>;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/get_files")?;
        Ok(client.get(full_url).query(&self))
    }
}
