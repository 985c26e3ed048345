use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use reqwest::{Client, RequestBuilder};
use url::Url;

use common::prelude::PeerIdentity;

use super::client::{ApiError, ApiRequest};
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Json<Vec<PeerIdentity>> {
    let requester = super::requester(addr);
    Json(state.relay().active_peers(&requester))
}

/// Client side of `GET /get_ips`
#[derive(Debug, Clone, Copy, Default)]
pub struct ListPeers;

impl ApiRequest for ListPeers {
    type Response = Vec<PeerIdentity>;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/get_ips")?;
        Ok(client.get(full_url))
    }
}
