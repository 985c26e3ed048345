use clap::Args;

use lanrelay_daemon::http_server::api::client::ApiError;
use lanrelay_daemon::http_server::api::ips::ListPeers;

#[derive(Args, Debug, Clone)]
pub struct Peers;

#[derive(Debug, thiserror::Error)]
pub enum PeersError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Peers {
    type Error = PeersError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let peers = ctx.client.call(ListPeers).await?;

        if peers.is_empty() {
            Ok("No active peers".to_string())
        } else {
            Ok(peers
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }
}
