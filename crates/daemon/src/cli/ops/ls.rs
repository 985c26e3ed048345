use clap::Args;

use lanrelay_daemon::http_server::api::client::ApiError;
use lanrelay_daemon::relay::ListQuery;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Sort key: name, size, created, modified or accessed
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort order: asc or desc
    #[arg(long)]
    pub order: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let query = ListQuery {
            sort: self.sort.clone(),
            order: self.order.clone(),
        };
        let files = ctx.client.call(query).await?;

        if files.is_empty() {
            return Ok("No files available".to_string());
        }

        let output = files
            .iter()
            .map(|f| {
                format!(
                    "{}  {:>10}  {}  from {} to {}",
                    f.modified_fmt, f.size_fmt, f.name, f.sender, f.recipient
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}
