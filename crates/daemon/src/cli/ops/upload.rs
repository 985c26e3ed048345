use std::path::PathBuf;

use clap::Args;

use lanrelay_daemon::http_server::api::client::ApiError;
use lanrelay_daemon::http_server::api::upload::UploadFile;

#[derive(Args, Debug, Clone)]
pub struct Upload {
    /// File to send
    pub path: PathBuf,

    /// Address of the peer allowed to download it (everyone if omitted)
    #[arg(long)]
    pub recipient: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0:?} has no file name")]
    NoFileName(PathBuf),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Upload {
    type Error = UploadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::NoFileName(self.path.clone()))?;
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|source| UploadError::Read {
                path: self.path.clone(),
                source,
            })?;

        let response = ctx
            .client
            .call(UploadFile {
                file_name,
                data,
                recipient: self.recipient.clone(),
            })
            .await?;

        Ok(format!(
            "{}\n  id:        {}\n  recipient: {}\n  size:      {}",
            response.message, response.file.name, response.file.recipient, response.file.size_fmt
        ))
    }
}
