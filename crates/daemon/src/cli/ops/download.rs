use std::path::PathBuf;

use clap::Args;
use tokio::io::AsyncWriteExt;

use common::prelude::CipherError;
use lanrelay_daemon::http_server::api::client::ApiError;
use lanrelay_daemon::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Download {
    /// Object id as shown by `ls`
    pub object_id: String,

    /// Where to write the decrypted file (defaults to the original file name)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("could not decrypt {0}; is this relay using the same key?")]
    Decrypt(String, #[source] CipherError),
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recover the uploaded name from `<name>_<suffix>.enc`
fn original_name(object_id: &str) -> &str {
    let stem = object_id.strip_suffix(".enc").unwrap_or(object_id);
    match stem.rsplit_once('_') {
        Some((name, suffix))
            if !name.is_empty() && suffix.len() == 8 && suffix.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            name
        }
        _ => stem,
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Download {
    type Error = DownloadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let key = AppState::load(ctx.config_path.clone())?.load_key()?;

        let blob = ctx.client.download(&self.object_id).await?;
        let plaintext = key
            .decrypt(&blob)
            .map_err(|e| DownloadError::Decrypt(self.object_id.clone(), e))?;

        let path = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(original_name(&self.object_id)));
        let write_err = |source| DownloadError::Write {
            path: path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        file.write_all(&plaintext).await.map_err(write_err)?;

        Ok(format!(
            "Saved {} ({} bytes) to {}",
            self.object_id,
            plaintext.len(),
            path.display()
        ))
    }
}
