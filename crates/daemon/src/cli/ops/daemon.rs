use std::net::SocketAddr;
use std::time::Duration;

use clap::Args;

use lanrelay_daemon::state::{AppState, StateError};
use lanrelay_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override the listen port (default from config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Default log level; RUST_LOG still takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let shared_key = state.load_key()?;
        let app = &state.config;

        let port = self.port.unwrap_or(app.port);
        let config = ServiceConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            max_upload_bytes: app.max_upload_bytes,
            upload_dir: state.uploads_path.clone(),
            shared_key,
            presence_ttl: Duration::from_secs(app.presence_ttl_secs),
            sweep_period: Duration::from_secs(app.sweep_period_secs),
            discovery: app.discovery,
            scan_period: Duration::from_secs(app.scan_period_secs),
            probe: app.probe,
            probe_timeout: Duration::from_millis(app.probe_timeout_ms),
            max_in_flight_probes: app.max_in_flight_probes,
            log_level: self.log_level,
            log_dir: self.log_dir.clone(),
        };

        spawn_service(&config).await;
        Ok("relay stopped".to_string())
    }
}
