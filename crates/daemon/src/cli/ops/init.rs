use clap::Args;

use lanrelay_daemon::service_config::{DiscoveryMode, ProbeKind};
use lanrelay_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Port the relay listens on
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Answer peer queries from recent activity (`presence`) or subnet scans (`subnet`)
    #[arg(long, value_enum, default_value_t = Discovery::Presence)]
    pub discovery: Discovery,

    /// Reachability check used by subnet scans: `icmp` or `tcp:<port>`
    #[arg(long, default_value = "icmp")]
    pub probe: ProbeKind,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum Discovery {
    Presence,
    Subnet,
}

impl From<Discovery> for DiscoveryMode {
    fn from(value: Discovery) -> Self {
        match value {
            Discovery::Presence => DiscoveryMode::Presence,
            Discovery::Subnet => DiscoveryMode::Subnet,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            port: self.port,
            discovery: self.discovery.into(),
            probe: self.probe,
            ..Default::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        let key = state.load_key()?;

        Ok(format!(
            "Initialized relay directory at: {}\n\
             - Key: {}\n\
             - Uploads: {}\n\
             - Config: {}\n\
             - Port: {}\n\
             - Discovery: {:?}\n\
             \n\
             Shared key (copy this to every peer's {} to read their files):\n{}",
            state.relay_dir.display(),
            state.key_path.display(),
            state.uploads_path.display(),
            state.config_path.display(),
            state.config.port,
            state.config.discovery,
            lanrelay_daemon::state::KEY_FILE_NAME,
            key.to_hex(),
        ))
    }
}
