use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

use common::prelude::SharedKey;

use crate::service_config::{DiscoveryMode, ProbeKind};

pub const APP_NAME: &str = "lanrelay";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEY_FILE_NAME: &str = "key.hex";
pub const UPLOADS_DIR_NAME: &str = "uploads";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port the relay's HTTP server listens on
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_presence_ttl_secs")]
    pub presence_ttl_secs: u64,
    #[serde(default = "default_sweep_period_secs")]
    pub sweep_period_secs: u64,
    #[serde(default)]
    pub discovery: DiscoveryMode,
    #[serde(default = "default_scan_period_secs")]
    pub scan_period_secs: u64,
    /// `icmp` or `tcp:<port>`
    #[serde(default)]
    pub probe: ProbeKind,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_max_in_flight_probes")]
    pub max_in_flight_probes: usize,
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    crate::http_server::MAX_UPLOAD_SIZE_BYTES
}

fn default_presence_ttl_secs() -> u64 {
    common::presence::DEFAULT_PRESENCE_TTL.as_secs()
}

fn default_sweep_period_secs() -> u64 {
    common::presence::DEFAULT_SWEEP_PERIOD.as_secs()
}

fn default_scan_period_secs() -> u64 {
    common::probe::DEFAULT_SCAN_PERIOD.as_secs()
}

fn default_probe_timeout_ms() -> u64 {
    common::probe::DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

fn default_max_in_flight_probes() -> usize {
    254
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            presence_ttl_secs: default_presence_ttl_secs(),
            sweep_period_secs: default_sweep_period_secs(),
            discovery: DiscoveryMode::default(),
            scan_period_secs: default_scan_period_secs(),
            probe: ProbeKind::default(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_in_flight_probes: default_max_in_flight_probes(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the relay directory (~/.lanrelay)
    pub relay_dir: PathBuf,
    /// Path to the hex-encoded shared key
    pub key_path: PathBuf,
    /// Path to the upload directory
    pub uploads_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the relay directory path (custom or default ~/.lanrelay)
    pub fn relay_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new relay directory with a freshly generated key
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let relay_dir = Self::relay_dir(custom_path)?;

        if relay_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&relay_dir)?;

        let uploads_path = relay_dir.join(UPLOADS_DIR_NAME);
        fs::create_dir_all(&uploads_path)?;

        let key = SharedKey::generate();
        let key_path = relay_dir.join(KEY_FILE_NAME);
        fs::write(&key_path, key.to_hex())?;

        let config = config.unwrap_or_default();
        let config_path = relay_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            relay_dir,
            key_path,
            uploads_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the relay directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let relay_dir = Self::relay_dir(custom_path)?;

        if !relay_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let key_path = relay_dir.join(KEY_FILE_NAME);
        let uploads_path = relay_dir.join(UPLOADS_DIR_NAME);
        let config_path = relay_dir.join(CONFIG_FILE_NAME);

        if !key_path.exists() {
            return Err(StateError::MissingFile(KEY_FILE_NAME.to_string()));
        }
        if !uploads_path.exists() {
            return Err(StateError::MissingFile(format!("{}/", UPLOADS_DIR_NAME)));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            relay_dir,
            key_path,
            uploads_path,
            config_path,
            config,
        })
    }

    /// Load the shared key from the key file
    pub fn load_key(&self) -> Result<SharedKey, StateError> {
        let hex = fs::read_to_string(&self.key_path)?;
        SharedKey::from_hex(&hex).map_err(|e| StateError::InvalidKey(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("relay directory not initialized. Run 'lanrelay init' first")]
    NotInitialized,

    #[error("relay directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
