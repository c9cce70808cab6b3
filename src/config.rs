//! Application-level configuration loading for the coordination loops.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the core looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/partyq.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTYQ_CONFIG_PATH";

/// Interval between forced token refreshes when the file specifies none.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(55 * 60);
/// Refresh attempts per interval when the file specifies none.
const DEFAULT_REFRESH_RETRY_LIMIT: u32 = 5;
/// Linear backoff step between refresh attempts when the file specifies none.
const DEFAULT_REFRESH_BACKOFF_STEP: Duration = Duration::from_secs(5);
/// Event hub capacity when the file specifies none.
const DEFAULT_EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the coordination loops.
pub struct CoreConfig {
    /// Interval between forced session token refreshes.
    pub token_refresh_interval: Duration,
    /// Maximum refresh attempts per interval before waiting for the next one.
    pub refresh_retry_limit: u32,
    /// Linear backoff step between consecutive refresh attempts.
    pub refresh_backoff_step: Duration,
    /// Capacity of the broadcast channel backing the party event hub.
    pub event_capacity: usize,
}

impl CoreConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded coordination config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            token_refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refresh_retry_limit: DEFAULT_REFRESH_RETRY_LIMIT,
            refresh_backoff_step: DEFAULT_REFRESH_BACKOFF_STEP,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    token_refresh_secs: Option<u64>,
    refresh_retry_limit: Option<u32>,
    refresh_backoff_step_secs: Option<u64>,
    event_capacity: Option<usize>,
}

impl From<RawConfig> for CoreConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = CoreConfig::default();
        Self {
            token_refresh_interval: raw
                .token_refresh_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.token_refresh_interval),
            refresh_retry_limit: raw
                .refresh_retry_limit
                .unwrap_or(defaults.refresh_retry_limit),
            refresh_backoff_step: raw
                .refresh_backoff_step_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_backoff_step),
            event_capacity: raw.event_capacity.unwrap_or(defaults.event_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
