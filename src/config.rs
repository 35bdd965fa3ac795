use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const SOURCE_DIR_NAME: &str = "NemirtingasGalaxyEmu";
pub const DESTINATION_DIR_NAME: &str = "Goldberg SteamEmu Saves";
pub const CONFIG_FILE_NAME: &str = "achievement_bridge.json";

const DEFAULT_POLL_MS: u64 = 1_000;
const DEFAULT_SETTLE_MS: u64 = 500;
const DEFAULT_DEBOUNCE_MS: u64 = 2_000;

/// Paths and timing knobs shared by the monitor and the watch session.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// GalaxyEmu root; sources live at `<root>/<profile>/<gogId>/achievements.json`.
    pub source_root: PathBuf,
    /// Goldberg root; outputs go to `<root>/<steamId>/achievements.json`.
    pub destination_root: PathBuf,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub debounce_window: Duration,
}

impl BridgeConfig {
    /// Defaults under the roaming application-data directory, overridable via
    /// `ACHBRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let app_data = dirs::config_dir();

        let source_root = match env_path("ACHBRIDGE_SOURCE_ROOT") {
            Some(path) => path,
            None => app_data
                .as_ref()
                .map(|dir| dir.join(SOURCE_DIR_NAME))
                .context("no application data directory; set ACHBRIDGE_SOURCE_ROOT")?,
        };
        let destination_root = match env_path("ACHBRIDGE_DEST_ROOT") {
            Some(path) => path,
            None => app_data
                .as_ref()
                .map(|dir| dir.join(DESTINATION_DIR_NAME))
                .context("no application data directory; set ACHBRIDGE_DEST_ROOT")?,
        };

        Ok(Self {
            source_root,
            destination_root,
            poll_interval: env_millis("ACHBRIDGE_POLL_MS", DEFAULT_POLL_MS)?,
            settle_delay: env_millis("ACHBRIDGE_SETTLE_MS", DEFAULT_SETTLE_MS)?,
            debounce_window: env_millis("ACHBRIDGE_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?,
        })
    }

    pub fn with_roots(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            debounce_window: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// Default location of the binding file, next to the Goldberg saves.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn env_millis(key: &str, default: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(value) => {
            let millis = value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of milliseconds, got '{value}'"))?;
            Ok(Duration::from_millis(millis))
        }
        Err(_) => Ok(Duration::from_millis(default)),
    }
}
