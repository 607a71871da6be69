//! Configuration management
//!
//! Two layers:
//! - [`Config`]: how the host starts (server address, log filter), read once
//!   from `config.toml` and `SQC_*` environment variables
//! - [`Preferences`]: user preferences the session consults while running,
//!   persisted as `preferences.json` and changed at runtime

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Default `tracing` filter when neither `RUST_LOG` nor `log_filter` is set
pub const DEFAULT_LOG_FILTER: &str = "squeeze_control=debug";

const CONFIG_DIR_NAME: &str = "squeeze-control";
const PREFERENCES_FILE: &str = "preferences.json";

/// Preference keys, as passed to `SessionManager::on_preference_changed`
pub const PREF_LAST_PLAYER: &str = "last_player";
pub const PREF_DEBUG_LOGGING: &str = "debug_logging";
pub const PREF_NOTIFY_ON_CONNECTION: &str = "notify_on_connection";

#[derive(Debug, Deserialize)]
pub struct Config {
    /// `host[:port]` of the server CLI
    #[serde(default)]
    pub server: Option<String>,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Get config directory (SQC_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SQC_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library/Application Support")
                .join(CONFIG_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(CONFIG_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join(CONFIG_DIR_NAME);
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let config = ::config::Config::builder()
        .set_default("log_filter", DEFAULT_LOG_FILTER)?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (SQC_SERVER, SQC_LOG_FILTER)
        .add_source(
            ::config::Environment::with_prefix("SQC")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Read-only view of the user preferences the session consults
pub trait Settings: Send + Sync {
    /// Player to prefer when the server lists several
    fn last_player(&self) -> Option<String>;

    /// Log every raw line received from the server
    fn debug_logging(&self) -> bool;

    /// Keep the now-playing indicator up while connected but idle
    fn notify_on_connection(&self) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub last_player: Option<String>,
    pub debug_logging: bool,
    pub notify_on_connection: bool,
}

impl Settings for Preferences {
    fn last_player(&self) -> Option<String> {
        self.last_player.clone()
    }

    fn debug_logging(&self) -> bool {
        self.debug_logging
    }

    fn notify_on_connection(&self) -> bool {
        self.notify_on_connection
    }
}

/// Preferences shared between the host and the session, optionally backed by
/// a JSON file that is rewritten on every change.
pub struct PreferenceStore {
    path: Option<PathBuf>,
    current: ArcSwap<Preferences>,
}

impl PreferenceStore {
    /// `preferences.json` in the config directory
    pub fn default_path() -> PathBuf {
        get_config_dir().join(PREFERENCES_FILE)
    }

    /// Load from `path`; a missing or unreadable file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Preferences>(&content) {
                Ok(prefs) => {
                    tracing::info!("Loaded preferences from {}", path.display());
                    prefs
                }
                Err(e) => {
                    tracing::warn!("Failed to parse preferences {}: {}", path.display(), e);
                    Preferences::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                tracing::warn!("Failed to read preferences {}: {}", path.display(), e);
                Preferences::default()
            }
        };
        Self {
            path: Some(path),
            current: ArcSwap::from_pointee(prefs),
        }
    }

    /// A store that never touches the filesystem
    pub fn in_memory(prefs: Preferences) -> Self {
        Self {
            path: None,
            current: ArcSwap::from_pointee(prefs),
        }
    }

    pub fn get(&self) -> Arc<Preferences> {
        self.current.load_full()
    }

    /// Apply `change` and persist when anything differs.
    ///
    /// Returns whether the preferences changed.
    pub fn update(&self, change: impl Fn(&mut Preferences)) -> Result<bool> {
        let mut changed = false;
        let previous = self.current.rcu(|current| {
            let mut next = Preferences::clone(current);
            change(&mut next);
            changed = next != **current;
            Arc::new(next)
        });
        if !changed {
            return Ok(false);
        }
        tracing::debug!("Preferences changed from {:?}", previous);
        if let Some(path) = &self.path {
            save(path, &self.current.load())?;
        }
        Ok(true)
    }

    pub fn set_last_player(&self, player_id: &str) -> Result<bool> {
        self.update(|prefs| prefs.last_player = Some(player_id.to_string()))
    }

    pub fn set_debug_logging(&self, enabled: bool) -> Result<bool> {
        self.update(|prefs| prefs.debug_logging = enabled)
    }

    pub fn set_notify_on_connection(&self, enabled: bool) -> Result<bool> {
        self.update(|prefs| prefs.notify_on_connection = enabled)
    }
}

fn save(path: &Path, prefs: &Preferences) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(prefs)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Saved preferences to {}", path.display());
    Ok(())
}

impl Settings for PreferenceStore {
    fn last_player(&self) -> Option<String> {
        self.current.load().last_player.clone()
    }

    fn debug_logging(&self) -> bool {
        self.current.load().debug_logging
    }

    fn notify_on_connection(&self) -> bool {
        self.current.load().notify_on_connection
    }
}
