//! Configuration file management
//!
//! Loads TOML configuration files and provides application settings.
//! Default config path: ~/.config/keybeam/config.toml

use crate::constants::{
    DEFAULT_CHARACTER_DELAY_MS, DEFAULT_DEVICE_PATH, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_KEYSYMS,
    DEFAULT_LAYOUT, DEFAULT_SCANCODES, DEFAULT_SHELL,
};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(target_os = "linux")]
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
#[cfg(target_os = "linux")]
use std::sync::mpsc;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Table selection
    pub tables: TablesConfig,
    /// Gadget device and privileged session
    pub device: DeviceConfig,
}

/// Table settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Table root directory (empty = <data dir>/keybeam/tables)
    pub dir: String,
    /// Keycode table id, `layoutName[-variantName]`
    pub layout: String,
    /// Keysym table id
    pub keysyms: String,
    /// Scancode table id
    pub scancodes: String,
}

/// Device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// HID gadget device node
    pub path: String,
    /// Command that opens a root shell reading lines from stdin
    pub shell: String,
    /// Pause after every keystroke (ms)
    pub character_delay_ms: u64,
    /// Close the session after this long without input (ms)
    pub idle_timeout_ms: u64,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            layout: DEFAULT_LAYOUT.to_string(),
            keysyms: DEFAULT_KEYSYMS.to_string(),
            scancodes: DEFAULT_SCANCODES.to_string(),
        }
    }
}

impl TablesConfig {
    /// Resolved table root
    pub fn tables_dir(&self) -> PathBuf {
        if !self.dir.is_empty() {
            return PathBuf::from(&self.dir);
        }
        dirs::data_dir()
            .map(|d| d.join("keybeam").join("tables"))
            .unwrap_or_else(|| PathBuf::from("tables"))
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DEVICE_PATH.to_string(),
            shell: DEFAULT_SHELL.to_string(),
            character_delay_ms: DEFAULT_CHARACTER_DELAY_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

impl DeviceConfig {
    pub fn character_delay(&self) -> Duration {
        Duration::from_millis(self.character_delay_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Config {
    /// System-wide config path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/keybeam/config.toml";

    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. KEYBEAM_CONFIG environment variable
        if let Ok(path) = std::env::var("KEYBEAM_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/keybeam/config.toml
        if let Some(config_path) = default_config_path() {
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config: /etc/keybeam/config.toml
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. KEYBEAM_CONFIG environment variable
    /// 2. ~/.config/keybeam/config.toml (user config)
    /// 3. /etc/keybeam/config.toml (system config)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                info!("Using built-in default config");
                Self::default()
            }
        }
    }

    /// Load from an explicit path, falling back to defaults on error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(config) => {
                info!("Loaded config: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Render the commented config template
    pub fn to_template(&self) -> Result<String> {
        let body = toml::to_string_pretty(self).context("Failed to serialize config")?;
        Ok(format!(
            "# keybeam configuration\n\
             #\n\
             # tables.dir: empty uses <data dir>/keybeam/tables\n\
             # tables.layout: keycode table id, see `keybeam --list-layouts`\n\
             # device.shell: command that reads shell lines from stdin as root\n\
             \n{}",
            body
        ))
    }

    /// Write default config to ~/.config/keybeam/config.toml
    pub fn write_default_config(force: bool) -> Result<PathBuf> {
        let path = default_config_path()
            .ok_or_else(|| anyhow::anyhow!("Config directory not found"))?;
        Self::default().write_to(&path, force)?;
        Ok(path)
    }

    /// Write this config as a template; refuses to overwrite unless `force`
    pub fn write_to(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_template()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Config file change watcher (Linux only)
#[cfg(target_os = "linux")]
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

#[cfg(target_os = "linux")]
impl ConfigWatcher {
    /// Start watching config file
    pub fn new(config_path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let file_name = config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                // editors often save by writing a temp file and renaming it
                use notify::EventKind;
                let relevant = match &file_name {
                    Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
                    None => true,
                };
                if relevant && matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    let _ = tx.send(());
                }
            }
        })?;

        // Watch the parent directory to catch rename operations
        let watch_path = config_path.parent().unwrap_or(config_path);
        watcher.watch(watch_path, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Check if config file was modified (non-blocking)
    pub fn check_reload(&self) -> bool {
        let mut changed = false;
        while self.rx.try_recv().is_ok() {
            changed = true;
        }
        changed
    }
}

/// Get default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("keybeam").join("config.toml"))
}
