//! Configuration loading for the compositor.
//!
//! Two independent artifacts live under `$XDG_CONFIG_HOME/tilewl` (or
//! `$HOME/.config/tilewl`): `config.json` (keybinds, §6) and `environment`
//! (`NAME=VALUE` lines consumed before client spawn). `autostart.sh` is
//! handled by [`crate::session`].

mod keybinds;

pub use keybinds::{parse_config_json, KeybindConfigError, RawKeybind};

use std::path::PathBuf;

use crate::input::keybind::{Keybind, KeybindList};

/// Top level compositor configuration.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    pub keybinds: KeybindList,
    pub keyboard: KeyboardConfig,
    pub general: GeneralConfig,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            keybinds: KeybindList::new(),
            keyboard: KeyboardConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

/// `general` section (§10.4): the backend and log level a CLI flag or
/// environment variable can still override. `None` means "let the caller
/// decide" rather than a concrete default, since the auto-detection
/// heuristic lives in `main`, not here.
#[derive(Debug, Clone, Default)]
pub struct GeneralConfig {
    pub backend: Option<BackendChoice>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Auto,
    Winit,
    Udev,
}

impl std::str::FromStr for BackendChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(BackendChoice::Auto),
            "winit" => Ok(BackendChoice::Winit),
            "udev" => Ok(BackendChoice::Udev),
            _ => Err(()),
        }
    }
}

/// Keyboard defaults per §6. Not part of `config.json` — overridden, if at
/// all, by a separate keyboard config surface the core merely consumes.
#[derive(Debug, Clone)]
pub struct KeyboardConfig {
    pub layout: String,
    pub variant: String,
    pub options: Option<String>,
    pub repeat_rate: i32,
    pub repeat_delay: i32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            layout: "us".to_string(),
            variant: String::new(),
            options: None,
            repeat_rate: 25,
            repeat_delay: 600,
        }
    }
}

impl CompositorConfig {
    /// Resolve `$XDG_CONFIG_HOME/tilewl` or `$HOME/.config/tilewl`.
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return Some(PathBuf::from(xdg).join("tilewl"));
            }
        }
        dirs::home_dir().map(|home| home.join(".config").join("tilewl"))
    }

    /// Load `config.json` from the config directory, falling back to
    /// defaults if the file is absent. A malformed document is logged and
    /// parsing of *that document* stops (§6); the process keeps the
    /// defaults accumulated before the error.
    pub fn load() -> Self {
        let mut config = Self::default();

        let Some(dir) = Self::config_dir() else {
            tracing::warn!("could not determine config directory, using defaults");
            return config;
        };

        let path = dir.join("config.json");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            tracing::info!("no config file at {:?}, using defaults", path);
            return config;
        };

        match parse_config_json(&contents) {
            Ok(raw) => {
                for entry in raw.keybinds {
                    match entry.into_keybind() {
                        Ok(bind) => config.keybinds.add(bind),
                        Err(err) => {
                            tracing::error!("invalid keybind entry, stopping: {err}");
                            break;
                        }
                    }
                }
                config.general.backend = raw.general.backend.as_deref().and_then(|s| s.parse().ok());
                config.general.log_level = raw.general.log_level;
            }
            Err(err) => {
                tracing::error!("failed to parse {:?}: {err}", path);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_empty_keybinds() {
        let config = CompositorConfig::default();
        assert_eq!(config.keybinds.len(), 0);
        assert_eq!(config.keyboard.repeat_rate, 25);
        assert_eq!(config.keyboard.repeat_delay, 600);
        assert_eq!(config.keyboard.layout, "us");
    }
}
