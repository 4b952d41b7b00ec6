//! JSON `config.json` parsing (§6 "Configuration options recognised").
//!
//! Top level is an object with two recognised keys: `keybinds` (an array of
//! `{command, keysym, mods}` objects) and `general` (`{backend, log_level}`,
//! both optional strings). Any other top-level key is logged and stops
//! parsing — this walks the object manually (rather than deriving
//! `Deserialize` with `deny_unknown_fields`) so we can report *which* key
//! was unrecognised and stop incrementally, matching the original's
//! streaming-parse-then-bail behaviour.

use serde::Deserialize;
use thiserror::Error;
use xkbcommon::xkb;

use crate::input::keybind::{Keybind, ModMask};

#[derive(Debug, Error)]
pub enum KeybindConfigError {
    #[error("config.json is not a JSON object")]
    NotAnObject,
    #[error("unrecognised top-level key {0:?}")]
    UnrecognisedKey(String),
    #[error("`keybinds` must be an array")]
    KeybindsNotArray,
    #[error("`general` must be an object")]
    GeneralNotObject,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// `general` section of `config.json`, both fields optional (§10.4).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawGeneral {
    pub backend: Option<String>,
    pub log_level: Option<String>,
}

/// Everything `config.json` can hold, in document order of appearance.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub keybinds: Vec<RawKeybind>,
    pub general: RawGeneral,
}

/// One `keybinds[]` entry as written in `config.json`, before keysym/mods
/// have been resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct RawKeybind {
    pub command: String,
    pub keysym: String,
    pub mods: String,
}

#[derive(Debug, Error)]
pub enum RawKeybindError {
    #[error("unknown xkb keysym name {0:?}")]
    UnknownKeysym(String),
    #[error("unrecognised modifier in {0:?}")]
    UnknownModifier(String),
}

impl RawKeybind {
    pub fn into_keybind(self) -> std::result::Result<Keybind, RawKeybindError> {
        let keysym = xkb::keysym_from_name(&self.keysym, xkb::KEYSYM_NO_FLAGS);
        if keysym == xkb::Keysym::from(xkb::KEY_NoSymbol) {
            return Err(RawKeybindError::UnknownKeysym(self.keysym));
        }
        let mods = ModMask::parse(&self.mods)
            .ok_or_else(|| RawKeybindError::UnknownModifier(self.mods.clone()))?;
        Ok(Keybind::new(keysym, mods, self.command))
    }
}

/// Parse the top level of `config.json`, returning its recognised sections
/// in document order. Stops (returns `Err`) on the first unrecognised
/// top-level key, per §6.
pub fn parse_config_json(contents: &str) -> Result<RawConfig, KeybindConfigError> {
    let value: serde_json::Value = serde_json::from_str(contents)?;
    let object = value.as_object().ok_or(KeybindConfigError::NotAnObject)?;

    let mut config = RawConfig::default();
    for (key, value) in object {
        match key.as_str() {
            "keybinds" => {
                let array = value
                    .as_array()
                    .ok_or(KeybindConfigError::KeybindsNotArray)?;
                for entry in array {
                    let raw: RawKeybind = serde_json::from_value(entry.clone())?;
                    config.keybinds.push(raw);
                }
            }
            "general" => {
                if !value.is_object() {
                    return Err(KeybindConfigError::GeneralNotObject);
                }
                config.general = serde_json::from_value(value.clone())?;
            }
            other => return Err(KeybindConfigError::UnrecognisedKey(other.to_string())),
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_document() {
        let json = r#"{
            "keybinds": [
                {"command": "exec alacritty", "keysym": "F2", "mods": "logo"},
                {"command": "exit", "keysym": "F3", "mods": "logo"}
            ]
        }"#;
        let config = parse_config_json(json).unwrap();
        assert_eq!(config.keybinds.len(), 2);
        assert_eq!(config.keybinds[0].command, "exec alacritty");
    }

    #[test]
    fn parses_general_section() {
        let json = r#"{"general": {"backend": "udev", "log_level": "debug"}}"#;
        let config = parse_config_json(json).unwrap();
        assert_eq!(config.general.backend.as_deref(), Some("udev"));
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let json = r#"{"nonsense": true}"#;
        let err = parse_config_json(json).unwrap_err();
        assert!(matches!(err, KeybindConfigError::UnrecognisedKey(_)));
    }

    #[test]
    fn raw_keybind_rejects_unknown_modifier() {
        let raw = RawKeybind {
            command: "exit".into(),
            keysym: "q".into(),
            mods: "logo+bogus".into(),
        };
        assert!(raw.into_keybind().is_err());
    }

    #[test]
    fn raw_keybind_rejects_unknown_keysym() {
        let raw = RawKeybind {
            command: "exit".into(),
            keysym: "NotAKeysym".into(),
            mods: "logo".into(),
        };
        assert!(raw.into_keybind().is_err());
    }
}
