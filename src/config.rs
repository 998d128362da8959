use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Project scripting settings, read once at host init.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptSettings {
    /// Compiled game module for this project.
    #[serde(default = "ScriptSettings::default_game_module")]
    pub game_module: PathBuf,
    /// Engine core module; fixed engine-relative location.
    #[serde(default = "ScriptSettings::default_core_module")]
    pub core_module: PathBuf,
    #[serde(default)]
    pub enable_debugging: bool,
    #[serde(default = "ScriptSettings::default_debug_listener_port")]
    pub debug_listener_port: u16,
}

impl ScriptSettings {
    fn default_game_module() -> PathBuf {
        PathBuf::from("assets/scripts/game.rhai")
    }

    fn default_core_module() -> PathBuf {
        PathBuf::from("assets/scripts/engine_core.rhai")
    }

    const fn default_debug_listener_port() -> u16 {
        2550
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read script settings {}", path.display()))?;
        let settings = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse script settings {}", path.display()))?;
        Ok(settings)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("[scripts] settings load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            game_module: Self::default_game_module(),
            core_module: Self::default_core_module(),
            enable_debugging: false,
            debug_listener_port: Self::default_debug_listener_port(),
        }
    }
}
