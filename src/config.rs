use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::hotkey::{Hotkey, key_name_to_vk};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default = "default_toggle_modifier")]
    pub toggle_modifier: String,
    #[serde(default = "default_toggle_key")]
    pub toggle_key: String,
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_toggle_modifier() -> String {
    "SHIFT".to_string()
}
fn default_toggle_key() -> String {
    "F9".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            toggle_modifier: default_toggle_modifier(),
            toggle_key: default_toggle_key(),
            debug_logging: false,
        }
    }
}

impl InputConfig {
    /// Load config from file, or create default if not exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if !path.as_ref().exists() {
            let default_config = Self::default();
            default_config.save_to_file(&path)?;
            return Ok(default_config);
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: InputConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        // Key names are case insensitive; store them canonical
        config.toggle_modifier = config.toggle_modifier.trim().to_uppercase();
        config.toggle_key = config.toggle_key.trim().to_uppercase();

        // Validate configuration
        if key_name_to_vk(&config.toggle_modifier).is_none() {
            anyhow::bail!("Unknown toggle_modifier: {}", config.toggle_modifier);
        }
        if key_name_to_vk(&config.toggle_key).is_none() {
            anyhow::bail!("Unknown toggle_key: {}", config.toggle_key);
        }

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        // Add comments to make the config file more readable
        let commented = format!(
            "# Overlay input toggle: hold toggle_modifier and press toggle_key\n\
             toggle_modifier = \"{}\"     # SHIFT, CTRL, ALT or a left/right variant\n\
             toggle_key = \"{}\"            # Key that shows/hides the overlay\n\n\
             debug_logging = {}          # Log every save/restore step (RUST_LOG overrides)\n",
            self.toggle_modifier, self.toggle_key, self.debug_logging
        );

        fs::write(path.as_ref(), commented)
            .with_context(|| format!("Failed to write config file {}", path.as_ref().display()))?;
        Ok(())
    }

    /// The configured overlay toggle.
    pub fn hotkey(&self) -> anyhow::Result<Hotkey> {
        Hotkey::from_names(&self.toggle_modifier, &self.toggle_key)
    }
}
