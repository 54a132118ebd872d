use screenplay_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "screenplay.config.json";

/// Screenplay configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Script id used when a command is not given one
    #[serde(default = "default_script_id")]
    pub script_id: String,

    /// Session and editor settings
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_script_id() -> String {
    "local-script".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            script_id: default_script_id(),
            session: SessionConfig::default(),
        }
    }
}
