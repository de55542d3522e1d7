//! Configuration system for engram.

use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::Error;

/// Configuration values with priority: defaults < config file < env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Workspace root to observe.
    #[serde(default)]
    pub workspace_path: PathBuf,

    /// Base URL of the remote record store (e.g. a PostgREST endpoint).
    #[serde(default)]
    pub store_url: String,

    /// API key sent with every store request.
    #[serde(default)]
    pub store_api_key: String,

    /// Logical record collection (table) holding memories.
    #[serde(default = "default_collection")]
    pub store_collection: String,

    /// Scan interval for the continuous monitoring loop, in seconds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Commit history window for a regular scan, in hours.
    #[serde(default = "default_git_since_hours")]
    pub git_since_hours: i64,

    /// Optional completion endpoint for memory enrichment.
    #[serde(default)]
    pub enrichment_url: Option<String>,

    /// API key for the enrichment endpoint.
    #[serde(default)]
    pub enrichment_api_key: Option<String>,

    /// Model identifier passed to the enrichment endpoint.
    #[serde(default = "default_enrichment_model")]
    pub enrichment_model: String,
}

fn default_collection() -> String {
    "memories".to_string()
}

fn default_scan_interval() -> u64 {
    300
}

fn default_git_since_hours() -> i64 {
    24
}

fn default_enrichment_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            store_url: String::new(),
            store_api_key: String::new(),
            store_collection: default_collection(),
            scan_interval_secs: default_scan_interval(),
            git_since_hours: default_git_since_hours(),
            enrichment_url: None,
            enrichment_api_key: None,
            enrichment_model: default_enrichment_model(),
        }
    }
}

impl Config {
    /// Load configuration with defaults, file values, and environment overrides.
    pub fn load() -> Result<Self, Error> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        let config_path = config_dir.join("engram/config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                Error::Config(format!(
                    "Failed to read config file {}: {e}",
                    config_path.display()
                ))
            })?;
            toml::from_str(&content).map_err(|e| {
                Error::Config(format!(
                    "Failed to parse config file {}: {e}",
                    config_path.display()
                ))
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), Error> {
        if let Ok(val) = std::env::var("ENGRAM_WORKSPACE") {
            if val.trim().is_empty() {
                return Err(Error::Config("ENGRAM_WORKSPACE cannot be empty".into()));
            }
            self.workspace_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ENGRAM_STORE_URL") {
            self.store_url = val.trim().trim_end_matches('/').to_string();
        }
        if let Ok(val) = std::env::var("ENGRAM_STORE_API_KEY") {
            self.store_api_key = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_STORE_COLLECTION") {
            if val.trim().is_empty() {
                return Err(Error::Config(
                    "ENGRAM_STORE_COLLECTION cannot be empty".into(),
                ));
            }
            self.store_collection = val.trim().to_string();
        }
        if let Ok(val) = std::env::var("ENGRAM_SCAN_INTERVAL") {
            self.scan_interval_secs = val
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("Invalid ENGRAM_SCAN_INTERVAL value: {e}")))?;
        }
        if let Ok(val) = std::env::var("ENGRAM_ENRICHMENT_URL") {
            if !val.trim().is_empty() {
                self.enrichment_url = Some(val.trim().to_string());
            }
        }
        if let Ok(val) = std::env::var("ENGRAM_ENRICHMENT_API_KEY") {
            if !val.trim().is_empty() {
                self.enrichment_api_key = Some(val);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        if self.scan_interval_secs == 0 {
            return Err(Error::Config(
                "Invalid scan interval: must be at least 1 second".into(),
            ));
        }
        if self.git_since_hours <= 0 {
            return Err(Error::Config(format!(
                "Invalid git history window: {} hours",
                self.git_since_hours
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store_collection, "memories");
        assert_eq!(config.scan_interval_secs, 300);
        assert_eq!(config.git_since_hours, 24);
        assert!(config.enrichment_url.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config {
            scan_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let toml = r#"
            workspace_path = "/tmp/work"
            store_url = "http://localhost:54321"
            store_api_key = "secret"
            scan_interval_secs = 60
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.workspace_path, PathBuf::from("/tmp/work"));
        assert_eq!(config.store_url, "http://localhost:54321");
        assert_eq!(config.scan_interval_secs, 60);
        // Unset fields fall back to serde defaults
        assert_eq!(config.store_collection, "memories");
    }
}
