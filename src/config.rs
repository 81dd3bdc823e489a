//! Configuration for the mediashelf server

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow browser clients from any origin
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Whether new accounts can be created through the API
    #[serde(default = "default_true")]
    pub allow_signup: bool,

    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3040
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mediashelf.sqlite")
}

fn default_min_password_length() -> usize {
    6
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_signup: true,
            min_password_length: default_min_password_length(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: default_bind(),
                port: default_port(),
                cors_permissive: true,
            },
            database: DatabaseConfig {
                path: default_db_path(),
            },
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Default config path
    pub fn default_path() -> Result<PathBuf> {
        // Check environment variable first
        if let Ok(env_path) = std::env::var("MEDIASHELF_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        // Check for config in current directory
        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Ok(local);
        }

        // Check /data/config.toml (Docker default)
        let data_config = PathBuf::from("/data/config.toml");
        if data_config.exists() {
            return Ok(data_config);
        }

        // Then check XDG config
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("mediashelf");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an explicit path if given, otherwise from the default path
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Load config from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let with_comments = format!(
            "# mediashelf configuration\n\n\
             {}\n\n\
             # Create an account with: POST /api/v1/auth/signup\n",
            content
        );

        std::fs::write(path, with_comments).context("Failed to write config file")?;

        Ok(())
    }
}
