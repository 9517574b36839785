use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_DIR: &str = "prolific-watch";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: EndpointConfig,
    pub storage: StorageConfig,
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub listing_url: String,
    pub target_domain: String,
    pub study_url_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://www.prolific.co/api/v1/studies/?current=1".to_string(),
            target_domain: "prolific.co".to_string(),
            study_url_base: "https://app.prolific.co/studies/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub sounds_dir: Option<PathBuf>,
    pub icon: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sounds_dir: None,
            icon: "prolific-watch".to_string(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;

        if !path.exists() {
            tracing::info!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        tracing::info!(?path, "Loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.listing_url()?;
        Url::parse(&self.endpoint.study_url_base).with_context(|| {
            format!(
                "endpoint.study_url_base is not a valid URL: {}",
                self.endpoint.study_url_base
            )
        })?;
        if self.endpoint.target_domain.trim().is_empty() {
            anyhow::bail!("endpoint.target_domain must not be empty");
        }
        Ok(())
    }

    pub fn listing_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint.listing_url).with_context(|| {
            format!(
                "endpoint.listing_url is not a valid URL: {}",
                self.endpoint.listing_url
            )
        })
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage.path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|p| p.join(APP_DIR).join("storage.json"))
            .context("Could not determine data directory")
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.alerts.sounds_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|p| p.join(APP_DIR).join("audio"))
                .unwrap_or_else(|| PathBuf::from("audio"))
        })
    }
}
