use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::api::ApiEndpoints;
use crate::knowledge::validate::{DEFAULT_ACCEPTED_FILE_TYPES, DEFAULT_MAX_FILE_SIZE_MB};
use crate::knowledge::FileRules;

pub const SETTINGS_DIRECTORY_NAME: &str = "rag-desk";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "RAG_DESK_";
pub const DEFAULT_HOST: &str = "http://localhost:8080";
pub const DEFAULT_TOP_K: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Deployment host every endpoint is derived from.
    pub host: String,
    pub top_k: u32,
    pub max_file_size_mb: u64,
    pub accepted_file_types: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            top_k: DEFAULT_TOP_K,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            accepted_file_types: DEFAULT_ACCEPTED_FILE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid settings: {0}")]
    Figment(#[from] Box<figment::Error>),
    #[error("Invalid host '{host}': {source}")]
    InvalidHost {
        host: String,
        source: url::ParseError,
    },
}

impl AppSettings {
    /// Defaults, then the JSON settings file if present, then `RAG_DESK_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(default_settings_path);
        let mut figment = Figment::from(Serialized::defaults(AppSettings::default()));
        match path {
            Some(path) if path.exists() => {
                tracing::info!("loading settings from {:?}", path);
                figment = figment.merge(Json::file(path));
            }
            Some(path) => tracing::debug!("settings file not found at {:?}, using defaults", path),
            None => {}
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let settings: AppSettings = figment.extract().map_err(Box::new)?;
        settings.normalized()
    }

    fn normalized(mut self) -> Result<Self, ConfigError> {
        self.host = self.host.trim().trim_end_matches('/').to_string();
        url::Url::parse(&self.host).map_err(|source| ConfigError::InvalidHost {
            host: self.host.clone(),
            source,
        })?;
        Ok(self)
    }

    pub fn endpoints(&self) -> ApiEndpoints {
        ApiEndpoints::new(&self.host)
    }

    pub fn file_rules(&self) -> FileRules {
        FileRules::new(self.max_file_size_mb, &self.accepted_file_types)
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIRECTORY_NAME).join(SETTINGS_FILE_NAME))
}
