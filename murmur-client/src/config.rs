use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "https://api.murmur.social";
pub const DEFAULT_WEB_URL: &str = "https://murmur.social";

const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// REST API root
    pub base_url: String,
    /// Root of shareable post links
    pub web_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSettings {
    pub comment_page_size: u32,
    pub reply_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub enabled: bool,
    pub file: String,
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    pub server: ServerSettings,
    pub pagination: PaginationSettings,
    pub logging: LoggingSettings,
}

impl ClientSettings {
    /// Load settings from defaults, any discovered settings.toml and the environment
    pub fn new() -> Result<Self, ConfigError> {
        let mut files = Vec::new();

        // User config dir first, working directory overrides it
        if let Some(dir) = dirs::config_dir() {
            files.push(dir.join("murmur").join(SETTINGS_FILE_NAME));
        }
        files.push(PathBuf::from(SETTINGS_FILE_NAME));

        Self::build(&files, true)
    }

    /// Load settings from one file on top of the defaults, ignoring the environment
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::build(&[path.to_path_buf()], false)
    }

    fn build(files: &[PathBuf], read_env: bool) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.base_url", DEFAULT_SERVER_URL)?
            .set_default("server.web_url", DEFAULT_WEB_URL)?
            .set_default("pagination.comment_page_size", 10)?
            .set_default("pagination.reply_page_size", 5)?
            .set_default("logging.enabled", false)?
            .set_default("logging.file", "murmur_debug.log")?
            .set_default("logging.level", "debug")?;

        for path in files {
            if path.exists() {
                builder = builder.add_source(File::from(path.clone()).required(false));
            }
        }

        // Environment variables have the highest priority
        if read_env {
            let overrides = [
                ("MURMUR_SERVER_URL", "server.base_url"),
                ("MURMUR_WEB_URL", "server.web_url"),
                ("MURMUR_COMMENT_PAGE_SIZE", "pagination.comment_page_size"),
                ("MURMUR_REPLY_PAGE_SIZE", "pagination.reply_page_size"),
                ("MURMUR_LOG_FILE", "logging.file"),
            ];
            for (var, key) in overrides {
                if let Ok(value) = std::env::var(var) {
                    builder = builder.set_override(key, value)?;
                }
            }
        }

        let settings: ClientSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.comment_page_size == 0 || self.pagination.reply_page_size == 0 {
            return Err(ConfigError::Message(
                "pagination page sizes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Options handed to every post store built from these settings
    pub fn store_options(&self) -> crate::store::StoreOptions {
        crate::store::StoreOptions {
            comment_page_size: self.pagination.comment_page_size,
            reply_page_size: self.pagination.reply_page_size,
            web_url: self.server.web_url.trim_end_matches('/').to_string(),
        }
    }
}
