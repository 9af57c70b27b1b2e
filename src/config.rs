use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";
pub const DEFAULT_PAGE_SIZE: u32 = 16;
pub const DEFAULT_COMMENT_LIMIT: u32 = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime settings shared by the client, controller and draft store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub page_size: u32,
    pub comment_limit: u32,
    pub timeout: Duration,
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            comment_limit: DEFAULT_COMMENT_LIMIT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            data_dir: PathBuf::from(".notefeed"),
        }
    }
}

impl Config {
    /// Defaults overridden by `NOTEFEED_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config {
            data_dir: resolve_data_dir(&lookup),
            ..Config::default()
        };

        if let Some(url) = lookup("NOTEFEED_BASE_URL") {
            config = config.with_base_url(url)?;
        }
        if let Some(value) = lookup("NOTEFEED_PAGE_SIZE") {
            config.page_size = parse_positive("NOTEFEED_PAGE_SIZE", &value)?;
        }
        if let Some(value) = lookup("NOTEFEED_COMMENT_LIMIT") {
            config.comment_limit = parse_positive("NOTEFEED_COMMENT_LIMIT", &value)?;
        }
        if let Some(value) = lookup("NOTEFEED_TIMEOUT_SECS") {
            let secs = parse_positive("NOTEFEED_TIMEOUT_SECS", &value)?;
            config.timeout = Duration::from_secs(u64::from(secs));
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(url));
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }

    pub fn with_data_dir(mut self, dir: &str) -> Self {
        self.data_dir = PathBuf::from(shellexpand::tilde(dir).into_owned());
        self
    }
}

// NOTEFEED_DATA_DIR, then $XDG_DATA_HOME/notefeed, then ~/.local/share/notefeed
fn resolve_data_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("NOTEFEED_DATA_DIR") {
        return PathBuf::from(shellexpand::tilde(&dir).into_owned());
    }
    if let Some(xdg_data) = lookup("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data).join("notefeed");
    }
    let home = lookup("HOME").unwrap_or_else(|| ".".to_string());
    PathBuf::from(home).join(".local/share/notefeed")
}

fn parse_positive(var: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}
