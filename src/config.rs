use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::logger::LogLevel;

pub const DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";
pub const DEFAULT_MODEL: &str = "black-forest-labs/FLUX.1-schnell-Free";

#[derive(Debug, Clone)]
pub struct TogetherConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub together: TogetherConfig,
    pub download_dir: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
    pub log_file: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for TogetherConfig {
    fn default() -> Self {
        TogetherConfig {
            api_key: None,
            base_url: None,
            model: None,
            timeout_secs: None,
        }
    }
}

impl TogetherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `TOGETHER_*` variables. The key falls back to the name the
    /// browser build used, `REACT_APP_TOGETHER_API_KEY`.
    pub fn from_env() -> Self {
        let api_key = env::var("TOGETHER_API_KEY")
            .or_else(|_| env::var("REACT_APP_TOGETHER_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        let base_url = env::var("TOGETHER_BASE_URL").ok();
        let model = env::var("TOGETHER_MODEL").ok();
        let timeout_secs = env::var("TOGETHER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok());

        TogetherConfig {
            api_key,
            base_url,
            model,
            timeout_secs,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            together: TogetherConfig::default(),
            download_dir: None,
            log_level: None,
            log_file: None,
            log_json: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let download_dir = env::var("FLUXGEN_DOWNLOAD_DIR").ok().map(PathBuf::from);
        let log_level = env::var("FLUXGEN_LOG")
            .ok()
            .and_then(|level| level.parse().ok());
        let log_file = env::var("FLUXGEN_LOG_FILE")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let log_json = env::var("FLUXGEN_LOG_FORMAT")
            .map(|format| format.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Config {
            together: TogetherConfig::from_env(),
            download_dir,
            log_level,
            log_file,
            log_json,
        }
    }

    pub fn with_together(mut self, config: TogetherConfig) -> Self {
        self.together = config;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TogetherConfig::new();
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.timeout(), None);
        assert_eq!(Config::new().download_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_builders() {
        let config = TogetherConfig::new()
            .with_api_key("key")
            .with_base_url("http://localhost:9000/v1/")
            .with_model("black-forest-labs/FLUX.1-dev")
            .with_timeout(30);

        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert_eq!(config.base_url(), "http://localhost:9000/v1");
        assert_eq!(config.model(), "black-forest-labs/FLUX.1-dev");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));

        let config = Config::new()
            .with_together(config)
            .with_download_dir("/tmp/images")
            .with_log_level(LogLevel::Warn)
            .with_log_file("/tmp/fluxgen.log");
        assert_eq!(config.download_dir(), PathBuf::from("/tmp/images"));
        assert_eq!(config.log_level, Some(LogLevel::Warn));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/fluxgen.log")));
        assert!(!config.log_json);
        assert_eq!(config.together.api_key.as_deref(), Some("key"));
    }
}
