use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration, composed lowest-to-highest priority from compiled
/// defaults, an optional YAML file, then `WATCHCAST_`-prefixed environment variables.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub poll_interval_sec: u64,
    pub probe_concurrency: usize,
    pub probe_chunk_size: usize,
    pub max_retries: u32,
    pub store_dir: String,
    pub channels_file: String,
    pub credential_storage_dir: String,
    pub ingest_api_base: String,
    pub ingest_username: String,
    pub ingest_password: String,
    pub rtmp_path: String,
    pub subprocess_shutdown_grace_sec: u64,
    /// When true (default), a failed ingest-status check is treated as "not busy".
    /// Set false to fail closed (assume busy) on status-endpoint errors.
    pub ingest_status_fail_open: bool,
    pub logging: LoggingConfig,
    pub extractor: ExternalBinaryConfig,
    pub remuxer: ExternalBinaryConfig,
    /// Tool used for channel listing and per-video metadata ("`yt-dlp`" by default).
    pub discovery: ExternalBinaryConfig,
    /// Allowed channel URL hosts; discovery rejects any other host.
    pub allowed_hosts: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("poll_interval_sec", &self.poll_interval_sec)
            .field("probe_concurrency", &self.probe_concurrency)
            .field("probe_chunk_size", &self.probe_chunk_size)
            .field("max_retries", &self.max_retries)
            .field("store_dir", &self.store_dir)
            .field("channels_file", &self.channels_file)
            .field("credential_storage_dir", &self.credential_storage_dir)
            .field("ingest_api_base", &self.ingest_api_base)
            .field("ingest_username", &self.ingest_username)
            .field("ingest_password", &"<redacted>")
            .field("rtmp_path", &self.rtmp_path)
            .field(
                "subprocess_shutdown_grace_sec",
                &self.subprocess_shutdown_grace_sec,
            )
            .field("ingest_status_fail_open", &self.ingest_status_fail_open)
            .field("logging", &self.logging)
            .field("extractor", &self.extractor)
            .field("remuxer", &self.remuxer)
            .field("discovery", &self.discovery)
            .field("allowed_hosts", &self.allowed_hosts)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_sec: 300,
            probe_concurrency: 5,
            probe_chunk_size: 3,
            max_retries: 3,
            store_dir: "./data".to_string(),
            channels_file: "./channels.json".to_string(),
            credential_storage_dir: "./credentials".to_string(),
            ingest_api_base: String::new(),
            ingest_username: String::new(),
            ingest_password: String::new(),
            rtmp_path: "/live/test".to_string(),
            subprocess_shutdown_grace_sec: 5,
            ingest_status_fail_open: true,
            logging: LoggingConfig::default(),
            extractor: ExternalBinaryConfig {
                binary: "extractor".to_string(),
            },
            remuxer: ExternalBinaryConfig {
                binary: "remuxer".to_string(),
            },
            discovery: ExternalBinaryConfig {
                binary: "yt-dlp".to_string(),
            },
            allowed_hosts: vec![
                "www.youtube.com".to_string(),
                "youtube.com".to_string(),
                "youtu.be".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalBinaryConfig {
    pub binary: String,
}

impl Default for ExternalBinaryConfig {
    fn default() -> Self {
        Self {
            binary: String::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, config::FileFormat::Yaml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("WATCHCAST")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Validate configuration at startup (fail fast on misconfigurations).
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.poll_interval_sec == 0 {
            errors.push("poll_interval_sec must be > 0".to_string());
        }
        if self.probe_chunk_size == 0 {
            errors.push("probe_chunk_size must be > 0".to_string());
        }
        if self.probe_concurrency == 0 {
            errors.push("probe_concurrency must be > 0".to_string());
        }
        if self.store_dir.is_empty() {
            errors.push("store_dir must not be empty".to_string());
        }
        if self.extractor.binary.is_empty() {
            errors.push("extractor.binary must not be empty".to_string());
        }
        if self.remuxer.binary.is_empty() {
            errors.push("remuxer.binary must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.poll_interval_sec = 0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("poll_interval_sec")));
    }

    #[test]
    fn debug_output_redacts_password() {
        let mut cfg = AppConfig::default();
        cfg.ingest_password = "hunter2".to_string();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
