use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub ingest: IngestConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// May be left out when `INGEST_DATABASE_URL` is set
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Schema the destination tables live in. Unqualified names when absent.
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// May be left out when `INGEST_BUCKET` is set
    #[serde(default)]
    pub bucket: String,
    /// Only keys under this prefix are listed
    pub prefix: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Backend used to persist the processed-key set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub interval_seconds: u64,
    pub replay_suffix: String,
    pub staging_dir: PathBuf,
    pub keep_staged_files: bool,
    pub state_path: PathBuf,
    pub state_backend: StateBackend,
    pub workers: usize,
    pub fetch_timeout_seconds: u64,
    pub decode_timeout_seconds: u64,
    pub persist_timeout_seconds: u64,
    /// Consecutive decode failures after which a key stops being retried
    pub quarantine_after: Option<u32>,
    pub matches_table: String,
    pub player_stats_table: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            replay_suffix: ".replay".to_string(),
            staging_dir: PathBuf::from("./tmp"),
            keep_staged_files: false,
            state_path: PathBuf::from("./state/processed_files.json"),
            state_backend: StateBackend::Json,
            workers: 1,
            fetch_timeout_seconds: 60,
            decode_timeout_seconds: 60,
            persist_timeout_seconds: 30,
            quarantine_after: None,
            matches_table: "matches".to_string(),
            player_stats_table: "player_stats".to_string(),
        }
    }
}

impl IngestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_seconds)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub path: String,
    /// Maximum size of one log file in MiB
    #[serde(default = "default_log_size")]
    pub size: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            schema: None,
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            bucket: String::new(),
            prefix: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_size() -> u64 {
    10
}

fn default_max_files() -> usize {
    5
}

pub const ENV_BUCKET: &str = "INGEST_BUCKET";
pub const ENV_DATABASE_URL: &str = "INGEST_DATABASE_URL";
pub const ENV_POLL_INTERVAL: &str = "INGEST_POLL_INTERVAL_SECONDS";
pub const ENV_STAGING_DIR: &str = "INGEST_STAGING_DIR";
pub const ENV_REPLAY_SUFFIX: &str = "INGEST_REPLAY_SUFFIX";

impl Config {
    /// Overlay environment values on top of the file configuration.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bucket) = lookup(ENV_BUCKET) {
            self.s3.bucket = bucket;
        }
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(interval) = lookup(ENV_POLL_INTERVAL) {
            self.ingest.interval_seconds = interval
                .trim()
                .parse()
                .with_context(|| format!("{ENV_POLL_INTERVAL} is not a number: {interval}"))?;
        }
        if let Some(dir) = lookup(ENV_STAGING_DIR) {
            self.ingest.staging_dir = PathBuf::from(dir);
        }
        if let Some(suffix) = lookup(ENV_REPLAY_SUFFIX) {
            self.ingest.replay_suffix = suffix;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let ingest = &self.ingest;
        if self.s3.bucket.trim().is_empty() {
            bail!("s3.bucket must not be empty");
        }
        if self.database.url.trim().is_empty() {
            bail!("database.url must not be empty");
        }
        if ingest.interval_seconds == 0 {
            bail!("ingest.interval_seconds must be greater than zero");
        }
        if ingest.workers == 0 {
            bail!("ingest.workers must be at least 1");
        }
        if ingest.replay_suffix.is_empty() {
            bail!("ingest.replay_suffix must not be empty");
        }
        if ingest.fetch_timeout_seconds == 0
            || ingest.decode_timeout_seconds == 0
            || ingest.persist_timeout_seconds == 0
        {
            bail!("ingest timeouts must be greater than zero");
        }
        if ingest.quarantine_after == Some(0) {
            bail!("ingest.quarantine_after must be at least 1 when set");
        }
        for table in [&ingest.matches_table, &ingest.player_stats_table] {
            if !crate::db::is_identifier(table) {
                bail!("invalid table name: {table}");
            }
        }
        if let Some(schema) = &self.database.schema {
            if !crate::db::is_identifier(schema) {
                bail!("invalid schema name: {schema}");
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<Config> {
    let config_text = fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read config file {path}"))?;
    let mut config: Config = toml::from_str(&config_text)
        .with_context(|| format!("Failed to parse config file {path}"))?;
    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}
