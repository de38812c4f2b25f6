use crate::config::{load_config, Config, IngestConfig};
use crate::replay::{MatchDescription, PlayerLine};
use std::path::Path;

/// Check if a test is enabled via environment variable
fn is_test_enabled(env_var: &str) -> bool {
    std::env::var(env_var)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Check if database tests are enabled via environment variable
pub fn is_db_enabled() -> bool {
    is_test_enabled("ENABLE_DB_TESTS")
}

/// Check if S3 tests are enabled via environment variable
pub fn is_s3_enabled() -> bool {
    is_test_enabled("ENABLE_S3_TESTS")
}

/// Load test configuration from config.toml
pub fn load_test_config() -> Result<Config, anyhow::Error> {
    let config_path = "config.toml";

    load_config(config_path).map_err(|e| anyhow::anyhow!("Failed to load config.toml: {}", e))
}

/// Creates a match on a fixed map with one scoreboard line per name.
///
/// Players alternate teams; stats are derived from the position so rows can be
/// told apart in assertions.
pub fn create_test_match(names: &[&str]) -> MatchDescription {
    let players = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let i = i as i32;
            PlayerLine {
                name: name.to_string(),
                team: i % 2,
                goals: i,
                assists: i + 1,
                saves: i + 2,
                shots: i + 3,
                score: 100 * (i + 1),
            }
        })
        .collect();

    MatchDescription {
        map: "Stadium_P".to_string(),
        date: "2024-05-01 18-30-00".to_string(),
        players,
    }
}

/// Ingest settings for tests: staging under `staging_dir`, short timeouts
pub fn create_test_ingest_config(staging_dir: &Path) -> IngestConfig {
    IngestConfig {
        interval_seconds: 1,
        staging_dir: staging_dir.to_path_buf(),
        state_path: staging_dir.join("processed_files.json"),
        fetch_timeout_seconds: 5,
        decode_timeout_seconds: 5,
        persist_timeout_seconds: 5,
        ..IngestConfig::default()
    }
}
