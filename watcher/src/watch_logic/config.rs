use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lib_listings::configs::{parse_endpoint, ConfigError, ReconnectPolicy, StreamConfig};
use lib_listings::StoreLimits;

const DEFAULT_CONFIG_FILE: &str = "listing_watch.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Watches a listing feed and prints new listings as they arrive", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "LISTINGS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "LISTINGS_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "LISTINGS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "LISTINGS_WS_URL", help = "WebSocket endpoint of the listing feed.")]
    pub ws_url: Option<String>,

    #[clap(long, env = "LISTINGS_PING_INTERVAL_SECONDS", help = "Seconds between keepalive pings.")]
    pub ping_interval_seconds: Option<u64>,

    #[clap(long, env = "LISTINGS_RECONNECT_STEP_MS", help = "Reconnect delay added per failed attempt, in milliseconds.")]
    pub reconnect_step_ms: Option<u64>,

    #[clap(long, env = "LISTINGS_RECONNECT_MAX_DELAY_MS", help = "Maximum reconnect delay in milliseconds.")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[clap(long, env = "LISTINGS_STORE_CAPACITY", help = "Maximum number of listings kept in memory.")]
    pub store_capacity: Option<usize>,

    #[clap(long, env = "LISTINGS_STORE_FLOOR", help = "Capacity minus this many listings are evicted when the store is full.")]
    pub store_floor: Option<usize>,

    #[clap(long, env = "LISTINGS_FOREGROUND", help = "Start as if the user is watching (cue instead of notification).")]
    pub foreground: Option<bool>,

    #[clap(long, env = "LISTINGS_BOARD_ROWS", help = "Number of listings printed on every update.")]
    pub board_rows: Option<usize>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            ws_url: other.ws_url.or(self.ws_url),
            ping_interval_seconds: other.ping_interval_seconds.or(self.ping_interval_seconds),
            reconnect_step_ms: other.reconnect_step_ms.or(self.reconnect_step_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            store_capacity: other.store_capacity.or(self.store_capacity),
            store_floor: other.store_floor.or(self.store_floor),
            foreground: other.foreground.or(self.foreground),
            board_rows: other.board_rows.or(self.board_rows),
        }
    }

    fn defaults() -> Config {
        let stream = StreamConfig::default();
        Config {
            log_dir: Some(
                dirs::data_local_dir()
                    .map(|d| d.join("listing_watch").join("logs"))
                    .unwrap_or_else(|| PathBuf::from("./logs")),
            ),
            log_level: Some("info".to_string()),
            ws_url: Some(stream.endpoint.to_string()),
            ping_interval_seconds: Some(stream.ping_interval.as_secs()),
            reconnect_step_ms: Some(stream.reconnect.step.as_millis() as u64),
            reconnect_max_delay_ms: Some(stream.reconnect.max_delay.as_millis() as u64),
            store_capacity: Some(stream.limits.capacity),
            store_floor: Some(stream.limits.floor),
            foreground: Some(true),
            board_rows: Some(10),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Builds the validated library configuration from the resolved values.
    pub fn stream_config(&self) -> Result<StreamConfig, ConfigError> {
        let defaults = StreamConfig::default();
        let endpoint = match &self.ws_url {
            Some(url) => parse_endpoint(url)?,
            None => defaults.endpoint,
        };

        let config = StreamConfig {
            endpoint,
            ping_interval: self
                .ping_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.ping_interval),
            reconnect: ReconnectPolicy {
                step: self
                    .reconnect_step_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reconnect.step),
                max_delay: self
                    .reconnect_max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reconnect.max_delay),
            },
            limits: StoreLimits {
                capacity: self.store_capacity.unwrap_or(defaults.limits.capacity),
                floor: self.store_floor.unwrap_or(defaults.limits.floor),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

pub fn load_config() -> Config {
    resolve(Config::parse())
}

/// Layers defaults, then the config file, then CLI/env values.
pub fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli)
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<Config>(&config_str) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"wsUrl":"wss://feed.example.org/ws","storeCapacity":50,"storeFloor":20,"boardRows":3}}"#
        )
        .unwrap();

        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            board_rows: Some(7),
            ..Default::default()
        };
        let config = resolve(cli);

        assert_eq!(config.ws_url.as_deref(), Some("wss://feed.example.org/ws"));
        assert_eq!(config.board_rows, Some(7));
        assert_eq!(config.log_level(), "info");

        let stream = config.stream_config().unwrap();
        assert_eq!(stream.limits, StoreLimits { capacity: 50, floor: 20 });
        assert_eq!(stream.ping_interval, Duration::from_secs(25));
        assert_eq!(stream.reconnect.delay_for(2), Duration::from_millis(2_000));
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "this is not json").unwrap();

        let config = resolve(Config {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        });
        let stream = config.stream_config().unwrap();
        assert_eq!(stream.limits, StoreLimits::default());
        assert_eq!(stream.endpoint.as_str(), "ws://127.0.0.1:3000/ws");
    }

    #[test]
    fn invalid_values_are_reported() {
        let config = Config {
            ws_url: Some("ftp://nope".into()),
            ..Default::default()
        };
        assert!(matches!(config.stream_config(), Err(ConfigError::UnsupportedScheme(_))));

        let config = Config {
            store_capacity: Some(10),
            store_floor: Some(10),
            ..Default::default()
        };
        assert!(matches!(config.stream_config(), Err(ConfigError::InvalidLimits { .. })));
    }
}
