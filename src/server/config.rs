use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub log_dir: String,
    /// Zone the terminals' local clocks run in.
    pub device_timezone: Tz,
    pub terminal_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub pull_interval_secs: Option<u64>,
    pub clear_after_pull: bool,
    pub max_db_connections: u32,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    listen_addr: Option<String>,
    log_dir: Option<String>,
    device_timezone: Option<String>,
    terminal_timeout_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
    pull_interval_secs: Option<u64>,
    clear_after_pull: Option<bool>,
    max_db_connections: Option<u32>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_device_timezone() -> Tz {
    chrono_tz::UTC
}

fn default_terminal_timeout_secs() -> u64 {
    5
}

fn default_probe_timeout_secs() -> u64 {
    3
}

fn default_max_db_connections() -> u32 {
    10
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) => Self::read_file(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn read_file(path: &Path) -> Result<PartialServerConfig, String> {
        if !path.exists() {
            return Ok(PartialServerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }

    fn merge(env: PartialServerConfig, file: PartialServerConfig) -> Result<Self, String> {
        let device_timezone = match env.device_timezone.or(file.device_timezone) {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| format!("DEVICE_TIMEZONE '{name}' is not a known time zone: {e}"))?,
            None => default_device_timezone(),
        };

        Ok(ServerConfig {
            database_url: env
                .database_url
                .or(file.database_url)
                .ok_or("DATABASE_URL is required")?,
            listen_addr: env
                .listen_addr
                .or(file.listen_addr)
                .unwrap_or_else(default_listen_addr),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            device_timezone,
            terminal_timeout_secs: env
                .terminal_timeout_secs
                .or(file.terminal_timeout_secs)
                .unwrap_or_else(default_terminal_timeout_secs),
            probe_timeout_secs: env
                .probe_timeout_secs
                .or(file.probe_timeout_secs)
                .unwrap_or_else(default_probe_timeout_secs),
            pull_interval_secs: env.pull_interval_secs.or(file.pull_interval_secs),
            clear_after_pull: env
                .clear_after_pull
                .or(file.clear_after_pull)
                .unwrap_or(false),
            max_db_connections: env
                .max_db_connections
                .or(file.max_db_connections)
                .unwrap_or_else(default_max_db_connections),
        })
    }

    pub fn terminal_timeout(&self) -> Duration {
        Duration::from_secs(self.terminal_timeout_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn pull_interval(&self) -> Option<Duration> {
        self.pull_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
