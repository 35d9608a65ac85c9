use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceTreeError};
use crate::time::parse_duration_str;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub workers: usize,
    pub write_batch_size: usize,
    pub write_flush_ms: u64,
    pub channel_capacity: usize,
    pub default_window: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_root = env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(home).join(".local/share"));

        Self {
            db_path: data_root.join("tracetree/tracetree.duckdb"),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            write_batch_size: 512,
            write_flush_ms: 200,
            channel_capacity: 64,
            default_window: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(file_overrides) = load_file_overrides(&config_file_path())? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(TraceTreeError::Config("workers must be at least 1".to_string()));
        }
        if self.write_batch_size == 0 {
            return Err(TraceTreeError::Config(
                "write_batch_size must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(TraceTreeError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.write_flush_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    db_path: Option<PathBuf>,
    workers: Option<usize>,
    write_batch_size: Option<usize>,
    write_flush_ms: Option<u64>,
    channel_capacity: Option<usize>,
    default_window: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACETREE_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracetree/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TraceTreeError::Config(format!("failed reading {}: {e}", path.display())))?;
    parse_file_overrides(&raw)
        .map(Some)
        .map_err(|e| TraceTreeError::Config(format!("failed parsing {}: {e}", path.display())))
}

fn parse_file_overrides(raw: &str) -> std::result::Result<ConfigOverrides, toml::de::Error> {
    toml::from_str(raw)
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        db_path: env::var("TRACETREE_DB_PATH").ok().map(PathBuf::from),
        workers: env_number("TRACETREE_WORKERS")?,
        write_batch_size: env_number("TRACETREE_WRITE_BATCH_SIZE")?,
        write_flush_ms: env_number("TRACETREE_WRITE_FLUSH_MS")?,
        channel_capacity: None,
        default_window: env::var("TRACETREE_DEFAULT_WINDOW").ok(),
    })
}

fn env_number<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| TraceTreeError::Config(format!("bad {key} in environment: {e}"))),
        Err(_) => Ok(None),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.workers {
        cfg.workers = v;
    }
    if let Some(v) = overrides.write_batch_size {
        cfg.write_batch_size = v;
    }
    if let Some(v) = overrides.write_flush_ms {
        cfg.write_flush_ms = v;
    }
    if let Some(v) = overrides.channel_capacity {
        cfg.channel_capacity = v;
    }
    if let Some(v) = overrides.default_window {
        cfg.default_window = parse_window_setting(&v).map_err(|e| {
            TraceTreeError::Config(format!("bad default_window in {source}: {e}"))
        })?;
    }
    Ok(())
}

/// `"off"`/`"all"`/empty disable the default window; anything else is a humantime duration.
fn parse_window_setting(raw: &str) -> Result<Option<Duration>> {
    match raw.trim() {
        "" | "off" | "all" => Ok(None),
        v => parse_duration_str(v).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.workers >= 1);
        assert_eq!(cfg.write_batch_size, 512);
        assert_eq!(cfg.flush_interval(), Duration::from_millis(200));
        assert_eq!(cfg.default_window, None);
        assert!(cfg.db_path.ends_with("tracetree/tracetree.duckdb"));
    }

    #[test]
    fn file_overrides_apply() {
        let file = parse_file_overrides(
            r#"
db_path = "/tmp/tt.duckdb"
workers = 3
write_batch_size = 16
default_window = "24h"
"#,
        )
        .unwrap();

        let mut cfg = Config::default();
        apply_overrides(&mut cfg, file, "config file").unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/tt.duckdb"));
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.write_batch_size, 16);
        assert_eq!(cfg.default_window, Some(Duration::from_secs(86_400)));
        assert_eq!(cfg.write_flush_ms, 200);
    }

    #[test]
    fn later_source_can_disable_window() {
        let mut cfg = Config {
            default_window: Some(Duration::from_secs(60)),
            ..Config::default()
        };
        let env = ConfigOverrides {
            default_window: Some("off".to_string()),
            ..ConfigOverrides::default()
        };
        apply_overrides(&mut cfg, env, "environment").unwrap();
        assert_eq!(cfg.default_window, None);
    }

    #[test]
    fn window_setting_accepts_compound_durations() {
        assert_eq!(
            parse_window_setting(" 1h 30m ").unwrap(),
            Some(Duration::from_secs(5_400))
        );
        assert_eq!(parse_window_setting("all").unwrap(), None);
        assert!(parse_window_setting("-5m").is_err());
    }

    #[test]
    fn bad_window_names_its_source() {
        let mut cfg = Config::default();
        let env = ConfigOverrides {
            default_window: Some("whenever".to_string()),
            ..ConfigOverrides::default()
        };
        let err = apply_overrides(&mut cfg, env, "environment").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("environment"), "{msg}");
        assert!(msg.contains("invalid duration whenever"), "{msg}");
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let cfg = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
