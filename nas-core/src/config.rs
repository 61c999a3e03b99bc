//! Configuration file management for nas-sim.
//!
//! Reads/writes `~/.nas-sim/config.yaml` with simulation settings, the
//! adaptation database path, and the log level.

use std::path::{Path, PathBuf};

use crate::types::{NasError, Result};

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Leading two octal digits of the local code bank.
    pub beacon_bank: u16,
    pub tick_seconds: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            simulation: SimulationConfig {
                beacon_bank: 0o52,
                tick_seconds: 1,
            },
            database: DatabaseConfig {
                path: "data/nas.json".into(),
            },
            logging: LoggingConfig {
                level: "info".into(),
            },
        }
    }
}

/// Get the config directory path (`~/.nas-sim/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".nas-sim")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.nas-sim/config.yaml`.
///
/// Returns default config if file doesn't exist.
pub fn load_config() -> Config {
    load_config_from(&config_file())
}

pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_config(&text),
        Err(_) => Config::default(),
    }
}

/// Save config to `~/.nas-sim/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| NasError::Config(e.to_string()))?;
    }
    std::fs::write(path, serialize_config(config)).map_err(|e| NasError::Config(e.to_string()))
}

/// Parse simple YAML-like config text. Unknown keys and bad values keep the
/// defaults.
fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');
        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }
        let Some(section) = current_section.as_deref() else {
            continue;
        };

        match (section, key) {
            ("simulation", "beacon_bank") => {
                if let Some(bank) = parse_string_value(val)
                    .and_then(|v| u16::from_str_radix(&v, 8).ok())
                    .filter(|b| *b <= 0o77)
                {
                    config.simulation.beacon_bank = bank;
                }
            }
            ("simulation", "tick_seconds") => {
                if let Some(v) = val.parse::<u32>().ok().filter(|v| *v > 0) {
                    config.simulation.tick_seconds = v;
                }
            }
            ("database", "path") => {
                if let Some(v) = parse_string_value(val) {
                    config.database.path = v;
                }
            }
            ("logging", "level") => {
                if let Some(v) = parse_string_value(val) {
                    config.logging.level = v;
                }
            }
            _ => {}
        }
    }

    config
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

/// Serialize config to YAML-like text.
fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# nas-sim configuration".to_string(), String::new()];

    lines.push("simulation:".into());
    lines.push(format!("  beacon_bank: \"{:02o}\"", config.simulation.beacon_bank));
    lines.push(format!("  tick_seconds: {}", config.simulation.tick_seconds));
    lines.push(String::new());

    lines.push("database:".into());
    lines.push(format!("  path: \"{}\"", config.database.path));
    lines.push(String::new());

    lines.push("logging:".into());
    lines.push(format!("  level: \"{}\"", config.logging.level));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.simulation.beacon_bank, 0o52);
        assert_eq!(config.simulation.tick_seconds, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
simulation:
  beacon_bank: "43"
  tick_seconds: 5

database:
  path: "/tmp/nas.json"

logging:
  level: "nas_core=debug"
"#;
        let config = parse_config(text);
        assert_eq!(config.simulation.beacon_bank, 0o43);
        assert_eq!(config.simulation.tick_seconds, 5);
        assert_eq!(config.database.path, "/tmp/nas.json");
        assert_eq!(config.logging.level, "nas_core=debug");
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let text = r#"
simulation:
  beacon_bank: 89
  tick_seconds: 0
database:
  path: null
"#;
        let config = parse_config(text);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config_from(&dir.path().join("nope.yaml")), Config::default());
    }

    #[test]
    fn test_roundtrip() {
        let config = Config {
            simulation: SimulationConfig {
                beacon_bank: 0o05,
                tick_seconds: 10,
            },
            database: DatabaseConfig {
                path: "world.json".into(),
            },
            logging: LoggingConfig {
                level: "warn".into(),
            },
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.yaml");
        save_config_to(&config, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("beacon_bank: \"05\""));
        assert_eq!(load_config_from(&path), config);
    }
}
