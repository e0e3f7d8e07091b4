//! Layered configuration for the CLI: defaults, then the TOML file, then
//! `PIXCACHE_`-prefixed environment variables

use crate::paths;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use pixcache_core::CacheConfig;
use std::fs;
use std::path::PathBuf;

/// Configuration manager that handles XDG-compliant paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with default XDG-compliant paths
    pub fn new() -> Self {
        Self {
            config_path: paths::get_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    pub fn load(&self) -> Result<CacheConfig> {
        let mut figment = Figment::new();

        // Layer 1: Defaults
        figment = figment.merge(Serialized::defaults(CacheConfig::default()));

        // Layer 2: Config file (if exists)
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        // Layer 3: Environment variables
        figment = figment.merge(Env::prefixed("PIXCACHE_").split("__"));

        let config: CacheConfig = figment.extract().context("Failed to load configuration")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        let value = self.as_toml()?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        Ok(render_value(current))
    }

    /// Set a configuration value by key (dot notation)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed_value = parse_config_value(key, value)?;

        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, sections)) = parts.split_last() else {
            anyhow::bail!("Empty key");
        };

        let mut current = &mut config;
        for part in sections {
            let toml::Value::Table(table) = current else {
                anyhow::bail!("Invalid key path: expected table at '{}'", part);
            };
            current = table
                .entry(part.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        }
        let toml::Value::Table(table) = current else {
            anyhow::bail!("Cannot set value on non-table");
        };
        table.insert(last.to_string(), parsed_value);

        // Reject values that would leave the file unloadable
        let candidate: CacheConfig = Figment::new()
            .merge(Serialized::defaults(CacheConfig::default()))
            .merge(Toml::string(&toml::to_string(&config)?))
            .extract()
            .with_context(|| format!("'{value}' is not a valid value for {key}"))?;
        candidate.validate()?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, toml::to_string_pretty(&config)?)?;

        Ok(())
    }

    /// List all configuration values
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let value = self.as_toml()?;

        let mut items = Vec::new();
        collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn as_toml(&self) -> Result<toml::Value> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        Ok(toml::from_str(&toml_string)?)
    }
}

/// Recursively collect all leaf key-value pairs from TOML. Single-key tables
/// such as `expiration = { days = 7 }` are shown as one value.
fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) if prefix.is_empty() || table.len() > 1 => {
            for (key, val) in table {
                let new_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_values(val, new_prefix, items);
            }
        }
        toml::Value::Array(_) => {}
        other => items.push((prefix, render_value(other))),
    }
}

fn render_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(table) if table.len() == 1 => table
            .iter()
            .map(|(unit, amount)| format!("{} {unit}", render_value(amount)))
            .collect(),
        other => other.to_string(),
    }
}

/// Parse a value to the TOML type its key expects
fn parse_config_value(key: &str, value: &str) -> Result<toml::Value> {
    match key {
        k if k.ends_with("_bytes") || k.ends_with("_secs") || k.ends_with("_seconds") => {
            let num: i64 = value.parse().context("Expected integer value")?;
            if num < 0 {
                anyhow::bail!("{key} must not be negative");
            }
            Ok(toml::Value::Integer(num))
        }
        k if k.ends_with(".expiration") => parse_expiration(value),
        _ => Ok(toml::Value::String(value.to_string())),
    }
}

/// Accepts `never`, `expired`, or an amount with a unit suffix such as `30m`
fn parse_expiration(value: &str) -> Result<toml::Value> {
    let value = value.trim();
    match value {
        "never" | "expired" => return Ok(toml::Value::String(value.to_string())),
        _ => {}
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow::anyhow!("Expiration '{value}' needs a unit (s, m, h or d)"))?;
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount
        .parse()
        .with_context(|| format!("Invalid expiration amount in '{value}'"))?;
    let unit = match unit {
        "s" => "seconds",
        "m" => "minutes",
        "h" => "hours",
        "d" => "days",
        other => anyhow::bail!("Unknown expiration unit '{other}' (use s, m, h or d)"),
    };

    let mut table = toml::map::Map::new();
    table.insert(unit.to_string(), toml::Value::Integer(amount));
    Ok(toml::Value::Table(table))
}

/// Get the configuration from the default location
pub fn get_config() -> Result<CacheConfig> {
    ConfigManager::new().load()
}
