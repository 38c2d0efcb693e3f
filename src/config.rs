//! Worker configuration: cache names, API patterns, seed manifest.
//!
//! The original worker kept these as module-level globals; here they
//! are injected at construction so hosts and tests can swap them.

use color_eyre::{eyre::eyre, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// Configuration injected into the worker at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
  /// Generation tag naming the current static-asset partition. A new
  /// tag per release makes the activation sweep drop older generations.
  pub static_generation: String,
  /// Fixed name of the API data partition. Exempt from the activation
  /// sweep.
  pub data_cache_name: String,
  /// Requests whose URL matches any of these patterns are handled
  /// network-first; everything else is cache-first.
  #[serde(default, deserialize_with = "deserialize_patterns")]
  pub api_patterns: Vec<Regex>,
  /// App-shell resources seeded into the static partition at install.
  #[serde(default)]
  pub seed_resources: Vec<String>,
  /// Origin used to recognize the app's own window clients.
  #[serde(default = "default_origin")]
  pub origin: String,
}

impl WorkerConfig {
  /// Built-in configuration matching the deployed farmer market app.
  pub fn farmer_market() -> Result<Self> {
    Ok(Self {
      static_generation: "farmer-market-v1".to_string(),
      data_cache_name: "farmer-market-data-v1".to_string(),
      api_patterns: compile_patterns(&[
        r"api\.openweathermap\.org",
        r"agmarknet\.gov\.in",
        r"data\.gov\.in",
      ])?,
      seed_resources: vec![
        "/".to_string(),
        "/static/manifest.json".to_string(),
        "/static/icon-192.png".to_string(),
        "/static/icon-512.png".to_string(),
      ],
      origin: default_origin(),
    })
  }

  /// Load configuration from a YAML file.
  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: WorkerConfig = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

fn compile_patterns(patterns: &[&str]) -> Result<Vec<Regex>> {
  patterns
    .iter()
    .map(|p| Regex::new(p).map_err(|e| eyre!("Invalid API pattern '{}': {}", p, e)))
    .collect()
}

fn deserialize_patterns<'de, D>(deserializer: D) -> Result<Vec<Regex>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let raw: Vec<String> = Vec::deserialize(deserializer)?;
  raw
    .iter()
    .map(|p| Regex::new(p).map_err(serde::de::Error::custom))
    .collect()
}

fn default_origin() -> String {
  "http://localhost:8501".to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_farmer_market_defaults() {
    let config = WorkerConfig::farmer_market().unwrap();

    assert_eq!(config.static_generation, "farmer-market-v1");
    assert_eq!(config.data_cache_name, "farmer-market-data-v1");
    assert_eq!(config.seed_resources.len(), 4);
    assert!(config
      .api_patterns
      .iter()
      .any(|p| p.is_match("https://api.openweathermap.org/data/2.5/weather")));
  }

  #[test]
  fn test_parse_yaml_config() {
    let yaml = r#"
static_generation: farmer-market-v2
data_cache_name: farmer-market-data-v1
api_patterns:
  - 'agmarknet\.gov\.in'
seed_resources:
  - /
  - /static/manifest.json
"#;
    let config: WorkerConfig = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(config.static_generation, "farmer-market-v2");
    assert!(config.api_patterns[0].is_match("https://agmarknet.gov.in/prices"));
    assert_eq!(config.origin, "http://localhost:8501");
  }

  #[test]
  fn test_invalid_pattern_is_a_parse_error() {
    let yaml = r#"
static_generation: v1
data_cache_name: data
api_patterns:
  - '(unclosed'
"#;
    assert!(serde_yaml::from_str::<WorkerConfig>(yaml).is_err());
  }
}
