//! Layered configuration
//!
//! Precedence, lowest to highest: built-in defaults, a `foundry.toml`
//! discovered from the working directory upward, environment variables, CLI
//! flags. The file and every layer above it are optional; a bare environment
//! with provider credentials is a complete configuration.

use foundry_client::PhaseConfigs;
use foundry_utils::error::ConfigIssue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the configuration file searched for.
pub const CONFIG_FILE_NAME: &str = "foundry.toml";

/// `foundry.toml` schema. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Per-phase provider/model pairs
    #[serde(default)]
    pub phases: Option<PhaseConfigsToml>,
    /// Model routing section
    #[serde(default)]
    pub routing: Option<RoutingToml>,
    /// Response cache section
    #[serde(default)]
    pub cache: Option<CacheToml>,
    /// Generation parameters
    #[serde(default)]
    pub generation: Option<GenerationToml>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseConfigsToml {
    pub scout_provider: Option<String>,
    pub scout_model: Option<String>,
    pub architect_provider: Option<String>,
    pub architect_model: Option<String>,
    pub builder_provider: Option<String>,
    pub builder_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingToml {
    pub enabled: Option<bool>,
    pub default_model: Option<String>,
    pub complex_model: Option<String>,
    pub complexity_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheToml {
    pub enabled: Option<bool>,
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationToml {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Effective configuration after layering.
#[derive(Debug, Clone)]
pub struct Config {
    pub phases: PhaseConfigs,
    pub cache_enabled: bool,
    pub cache_ttl_hours: i64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Where the config file was found, if anywhere
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Discover and layer configuration starting from `start_dir`.
    ///
    /// # Errors
    /// Returns `ConfigIssue::FileError` when a config file exists but does
    /// not parse; a missing file is not an error.
    pub fn discover(start_dir: &Path) -> Result<Self, ConfigIssue> {
        let (file, config_path) = match find_config_file(start_dir) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|e| ConfigIssue::FileError {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                let parsed: ConfigFile =
                    toml::from_str(&raw).map_err(|e| ConfigIssue::FileError {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                debug!(path = %path.display(), "loaded configuration file");
                (parsed, Some(path))
            }
            None => (ConfigFile::default(), None),
        };

        let base = phase_configs_from_file(file.phases.as_ref());
        let phases = PhaseConfigs::from_env(base);

        let cache_enabled = file
            .cache
            .as_ref()
            .and_then(|c| c.enabled)
            .unwrap_or(true);
        let cache_ttl_hours = file
            .cache
            .as_ref()
            .and_then(|c| c.ttl_hours)
            .unwrap_or(foundry_cache::DEFAULT_TTL_HOURS);

        let max_tokens = file
            .generation
            .as_ref()
            .and_then(|g| g.max_tokens)
            .unwrap_or(foundry_client::DEFAULT_MAX_TOKENS);
        let temperature = file
            .generation
            .as_ref()
            .and_then(|g| g.temperature)
            .unwrap_or(foundry_client::DEFAULT_TEMPERATURE);

        Ok(Self {
            phases,
            cache_enabled,
            cache_ttl_hours,
            max_tokens,
            temperature,
            config_path,
        })
    }
}

/// Walk upward from `start_dir` looking for `foundry.toml`.
fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

/// Apply the `[phases]` file section over the built-in defaults.
fn phase_configs_from_file(section: Option<&PhaseConfigsToml>) -> PhaseConfigs {
    let mut configs = PhaseConfigs::default();
    let Some(section) = section else {
        return configs;
    };

    if let Some(provider) = &section.scout_provider {
        configs.scout.provider = provider.clone();
    }
    if let Some(model) = &section.scout_model {
        configs.scout.model = model.clone();
    }
    if let Some(provider) = &section.architect_provider {
        configs.architect.provider = provider.clone();
    }
    if let Some(model) = &section.architect_model {
        configs.architect.model = model.clone();
    }
    if let Some(provider) = &section.builder_provider {
        configs.builder.provider = provider.clone();
    }
    if let Some(model) = &section.builder_model {
        configs.builder.model = model.clone();
    }
    configs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert!(config.config_path.is_none());
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl_hours, 168);
        assert_eq!(config.phases, PhaseConfigs::from_env(PhaseConfigs::default()));
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
[phases]
builder_provider = "openai"
builder_model = "gpt-4o"

[cache]
ttl_hours = 24

[generation]
max_tokens = 4096
"#,
        )
        .unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert!(config.config_path.is_some());
        assert_eq!(config.phases.builder.provider, "openai");
        assert_eq!(config.phases.builder.model, "gpt-4o");
        assert_eq!(config.cache_ttl_hours, 24);
        assert_eq!(config.max_tokens, 4096);
        // Untouched phases keep defaults
        assert_eq!(config.phases.scout, PhaseConfigs::default().scout);
    }

    #[test]
    #[serial]
    fn test_discovery_walks_upward() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[cache]\nttl_hours = 1\n").unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let config = Config::discover(&nested).unwrap();
        assert_eq!(config.cache_ttl_hours, 1);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[phases]\nscout_provider = \"openai\"\nscout_model = \"gpt-4o-mini\"\n",
        )
        .unwrap();

        // SAFETY: serialized test; variables removed at the end.
        unsafe {
            std::env::set_var("SCOUT_PROVIDER", "gemini");
            std::env::set_var("SCOUT_MODEL", "gemini-2.0-flash");
        }
        let config = Config::discover(dir.path()).unwrap();
        unsafe {
            std::env::remove_var("SCOUT_PROVIDER");
            std::env::remove_var("SCOUT_MODEL");
        }

        assert_eq!(config.phases.scout.provider, "gemini");
        assert_eq!(config.phases.scout.model, "gemini-2.0-flash");
    }

    #[test]
    #[serial]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "not [valid toml").unwrap();
        let err = Config::discover(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigIssue::FileError { .. }));
    }
}
