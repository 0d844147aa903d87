//! Configuration file discovery and setting resolution
//!
//! Config file priority:
//! 1. Command-line argument (highest priority)
//! 2. `MAF_CONFIG` environment variable
//! 3. `<config dir>/maf/<module>.toml` when it exists
//! 4. Built-in defaults (no file)
//!
//! Individual secrets (API credentials) are resolved separately with
//! [`resolve_setting`]: environment first, then TOML.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MAF_CONFIG";

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where a resolved setting came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingOrigin {
    /// Named environment variable
    Environment(String),
    /// TOML config file
    Toml,
}

/// A setting value together with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSetting {
    pub value: String,
    pub origin: SettingOrigin,
}

/// User-Agent string sent by every MAF HTTP client
pub fn get_user_agent() -> String {
    format!(
        "maf/{} (music artwork finder)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Validate a setting value (non-empty, non-whitespace)
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Locate the config file for `module_name`.
///
/// Returns `None` when no explicit path is given and no default file exists,
/// meaning built-in defaults apply.
pub fn resolve_config_path(cli_arg: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if is_valid_value(&path) {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    let default_path = dirs::config_dir()?
        .join("maf")
        .join(format!("{}.toml", module_name));
    default_path.exists().then_some(default_path)
}

/// Load a TOML config file, or defaults when `path` is `None`.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve a single setting from environment variables, then TOML.
///
/// `env_vars` are checked in order; the first valid one wins. Blank values
/// count as absent. Logs a warning when more than one source supplies a value.
pub fn resolve_setting(
    name: &str,
    env_vars: &[&str],
    toml_value: Option<&str>,
) -> Option<ResolvedSetting> {
    let mut candidates = Vec::new();

    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            if is_valid_value(&value) {
                candidates.push(ResolvedSetting {
                    value: value.trim().to_string(),
                    origin: SettingOrigin::Environment((*var).to_string()),
                });
            }
        }
    }

    if let Some(value) = toml_value {
        if is_valid_value(value) {
            candidates.push(ResolvedSetting {
                value: value.trim().to_string(),
                origin: SettingOrigin::Toml,
            });
        }
    }

    if candidates.len() > 1 {
        let origins: Vec<String> = candidates
            .iter()
            .map(|c| match &c.origin {
                SettingOrigin::Environment(var) => var.clone(),
                SettingOrigin::Toml => "TOML".to_string(),
            })
            .collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            origins.join(", "),
            origins[0]
        );
    }

    candidates.into_iter().next()
}
