//! Configuration file reading and parsing.
//!
//! This module handles locating, reading, and parsing INI-format configuration files,
//! with support for layered overrides.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use configparser::ini::Ini;
use thiserror::Error;

use super::{Config, FsiConfig, IdentityConfig, ReferenceConfig, RepoConfig, ResolveConfig};

// =============================================================================
// Constants - Default Values
// =============================================================================

const DEFAULT_REPO_DIRNAME: &str = ".dsvc";

const ENV_CONFIG_FILE: &str = "DSVC_CONFIG_FILE";
const DEFAULT_CONFIG_FILENAME: &str = ".dsvcconfig";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid value '{value}' for '{key}': {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("invalid override key '{key}': {message}")]
    InvalidOverrideKey { key: String, message: String },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate and layer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from CLI. If specified and doesn't exist, error.
    /// If None, fall back to DSVC_CONFIG_FILE env var, then ~/.dsvcconfig.
    pub config_file: Option<PathBuf>,

    /// Additional override config file (layered on top of base config).
    pub override_file: Option<PathBuf>,

    /// Individual key=value overrides (applied last).
    /// Keys use dot-notation: "repo.path", "identity.username"
    pub overrides: Vec<(String, String)>,
}

// =============================================================================
// Value Parsing
// =============================================================================

/// Parse a value with its `FromStr` impl, attributing failures to `key`.
fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|message| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message,
    })
}

// =============================================================================
// Config File Resolution
// =============================================================================

/// Information about how the config file was resolved.
#[derive(Debug)]
pub struct ResolvedConfigFile {
    /// The path to the config file, if one was found.
    pub path: Option<PathBuf>,
    /// Warning message if env var pointed to nonexistent file.
    pub warning: Option<String>,
}

/// Resolve which config file to use based on the ConfigSource and environment.
fn resolve_config_file(source: &ConfigSource) -> Result<ResolvedConfigFile> {
    if let Some(ref path) = source.config_file {
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path.clone()),
                warning: None,
            });
        }
        return Err(ConfigError::FileNotFound(path.clone()));
    }

    if let Ok(env_path) = env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path),
                warning: None,
            });
        }
        // Warn but continue with defaults
        return Ok(ResolvedConfigFile {
            path: None,
            warning: Some(format!(
                "config file specified by {} does not exist: {}",
                ENV_CONFIG_FILE, env_path
            )),
        });
    }

    if let Some(home) = home_dir() {
        let default_path = home.join(DEFAULT_CONFIG_FILENAME);
        if default_path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(default_path),
                warning: None,
            });
        }
    }

    Ok(ResolvedConfigFile {
        path: None,
        warning: None,
    })
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

// =============================================================================
// Default Config
// =============================================================================

/// Create a Config with all default values.
fn default_config() -> Config {
    let repo_path = home_dir()
        .map(|home| home.join(DEFAULT_REPO_DIRNAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPO_DIRNAME));

    Config {
        repo: RepoConfig {
            path: repo_path,
            store: Default::default(),
        },
        identity: IdentityConfig::default(),
        reference: ReferenceConfig::default(),
        resolve: ResolveConfig::default(),
        fsi: FsiConfig::default(),
    }
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Apply an INI file's contents to a Config, layering on top of existing values.
fn apply_ini_to_config(config: &mut Config, ini: &Ini) -> Result<()> {
    for section in ["repo", "identity", "reference", "resolve", "fsi"] {
        let Some(keys) = ini.get_map_ref().get(section) else {
            continue;
        };
        for (key, value) in keys {
            if let Some(value) = value {
                apply_setting(config, section, key, value)?;
            }
        }
    }
    Ok(())
}

/// Load and parse an INI file.
fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e,
    })?;
    Ok(ini)
}

// =============================================================================
// Override Application
// =============================================================================

/// Apply a single `section.key=value` override to the config.
fn apply_override(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key.split_once('.') {
        Some((section, param)) if !param.contains('.') => {
            apply_setting(config, section, param, value)
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "expected the form section.key".to_string(),
        }),
    }
}

/// Apply one setting, from either an INI file or an override.
fn apply_setting(config: &mut Config, section: &str, param: &str, value: &str) -> Result<()> {
    let key = format!("{}.{}", section, param);
    let value = value.trim();

    match (section, param) {
        ("repo", "path") => config.repo.path = PathBuf::from(value),
        ("repo", "store") => config.repo.store = parse_value(&key, value)?,
        ("identity", "username") => {
            config.identity.username = (!value.is_empty()).then(|| value.to_string());
        }
        ("reference", "bad_case") => config.reference.bad_case = parse_value(&key, value)?,
        ("resolve", "mode") => config.resolve.mode = value.to_string(),
        ("fsi", "meta_format") => config.fsi.meta_format = parse_value(&key, value)?,
        ("fsi", "body_format") => config.fsi.body_format = parse_value(&key, value)?,
        _ => {
            return Err(ConfigError::InvalidOverrideKey {
                key,
                message: "unknown parameter".to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Result of reading configuration, including any warnings.
#[derive(Debug)]
pub struct ConfigResult {
    /// The parsed configuration.
    pub config: Config,
    /// Any warnings generated during config loading.
    pub warnings: Vec<String>,
}

/// Read and parse configuration from the specified sources.
///
/// Configuration is layered in this order:
/// 1. Built-in defaults
/// 2. Base config file (from CLI, env var, or ~/.dsvcconfig)
/// 3. Override config file (if specified)
/// 4. Individual overrides (applied last)
pub fn read_config(source: &ConfigSource) -> Result<ConfigResult> {
    let mut warnings = Vec::new();

    let mut config = default_config();

    let resolved = resolve_config_file(source)?;
    if let Some(warning) = resolved.warning {
        warnings.push(warning);
    }
    if let Some(ref path) = resolved.path {
        let ini = load_ini(path)?;
        apply_ini_to_config(&mut config, &ini)?;
    }

    if let Some(ref override_path) = source.override_file {
        if !override_path.exists() {
            return Err(ConfigError::FileNotFound(override_path.clone()));
        }
        let ini = load_ini(override_path)?;
        apply_ini_to_config(&mut config, &ini)?;
    }

    for (key, value) in &source.overrides {
        apply_override(&mut config, key, value)?;
    }

    Ok(ConfigResult { config, warnings })
}

// =============================================================================
// Tests
// =============================================================================
