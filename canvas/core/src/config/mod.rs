//! TOML Configuration File Support
//!
//! Centralized configuration loading for a canvas session, supporting a
//! TOML configuration file at `~/.config/canvas/canvas.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/canvas/canvas.toml` (typically `~/.config/canvas/canvas.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [validation]
//! max_depth = 32
//! max_input_bytes = 1048576
//!
//! [canvas]
//! duplicate_policy = "replace"   # or "strict"
//! max_instances = 0              # 0 = unlimited
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Setting |
//! |---|---|
//! | `CANVAS_MAX_DEPTH` | `validation.max_depth` |
//! | `CANVAS_MAX_INPUT_BYTES` | `validation.max_input_bytes` |
//! | `CANVAS_DUPLICATE_POLICY` | `canvas.duplicate_policy` |
//! | `CANVAS_MAX_INSTANCES` | `canvas.max_instances` |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canvas::DuplicatePolicy;
use crate::session::SessionOptions;
use crate::validate::ValidationLimits;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Validation section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationToml {
    /// Maximum component nesting depth
    pub max_depth: Option<usize>,

    /// Maximum size of textual input in bytes
    pub max_input_bytes: Option<usize>,
}

/// Canvas section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSectionToml {
    /// Policy for re-admitted component ids
    pub duplicate_policy: Option<DuplicatePolicy>,

    /// Maximum number of canvas instances (0 = unlimited)
    pub max_instances: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasToml {
    /// Validation configuration section
    pub validation: ValidationToml,

    /// Canvas configuration section
    pub canvas: CanvasSectionToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for a canvas session
///
/// Use [`load_config`] to load configuration with proper priority handling,
/// then [`CanvasConfigFile::session_options`] to build a session.
#[derive(Clone, Debug)]
pub struct CanvasConfigFile {
    /// Validator limits
    pub limits: ValidationLimits,

    /// Policy for re-admitted component ids
    pub duplicate_policy: DuplicatePolicy,

    /// Maximum number of canvas instances (0 = unlimited)
    pub max_instances: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for CanvasConfigFile {
    fn default() -> Self {
        Self {
            limits: ValidationLimits::default(),
            duplicate_policy: DuplicatePolicy::Replace,
            max_instances: 0,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl CanvasConfigFile {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Options for [`Session::new`](crate::session::Session::new)
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            limits: self.limits,
            duplicate_policy: self.duplicate_policy,
            max_instances: self.max_instances,
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a zero depth or input limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.limits.max_input_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_input_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/canvas/canvas.toml` or
/// `~/.config/canvas/canvas.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("canvas").join("canvas.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the merged values are out of range. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<CanvasConfigFile, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<CanvasConfigFile, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration, reading environment variables through `env`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<CanvasConfigFile, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Start with defaults
    let mut config = CanvasConfigFile::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: CanvasToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config, env);

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut CanvasConfigFile, toml: &CanvasToml) {
    // Validation settings
    if let Some(depth) = toml.validation.max_depth {
        config.limits.max_depth = depth;
    }
    if let Some(bytes) = toml.validation.max_input_bytes {
        config.limits.max_input_bytes = bytes;
    }

    // Canvas settings
    if let Some(policy) = toml.canvas.duplicate_policy {
        config.duplicate_policy = policy;
    }
    if let Some(max) = toml.canvas.max_instances {
        config.max_instances = max;
    }
}

/// Apply environment variable overrides to the config
///
/// Unparseable values are ignored with a warning.
fn apply_env_config<F>(config: &mut CanvasConfigFile, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(depth) = env("CANVAS_MAX_DEPTH") {
        match depth.parse::<usize>() {
            Ok(d) => {
                config.limits.max_depth = d;
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %depth, "Ignoring invalid CANVAS_MAX_DEPTH"),
        }
    }
    if let Some(bytes) = env("CANVAS_MAX_INPUT_BYTES") {
        match bytes.parse::<usize>() {
            Ok(b) => {
                config.limits.max_input_bytes = b;
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %bytes, "Ignoring invalid CANVAS_MAX_INPUT_BYTES"),
        }
    }
    if let Some(policy) = env("CANVAS_DUPLICATE_POLICY") {
        match policy.parse::<DuplicatePolicy>() {
            Ok(p) => {
                config.duplicate_policy = p;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid CANVAS_DUPLICATE_POLICY"),
        }
    }
    if let Some(max) = env("CANVAS_MAX_INSTANCES") {
        match max.parse::<usize>() {
            Ok(m) => {
                config.max_instances = m;
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %max, "Ignoring invalid CANVAS_MAX_INSTANCES"),
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides,
/// then call [`CanvasConfigFile::validate`] again.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Max depth override
    pub max_depth: Option<usize>,

    /// Max input bytes override
    pub max_input_bytes: Option<usize>,

    /// Duplicate policy override
    pub duplicate_policy: Option<DuplicatePolicy>,

    /// Max instances override
    pub max_instances: Option<usize>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max depth override
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set max input bytes override
    #[must_use]
    pub fn with_max_input_bytes(mut self, bytes: usize) -> Self {
        self.max_input_bytes = Some(bytes);
        self
    }

    /// Set duplicate policy override
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = Some(policy);
        self
    }

    /// Set max instances override
    #[must_use]
    pub fn with_max_instances(mut self, max: usize) -> Self {
        self.max_instances = Some(max);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut CanvasConfigFile) {
        if self.max_depth.is_some()
            || self.max_input_bytes.is_some()
            || self.duplicate_policy.is_some()
            || self.max_instances.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(depth) = self.max_depth {
            config.limits.max_depth = depth;
        }
        if let Some(bytes) = self.max_input_bytes {
            config.limits.max_input_bytes = bytes;
        }
        if let Some(policy) = self.duplicate_policy {
            config.duplicate_policy = policy;
        }
        if let Some(max) = self.max_instances {
            config.max_instances = max;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = CanvasConfigFile::default();

        assert_eq!(config.limits.max_depth, 32);
        assert_eq!(config.limits.max_input_bytes, 1_048_576);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.max_instances, 0);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        // Depends on environment
        if let Some(p) = path {
            assert!(p.ends_with("canvas/canvas.toml"));
        }
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_valid_toml() {
        let file = toml_file(
            r#"
[validation]
max_depth = 8
max_input_bytes = 4096

[canvas]
duplicate_policy = "strict"
max_instances = 20
"#,
        );

        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(config.limits.max_depth, 8);
        assert_eq!(config.limits.max_input_bytes, 4096);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Strict);
        assert_eq!(config.max_instances, 20);
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path, Some(file.path().to_path_buf()));
    }

    #[test]
    fn test_parse_partial_toml() {
        let file = toml_file("[canvas]\nmax_instances = 3\n");
        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(config.max_instances, 3);
        assert_eq!(config.limits.max_depth, 32);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
    }

    #[test]
    fn test_parse_empty_toml() {
        let file = toml_file("");
        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();
        assert_eq!(config.limits, ValidationLimits::default());
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_missing_file_graceful() {
        let config = load_config_with_env(
            Some(PathBuf::from("/nonexistent/path/canvas.toml")),
            no_env,
        )
        .unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = toml_file("[validation\nmax_depth = ");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_unknown_policy_in_toml_is_parse_error() {
        let file = toml_file("[canvas]\nduplicate_policy = \"merge\"\n");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let file = toml_file("[validation]\nmax_depth = 0\n");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    // =========================================================================
    // Priority Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file("[validation]\nmax_depth = 8\n\n[canvas]\nmax_instances = 5\n");
        let env = env_from(&[("CANVAS_MAX_DEPTH", "12"), ("CANVAS_DUPLICATE_POLICY", "strict")]);

        let config = load_config_with_env(Some(file.path().to_path_buf()), env).unwrap();

        assert_eq!(config.limits.max_depth, 12);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Strict);
        assert_eq!(config.max_instances, 5);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_invalid_env_ignored() {
        let env = env_from(&[
            ("CANVAS_MAX_INSTANCES", "lots"),
            ("CANVAS_DUPLICATE_POLICY", "merge"),
        ]);
        let config = load_config_with_env(None, env).unwrap();
        assert_eq!(config.max_instances, 0);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides_env() {
        let env = env_from(&[("CANVAS_MAX_DEPTH", "12"), ("CANVAS_MAX_INSTANCES", "9")]);
        let mut config = load_config_with_env(None, env).unwrap();

        ConfigOverrides::new().with_max_depth(4).apply(&mut config);

        assert_eq!(config.limits.max_depth, 4);
        assert_eq!(config.max_instances, 9);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_config_overrides_empty_no_change() {
        let mut config = CanvasConfigFile::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.limits, ValidationLimits::default());
    }

    #[test]
    fn test_config_overrides_builder() {
        let overrides = ConfigOverrides::new()
            .with_max_input_bytes(10)
            .with_duplicate_policy(DuplicatePolicy::Strict)
            .with_max_instances(2);
        let mut config = CanvasConfigFile::default();
        overrides.apply(&mut config);

        let options = config.session_options();
        assert_eq!(options.limits.max_input_bytes, 10);
        assert_eq!(options.duplicate_policy, DuplicatePolicy::Strict);
        assert_eq!(options.max_instances, 2);
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }

    #[test]
    fn test_toml_round_trip() {
        let toml = CanvasToml {
            validation: ValidationToml {
                max_depth: Some(16),
                max_input_bytes: None,
            },
            canvas: CanvasSectionToml {
                duplicate_policy: Some(DuplicatePolicy::Strict),
                max_instances: Some(7),
            },
        };
        let text = toml::to_string(&toml).unwrap();
        assert!(text.contains("duplicate_policy = \"strict\""));

        let parsed: CanvasToml = toml::from_str(&text).unwrap();
        assert_eq!(parsed.validation.max_depth, Some(16));
        assert_eq!(parsed.canvas.max_instances, Some(7));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ValidationError("max_depth must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: max_depth must be at least 1"
        );
    }
}
