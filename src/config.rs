//! Configuration management for the ingestion service
//!
//! Handles loading configuration from files and environment variables,
//! validation of all settings, and the per-run preconditions check on the
//! three required secrets.

use crate::IngestError;
use crate::auth::ProviderCredentials;
use crate::auth::token_provider::DEFAULT_TOKEN_URL;
use crate::models::Coordinate;
use crate::registry::{CoordinateRegistry, default_coordinates};
use crate::storage::DEFAULT_CONTAINER;
use crate::weather::request::DEFAULT_API_BASE_URL;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Environment variable holding the storage connection string
pub const STORAGE_CONNECTION_ENV: &str = "AZURE_STORAGE_CONNECTION_STRING";
/// Environment variable holding the Meteomatics account name
pub const USERNAME_ENV: &str = "METEOMATICS_USERNAME";
/// Environment variable holding the Meteomatics account password
pub const PASSWORD_ENV: &str = "METEOMATICS_PASSWORD";
/// Prefix for every other environment override, e.g. `METEOMATICS_INGEST__SCHEDULE__CRON`
pub const ENV_PREFIX: &str = "METEOMATICS_INGEST";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Blob storage settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Meteomatics API settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Run behaviour
    #[serde(default)]
    pub ingest: RunConfig,
    /// Trigger schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Points fetched on every run, in order
    #[serde(default = "default_coordinates")]
    pub coordinates: Vec<Coordinate>,
}

/// Blob storage configuration settings
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage connection string (required per run)
    pub connection_string: Option<String>,
    /// Destination container
    #[serde(default = "default_container")]
    pub container: String,
    /// Upload timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

/// Meteomatics API configuration settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Account name (required per run)
    pub username: Option<String>,
    /// Account password (required per run)
    pub password: Option<String>,
    /// Token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Data API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// How long an acquired token is used
    #[serde(default)]
    pub token_reuse: TokenReuse,
}

/// Token lifetime policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenReuse {
    /// Fresh token for every coordinate
    #[default]
    PerCoordinate,
    /// One token for the whole run
    PerRun,
}

/// Run behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Coordinates processed at once; 1 keeps runs strictly sequential
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

/// Trigger schedule settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression evaluated in UTC (sec min hour dom month dow)
    #[serde(default = "default_cron")]
    pub cron: String,
    /// Run once immediately at startup
    #[serde(default)]
    pub run_on_start: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_max_concurrency() -> usize {
    1
}

fn default_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            container: default_container(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            timeout_seconds: default_timeout(),
            token_reuse: TokenReuse::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            run_on_start: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            provider: ProviderConfig::default(),
            ingest: RunConfig::default(),
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
            coordinates: default_coordinates(),
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("connection_string", &redact(self.connection_string.as_deref()))
            .field("container", &self.container)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("username", &self.username)
            .field("password", &redact(self.password.as_deref()))
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("token_reuse", &self.token_reuse)
            .finish()
    }
}

fn redact(value: Option<&str>) -> Option<&'static str> {
    value.map(|_| "<redacted>")
}

/// Secrets that passed the preconditions check for one run
#[derive(Clone)]
pub struct RunCredentials {
    pub storage_connection: String,
    pub provider: ProviderCredentials,
}

impl fmt::Debug for RunCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCredentials")
            .field("storage_connection", &"<redacted>")
            .field("provider", &self.provider)
            .finish()
    }
}

fn required(value: Option<&String>, setting: &str) -> crate::Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(IngestError::missing(setting)),
    }
}

impl IngestConfig {
    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(config_path, &env)
    }

    /// Load configuration from specified path and an explicit environment
    pub fn load_with_env(config_path: Option<PathBuf>, env: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        let env_map: config::Map<String, String> =
            env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(env_map)),
        );

        // The well-known secret variables win over everything else
        builder = builder
            .set_override_option("storage.connection_string", env.get(STORAGE_CONNECTION_ENV).cloned())?
            .set_override_option("provider.username", env.get(USERNAME_ENV).cloned())?
            .set_override_option("provider.password", env.get(PASSWORD_ENV).cloned())?;

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: IngestConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meteomatics-ingest").join("config.toml"))
    }

    /// Apply default values to blank configuration fields
    pub fn apply_defaults(&mut self) {
        if self.storage.container.is_empty() {
            self.storage.container = default_container();
        }
        if self.provider.token_url.is_empty() {
            self.provider.token_url = default_token_url();
        }
        if self.provider.api_base_url.is_empty() {
            self.provider.api_base_url = default_api_base_url();
        }
        if self.schedule.cron.trim().is_empty() {
            self.schedule.cron = default_cron();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    ///
    /// Missing secrets are not an error here; they are checked at the start of each run.
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.registry()?;
        crate::scheduler::parse_schedule(&self.schedule.cron)?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.provider.timeout_seconds == 0 {
            return Err(IngestError::config("Provider timeout must be at least 1 second").into());
        }
        if self.provider.timeout_seconds > 300 {
            return Err(IngestError::config("Provider timeout cannot exceed 300 seconds").into());
        }

        if self.storage.timeout_seconds == 0 {
            return Err(IngestError::config("Storage timeout must be at least 1 second").into());
        }
        if self.storage.timeout_seconds > 300 {
            return Err(IngestError::config("Storage timeout cannot exceed 300 seconds").into());
        }

        if !(1..=32).contains(&self.ingest.max_concurrency) {
            return Err(IngestError::config("Max concurrency must be between 1 and 32").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(IngestError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(IngestError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Token URL", &self.provider.token_url),
            ("API base URL", &self.provider.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(
                    IngestError::config(format!("{name} must be a valid HTTP or HTTPS URL")).into(),
                );
            }
        }

        if self.storage.container.trim().is_empty() {
            return Err(IngestError::config("Storage container cannot be empty").into());
        }

        Ok(())
    }

    /// Validated coordinate registry
    pub fn registry(&self) -> crate::Result<CoordinateRegistry> {
        CoordinateRegistry::new(self.coordinates.clone())
    }

    /// Run preconditions check: all three secrets present and non-blank
    ///
    /// Checked in the order storage, username, password; the first gap is reported.
    pub fn check_preconditions(&self) -> crate::Result<RunCredentials> {
        let storage_connection = required(self.storage.connection_string.as_ref(), STORAGE_CONNECTION_ENV)?;
        let username = required(self.provider.username.as_ref(), USERNAME_ENV)?;
        let password = required(self.provider.password.as_ref(), PASSWORD_ENV)?;

        Ok(RunCredentials {
            storage_connection,
            provider: ProviderCredentials::new(username, password),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn missing_file() -> Option<PathBuf> {
        Some(PathBuf::from("/nonexistent/meteomatics-ingest.toml"))
    }

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.storage.container, "weatherdata");
        assert_eq!(config.provider.token_url, "https://login.meteomatics.com/api/v1/token");
        assert_eq!(config.provider.api_base_url, "https://api.meteomatics.com");
        assert_eq!(config.provider.token_reuse, TokenReuse::PerCoordinate);
        assert_eq!(config.ingest.max_concurrency, 1);
        assert_eq!(config.schedule.cron, "0 0 * * * *");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.coordinates.len(), 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secrets_come_from_well_known_variables() {
        let config = IngestConfig::load_with_env(
            missing_file(),
            &env(&[
                (STORAGE_CONNECTION_ENV, "BlobEndpoint=https://a.blob.core.windows.net;SharedAccessSignature=sv=1"),
                (USERNAME_ENV, "station"),
                (PASSWORD_ENV, "secret"),
            ]),
        )
        .unwrap();

        let credentials = config.check_preconditions().unwrap();
        assert_eq!(credentials.provider.username, "station");
        assert_eq!(credentials.provider.password, "secret");
        assert!(credentials.storage_connection.starts_with("BlobEndpoint="));
    }

    #[test]
    fn test_prefixed_environment_override() {
        let config = IngestConfig::load_with_env(
            missing_file(),
            &env(&[
                ("METEOMATICS_INGEST__SCHEDULE__CRON", "0 30 * * * *"),
                ("METEOMATICS_INGEST__INGEST__MAX_CONCURRENCY", "4"),
            ]),
        )
        .unwrap();

        assert_eq!(config.schedule.cron, "0 30 * * * *");
        assert_eq!(config.ingest.max_concurrency, 4);
    }

    #[test]
    fn test_config_file_replaces_coordinates() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[provider]
token_reuse = "per_run"
api_base_url = "http://127.0.0.1:9000"

[[coordinates]]
name = "Stavanger"
latitude = 58.97
longitude = 5.73
"#
        )
        .unwrap();

        let config =
            IngestConfig::load_with_env(Some(file.path().to_path_buf()), &HashMap::new()).unwrap();

        assert_eq!(config.provider.token_reuse, TokenReuse::PerRun);
        assert_eq!(config.provider.api_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.coordinates, vec![Coordinate::new("Stavanger", 58.97, 5.73)]);
    }

    #[rstest::rstest]
    #[case::nothing(&[], STORAGE_CONNECTION_ENV)]
    #[case::empty_storage(&[(STORAGE_CONNECTION_ENV, ""), (USERNAME_ENV, "u"), (PASSWORD_ENV, "p")], STORAGE_CONNECTION_ENV)]
    #[case::blank_username(&[(STORAGE_CONNECTION_ENV, "x"), (USERNAME_ENV, "  "), (PASSWORD_ENV, "p")], USERNAME_ENV)]
    #[case::no_password(&[(STORAGE_CONNECTION_ENV, "x"), (USERNAME_ENV, "u")], PASSWORD_ENV)]
    fn test_preconditions_fail_on_missing_values(
        #[case] pairs: &[(&str, &str)],
        #[case] expected: &str,
    ) {
        let config = IngestConfig::load_with_env(missing_file(), &env(pairs)).unwrap();
        let err = config.check_preconditions().unwrap_err();
        assert!(matches!(err, IngestError::ConfigurationMissing { ref setting } if setting == expected));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = IngestConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = IngestConfig::default();
        config.provider.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[rstest::rstest]
    #[case::provider_timeout("METEOMATICS_INGEST__PROVIDER__TIMEOUT_SECONDS", "0", "Provider timeout must be at least")]
    #[case::storage_timeout("METEOMATICS_INGEST__STORAGE__TIMEOUT_SECONDS", "0", "Storage timeout must be at least")]
    #[case::no_concurrency("METEOMATICS_INGEST__INGEST__MAX_CONCURRENCY", "0", "Max concurrency must be between")]
    #[case::too_much_concurrency("METEOMATICS_INGEST__INGEST__MAX_CONCURRENCY", "33", "Max concurrency must be between")]
    fn test_load_rejects_out_of_range_numbers(
        #[case] key: &str,
        #[case] value: &str,
        #[case] expected: &str,
    ) {
        let err = IngestConfig::load_with_env(missing_file(), &env(&[(key, value)])).unwrap_err();
        assert!(format!("{err:#}").contains(expected), "{err:#}");
    }

    #[test]
    fn test_config_validation_rejects_bad_cron() {
        let mut config = IngestConfig::default();
        config.schedule.cron = "every hour".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_duplicate_coordinates() {
        let mut config = IngestConfig::default();
        config.coordinates.push(Coordinate::new("Sola", 58.9, 5.6));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let mut config = IngestConfig::default();
        config.storage.connection_string = Some("SharedAccessSignature=sig=abc".to_string());
        config.provider.password = Some("hunter2".to_string());

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sig=abc"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = IngestConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("meteomatics-ingest"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
