// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: File- and environment-backed configuration for system tests.
// Purpose: Centralize config parsing with strict UTF-8 validation.
// Dependencies: cachito-client, serde, toml
// ============================================================================

//! ## Overview
//! Configuration comes from an optional TOML file named by
//! `CACHITO_TEST_CONFIG`, overridden key by key by environment variables.
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8, empty values, and malformed numbers fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use cachito_client::AuthConfig;
use cachito_client::AuthType;
use cachito_client::ClientConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for system test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional TOML config file path.
    ConfigFile,
    /// Service API base URL.
    ApiUrl,
    /// API auth type (`none`, `cert`, `kerberos`).
    ApiAuthType,
    /// Completion timeout override in seconds (positive integer).
    TimeoutSeconds,
    /// Poll interval override in seconds (positive integer).
    PollIntervalSeconds,
    /// Directory holding scenario YAML fixtures.
    FixturesDir,
    /// Optional run root override for artifacts.
    RunRoot,
    /// Optional PEM CA bundle path.
    CaCert,
    /// PEM client certificate path for `cert` auth.
    ClientCert,
    /// PEM client key path for `cert` auth.
    ClientKey,
    /// Pre-acquired SPNEGO token for `kerberos` auth.
    NegotiateToken,
}

impl SystemTestEnv {
    /// Every key, in documentation order.
    pub const ALL: [Self; 11] = [
        Self::ConfigFile,
        Self::ApiUrl,
        Self::ApiAuthType,
        Self::TimeoutSeconds,
        Self::PollIntervalSeconds,
        Self::FixturesDir,
        Self::RunRoot,
        Self::CaCert,
        Self::ClientCert,
        Self::ClientKey,
        Self::NegotiateToken,
    ];

    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigFile => "CACHITO_TEST_CONFIG",
            Self::ApiUrl => "CACHITO_TEST_API_URL",
            Self::ApiAuthType => "CACHITO_TEST_API_AUTH_TYPE",
            Self::TimeoutSeconds => "CACHITO_TEST_TIMEOUT_SEC",
            Self::PollIntervalSeconds => "CACHITO_TEST_POLL_INTERVAL_SEC",
            Self::FixturesDir => "CACHITO_TEST_FIXTURES_DIR",
            Self::RunRoot => "CACHITO_TEST_RUN_ROOT",
            Self::CaCert => "CACHITO_TEST_CA_CERT",
            Self::ClientCert => "CACHITO_TEST_CLIENT_CERT",
            Self::ClientKey => "CACHITO_TEST_CLIENT_KEY",
            Self::NegotiateToken => "CACHITO_TEST_NEGOTIATE_TOKEN",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment value is malformed.
    #[error("{0}")]
    Env(String),
    /// The config file is unreadable or malformed.
    #[error("config file {path}: {message}")]
    File {
        /// File path.
        path: String,
        /// Failure detail.
        message: String,
    },
    /// A required setting is absent.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Keys accepted in the TOML config file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    /// Service API base URL.
    api_url: Option<String>,
    /// API auth type label.
    api_auth_type: Option<String>,
    /// Completion timeout in seconds.
    timeout_sec: Option<u64>,
    /// Poll interval in seconds.
    poll_interval_sec: Option<u64>,
    /// Fixture directory.
    fixtures_dir: Option<PathBuf>,
    /// Artifact run root.
    run_root: Option<PathBuf>,
    /// PEM CA bundle path.
    ca_cert: Option<PathBuf>,
    /// PEM client certificate path.
    client_cert: Option<PathBuf>,
    /// PEM client key path.
    client_key: Option<PathBuf>,
}

/// Typed system test configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTestConfig {
    /// Service API base URL; required for live runs.
    pub api_url: Option<String>,
    /// API authentication mode.
    pub auth_type: AuthType,
    /// Overall completion timeout per request.
    pub timeout: Option<Duration>,
    /// Delay between status polls.
    pub poll_interval: Option<Duration>,
    /// Directory holding scenario YAML fixtures.
    pub fixtures_dir: PathBuf,
    /// Optional run root override for artifacts.
    pub run_root: Option<PathBuf>,
    /// Optional PEM CA bundle path.
    pub ca_cert: Option<PathBuf>,
    /// PEM client certificate path for `cert` auth.
    pub client_cert: Option<PathBuf>,
    /// PEM client key path for `cert` auth; may be bundled in `client_cert`.
    pub client_key: Option<PathBuf>,
    /// Pre-acquired SPNEGO token for `kerberos` auth.
    pub negotiate_token: Option<String>,
}

impl Default for SystemTestConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            auth_type: AuthType::None,
            timeout: None,
            poll_interval: None,
            fixtures_dir: default_fixtures_dir(),
            run_root: None,
            ca_cert: None,
            client_cert: None,
            client_key: None,
            negotiate_token: None,
        }
    }
}

impl SystemTestConfig {
    /// Loads configuration from the optional config file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty,
    /// or fails validation, or when the config file cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match read_env_nonempty(SystemTestEnv::ConfigFile.as_str())? {
            Some(path) => load_file_config(Path::new(&path))?,
            None => FileConfig::default(),
        };
        let defaults = Self::default();

        let api_url = read_env_nonempty(SystemTestEnv::ApiUrl.as_str())?.or(file.api_url);
        let auth_label =
            read_env_nonempty(SystemTestEnv::ApiAuthType.as_str())?.or(file.api_auth_type);
        let auth_type = match auth_label {
            Some(label) => label.parse::<AuthType>().map_err(ConfigError::Env)?,
            None => AuthType::None,
        };
        let timeout = match read_env_nonempty(SystemTestEnv::TimeoutSeconds.as_str())? {
            Some(raw) => Some(parse_seconds(SystemTestEnv::TimeoutSeconds.as_str(), &raw)?),
            None => file.timeout_sec.map(|secs| positive_seconds("timeout_sec", secs)).transpose()?,
        };
        let poll_interval = match read_env_nonempty(SystemTestEnv::PollIntervalSeconds.as_str())? {
            Some(raw) => Some(parse_seconds(SystemTestEnv::PollIntervalSeconds.as_str(), &raw)?),
            None => file
                .poll_interval_sec
                .map(|secs| positive_seconds("poll_interval_sec", secs))
                .transpose()?,
        };
        let fixtures_dir = read_env_path(SystemTestEnv::FixturesDir)?
            .or(file.fixtures_dir)
            .unwrap_or(defaults.fixtures_dir);
        let run_root = read_env_path(SystemTestEnv::RunRoot)?.or(file.run_root);
        let ca_cert = read_env_path(SystemTestEnv::CaCert)?.or(file.ca_cert);
        let client_cert = read_env_path(SystemTestEnv::ClientCert)?.or(file.client_cert);
        let client_key = read_env_path(SystemTestEnv::ClientKey)?.or(file.client_key);
        let negotiate_token = read_env_nonempty(SystemTestEnv::NegotiateToken.as_str())?;

        Ok(Self {
            api_url,
            auth_type,
            timeout,
            poll_interval,
            fixtures_dir,
            run_root,
            ca_cert,
            client_cert,
            client_key,
            negotiate_token,
        })
    }

    /// Builds the service client configuration, reading referenced PEM files.
    ///
    /// # Errors
    ///
    /// Returns an error when the API URL or the material required by the auth
    /// type is missing, or a referenced file cannot be read.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let api_url =
            self.api_url.clone().ok_or(ConfigError::Missing(SystemTestEnv::ApiUrl.as_str()))?;
        let mut config = ClientConfig::new(api_url);
        if let Some(timeout) = self.timeout {
            config.completion_timeout = timeout;
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval = interval;
        }
        if let Some(path) = &self.ca_cert {
            config.ca_cert_pem = Some(read_file(path)?);
        }
        config.auth = match self.auth_type {
            AuthType::None => AuthConfig::None,
            AuthType::Cert => {
                let cert_path = self
                    .client_cert
                    .as_ref()
                    .ok_or(ConfigError::Missing(SystemTestEnv::ClientCert.as_str()))?;
                let mut identity_pem = read_file(cert_path)?;
                if let Some(key_path) = &self.client_key {
                    identity_pem.push(b'\n');
                    identity_pem.extend(read_file(key_path)?);
                }
                AuthConfig::Cert {
                    identity_pem,
                }
            }
            AuthType::Kerberos => AuthConfig::Negotiate {
                token: self
                    .negotiate_token
                    .clone()
                    .ok_or(ConfigError::Missing(SystemTestEnv::NegotiateToken.as_str()))?,
            },
        };
        Ok(config)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default fixture directory inside this crate.
fn default_fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("test_data")
}

/// Parses the TOML config file.
fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|err| ConfigError::File {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    toml::from_str(&raw).map_err(|err| ConfigError::File {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Reads a referenced file fully.
fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|err| ConfigError::File {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, ConfigError> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string()
            .map(Some)
            .map_err(|_| ConfigError::Env(format!("{name} must be valid UTF-8")))
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(name: &str) -> Result<Option<String>, ConfigError> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => {
            Err(ConfigError::Env(format!("{name} must not be empty")))
        }
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Reads a non-empty environment variable as a path.
fn read_env_path(key: SystemTestEnv) -> Result<Option<PathBuf>, ConfigError> {
    Ok(read_env_nonempty(key.as_str())?.map(PathBuf::from))
}

/// Parses a positive number of seconds from an environment variable string.
fn parse_seconds(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim();
    let secs: u64 = trimmed.parse().map_err(|_| {
        ConfigError::Env(format!("{name} must be a positive integer number of seconds"))
    })?;
    positive_seconds(name, secs)
}

/// Rejects zero durations.
fn positive_seconds(name: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Env(format!("{name} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}
