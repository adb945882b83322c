//! Harness configuration
//!
//! Settings come from an optional TOML or JSON file and are then overridden
//! by environment variables. Environment access goes through a lookup
//! function so tests never touch the process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::connection::{self, ConnectionDescriptor, CredentialOverrides};
use crate::error::{Error, Result};
use crate::policy::{parse_flag, ResetFlags};

pub const DB_URL: &str = "DB_URL";
pub const DB_USERNAME: &str = "DB_USERNAME";
pub const DB_PASSWORD: &str = "DB_PASSWORD";
pub const DB_RESET_SQL_FILE: &str = "DB_RESET_SQL_FILE";
pub const DB_RESET_ALLOW_NON_LOCAL: &str = "DB_RESET_ALLOW_NON_LOCAL";
pub const DB_RESET_ON_RUN: &str = "DB_RESET_ON_RUN";
pub const DB_RESET_AFTER_RUN: &str = "DB_RESET_AFTER_RUN";
pub const DB_RESET_BEFORE_SPEC: &str = "DB_RESET_BEFORE_SPEC";
pub const DB_RESET_AFTER_SPEC: &str = "DB_RESET_AFTER_SPEC";
pub const API_BASE_URL: &str = "API_BASE_URL";
pub const JAVA_HOME: &str = "JAVA_HOME";
pub const APP_JAR: &str = "APP_JAR";
pub const APP_CONFIG_LOCATION: &str = "APP_CONFIG_LOCATION";
pub const ADMIN_USERNAME: &str = "ADMIN_USERNAME";
pub const ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";
pub const USER_USERNAME: &str = "USER_USERNAME";
pub const USER_PASSWORD: &str = "USER_PASSWORD";

/// Fixture script applied when `DB_RESET_SQL_FILE` is not set
pub const DEFAULT_RESET_SQL_FILE: &str = "sql/sample_plant_data_full.sql";

const REDACTED: &str = "***";

/// Complete harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub accounts: Accounts,
}

/// How to reach, and if necessary launch, the application server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// External base URL; its host and port are the readiness endpoint
    pub base_url: String,

    /// Java installation used to launch the server; `PATH` lookup when unset
    pub java_home: Option<PathBuf>,

    /// Application jar to launch
    pub jar_path: PathBuf,

    /// Spring config file location passed to the server
    pub config_location: Option<PathBuf>,

    /// Optional HTTP path that must answer with a success status
    pub health_path: Option<String>,

    /// Budget for the "is it already up" probe
    pub probe_timeout_ms: u64,

    /// Budget for a cold start after launching
    pub startup_timeout_ms: u64,

    pub poll_interval_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            java_home: None,
            jar_path: PathBuf::from("target/qa-training-app.jar"),
            config_location: None,
            health_path: None,
            probe_timeout_ms: 1_000,
            startup_timeout_ms: 60_000,
            poll_interval_ms: 250,
        }
    }
}

impl ServerSettings {
    /// Host and port derived from the base URL
    pub fn endpoint(&self) -> Result<(String, u16)> {
        let invalid = |message: &str| Error::InvalidBaseUrl {
            raw: self.base_url.clone(),
            message: message.to_string(),
        };
        let url = Url::parse(&self.base_url).map_err(|e| invalid(&e.to_string()))?;
        let host = match url.host() {
            Some(url::Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => host.to_string(),
            None => return Err(invalid("no host")),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("no port"))?;
        Ok((host, port))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Connection and reset settings for the fixture database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub reset_sql_file: PathBuf,
    pub reset: ResetFlags,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            reset_sql_file: PathBuf::from(DEFAULT_RESET_SQL_FILE),
            reset: ResetFlags::default(),
        }
    }
}

impl DatabaseSettings {
    pub fn overrides(&self) -> CredentialOverrides {
        CredentialOverrides {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Resolve the configured connection string
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        let raw = self.url.as_deref().ok_or(Error::MissingSetting(DB_URL))?;
        connection::resolve(raw, &self.overrides())
    }
}

/// Login credentials for the application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Accounts {
    pub admin: Option<Credentials>,
    pub user: Option<Credentials>,
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent.
    ///
    /// Files ending in `.json` are read as JSON, everything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(config)
    }

    /// Load an optional file and apply the process environment
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values are ignored; flag values that do not normalise to a
    /// boolean leave the file setting in place.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db = &mut self.database;
        if let Some(url) = get(DB_URL) {
            db.url = Some(url.trim().to_string());
        }
        if let Some(username) = get(DB_USERNAME) {
            db.username = Some(username);
        }
        if let Some(password) = get(DB_PASSWORD) {
            db.password = Some(password);
        }
        if let Some(file) = get(DB_RESET_SQL_FILE) {
            db.reset_sql_file = PathBuf::from(file);
        }

        let flags = &mut db.reset;
        for (key, slot) in [
            (DB_RESET_ALLOW_NON_LOCAL, &mut flags.allow_non_local),
            (DB_RESET_ON_RUN, &mut flags.on_run),
            (DB_RESET_AFTER_RUN, &mut flags.after_run),
            (DB_RESET_BEFORE_SPEC, &mut flags.before_spec),
            (DB_RESET_AFTER_SPEC, &mut flags.after_spec),
        ] {
            if let Some(value) = parse_flag(get(key).as_deref()) {
                *slot = Some(value);
            }
        }

        let server = &mut self.server;
        if let Some(base_url) = get(API_BASE_URL) {
            server.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(java_home) = get(JAVA_HOME) {
            server.java_home = Some(PathBuf::from(java_home));
        }
        if let Some(jar) = get(APP_JAR) {
            server.jar_path = PathBuf::from(jar);
        }
        if let Some(location) = get(APP_CONFIG_LOCATION) {
            server.config_location = Some(PathBuf::from(location));
        }

        let credentials = |user_key: &str, password_key: &str| {
            get(user_key).map(|username| Credentials {
                username,
                password: get(password_key).unwrap_or_default(),
            })
        };
        if let Some(admin) = credentials(ADMIN_USERNAME, ADMIN_PASSWORD) {
            self.accounts.admin = Some(admin);
        }
        if let Some(user) = credentials(USER_USERNAME, USER_PASSWORD) {
            self.accounts.user = Some(user);
        }

        self
    }

    /// Copy of the configuration with every secret masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.database.password.is_some() {
            copy.database.password = Some(REDACTED.to_string());
        }
        if let Some(url) = copy.database.url.as_mut() {
            if let Ok(descriptor) = connection::resolve(url, &CredentialOverrides::default()) {
                if descriptor.password.is_some() {
                    *url = descriptor.to_string();
                }
            }
        }
        for account in [&mut copy.accounts.admin, &mut copy.accounts.user]
            .into_iter()
            .flatten()
        {
            account.password = REDACTED.to_string();
        }
        copy
    }
}
