//! Configuration Management
//!
//! This module holds the connection parameters and the saved connection profiles.
//!
//! # Configuration Locations
//! - Local: `.pgcrud/config.json` (team-shareable, per-project)
//! - Global: `~/.config/pgcrud/connections.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Explicit connection parameters (command-line flags, `PG*` environment variables)
//! 2. Selected profile (local profiles override global profiles of the same name)
//! 3. Built-in defaults (`localhost:5432`, user and database `postgres`)
//!
//! # Profile File Format
//! ```json
//! {
//!   "connections": {
//!     "local": { "host": "localhost", "port": 5432, "user": "postgres",
//!                "database": "postgres", "password_env": "LOCAL_PG_PASSWORD" }
//!   },
//!   "default": "local"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Default server host
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port
pub const DEFAULT_PORT: u16 = 5432;

/// Default user and database name
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_DATABASE: &str = "postgres";

/// Parameters for one database connection
///
/// Immutable once built; the builder methods consume and return the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    database: String,
    user: String,
    /// WARNING: Sensitive data, never logged or shown by `Debug`
    password: String,
    host: String,
    port: u16,
    connect_timeout: Option<Duration>,
}

impl ConnectionParams {
    /// Parameters for `localhost:5432`
    pub fn new(
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            user: user.into(),
            password: password.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Give up connecting after `timeout` (driver default otherwise)
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Saved connection profile
///
/// Every field is optional; missing fields fall back to defaults at resolution time.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Clear-text password (prefer `password_env`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

impl StoredProfile {
    /// Profile describing `params`, without the password
    #[must_use]
    pub fn from_params(params: &ConnectionParams) -> Self {
        Self {
            host: Some(params.host().to_string()),
            port: Some(params.port()),
            user: Some(params.user().to_string()),
            database: Some(params.database().to_string()),
            password: None,
            password_env: None,
            connect_timeout_ms: params
                .connect_timeout()
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Password from `password_env` if set, else the stored password
    pub fn resolve_password(&self) -> Result<Option<String>> {
        if let Some(env_var) = &self.password_env {
            return match std::env::var(env_var) {
                Ok(password) => Ok(Some(password)),
                Err(_) => Err(ClientError::config_error(format!(
                    "Environment variable {env_var} not found for password"
                ))),
            };
        }
        Ok(self.password.clone())
    }
}

impl fmt::Debug for StoredProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_env", &self.password_env)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

/// Contents of one profile file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRegistry {
    /// Named profiles
    #[serde(default)]
    pub connections: HashMap<String, StoredProfile>,

    /// Name of the default profile (must exist in `connections`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ProfileRegistry {
    /// Merge two registries; `overlay` wins for profiles of the same name and for the default
    #[must_use]
    pub fn merged(mut self, overlay: Self) -> Self {
        self.connections.extend(overlay.connections);
        if overlay.default.is_some() {
            self.default = overlay.default;
        }
        self
    }

    /// Look up a profile by name, or the default profile when no name is given
    ///
    /// An unknown explicit name is an error; no name and no default yields `None`.
    pub fn select(&self, name: Option<&str>) -> Result<Option<&StoredProfile>> {
        let Some(name) = name.or(self.default.as_deref()) else {
            return Ok(None);
        };

        self.connections.get(name).map(Some).ok_or_else(|| {
            let mut available: Vec<_> = self.connections.keys().collect();
            available.sort();
            ClientError::config_error(format!(
                "Connection profile '{name}' not found. Available profiles: {available:?}"
            ))
        })
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.pgcrud/config.json` (team-shareable)
    Local,
    /// Global config: `~/.config/pgcrud/connections.json` (per-user)
    Global,
}

/// Get path to local config file (`.pgcrud/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        ClientError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".pgcrud").join("config.json"))
}

/// Get path to global config file (`~/.config/pgcrud/connections.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ClientError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("pgcrud").join("connections.json"))
}

/// Load a profile registry; a missing file is an empty registry
pub fn load_registry(path: &Path) -> Result<ProfileRegistry> {
    if !path.exists() {
        return Ok(ProfileRegistry::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ClientError::config_error(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents).map_err(|e| {
        ClientError::config_error(format!("Invalid config file {}: {e}", path.display()))
    })
}

/// Save a profile registry, creating parent directories
pub fn save_registry(path: &Path, registry: &ProfileRegistry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ClientError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(registry)
        .map_err(|e| ClientError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| ClientError::config_error(format!("Could not write config file: {e}")))
}

/// Load global then local profiles, local taking precedence
///
/// A platform without a user config directory only contributes local profiles.
pub fn load_with_precedence() -> Result<ProfileRegistry> {
    let global = match global_config_path() {
        Ok(path) => load_registry(&path)?,
        Err(e) => {
            tracing::debug!("skipping global profiles: {e}");
            ProfileRegistry::default()
        }
    };
    let local = load_registry(&local_config_path()?)?;

    Ok(global.merged(local))
}

/// Add or replace a profile; the first profile in a file becomes its default
///
/// Returns the path written.
pub fn save_profile(name: &str, profile: StoredProfile, location: ConfigLocation) -> Result<PathBuf> {
    let path = match location {
        ConfigLocation::Local => local_config_path()?,
        ConfigLocation::Global => global_config_path()?,
    };

    let mut registry = load_registry(&path)?;
    insert_profile(&mut registry, name, profile);
    save_registry(&path, &registry)?;

    Ok(path)
}

fn insert_profile(registry: &mut ProfileRegistry, name: &str, profile: StoredProfile) {
    let is_first = registry.connections.is_empty();
    registry.connections.insert(name.to_string(), profile);
    if is_first || registry.default.is_none() {
        registry.default = Some(name.to_string());
    }
}

/// All visible profiles sorted by name, with a flag marking the default
pub fn list_profiles() -> Result<Vec<(String, StoredProfile, bool)>> {
    let registry = load_with_precedence()?;
    let default = registry.default.clone();

    let mut profiles: Vec<_> = registry
        .connections
        .into_iter()
        .map(|(name, profile)| {
            let is_default = default.as_deref() == Some(name.as_str());
            (name, profile, is_default)
        })
        .collect();
    profiles.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(profiles)
}

/// Values given explicitly on the command line or through `PG*` variables
#[derive(Debug, Clone, Default)]
pub struct ParamOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub database: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Option<Duration>,
}

/// Combine overrides, the selected profile and defaults into connection parameters
///
/// `prompt_password` runs only when neither the overrides nor the profile supply a password.
pub fn resolve_params<F>(
    overrides: &ParamOverrides,
    profile: Option<&StoredProfile>,
    prompt_password: F,
) -> Result<ConnectionParams>
where
    F: FnOnce() -> Result<String>,
{
    let empty = StoredProfile::default();
    let profile = profile.unwrap_or(&empty);

    let pick = |explicit: &Option<String>, stored: &Option<String>, default: &str| {
        explicit.clone().or_else(|| stored.clone()).unwrap_or_else(|| default.to_string())
    };

    let password = match &overrides.password {
        Some(password) => password.clone(),
        None => match profile.resolve_password()? {
            Some(password) => password,
            None => prompt_password()?,
        },
    };

    let mut params = ConnectionParams::new(
        pick(&overrides.database, &profile.database, DEFAULT_DATABASE),
        pick(&overrides.user, &profile.user, DEFAULT_USER),
        password,
    )
    .with_host(pick(&overrides.host, &profile.host, DEFAULT_HOST))
    .with_port(overrides.port.or(profile.port).unwrap_or(DEFAULT_PORT));

    let timeout = overrides
        .connect_timeout
        .or_else(|| profile.connect_timeout_ms.map(Duration::from_millis));
    if let Some(timeout) = timeout {
        params = params.with_connect_timeout(timeout);
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_config_path(label: &str) -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir()
            .join(format!("pgcrud_config_{label}_{}_{id}", std::process::id()))
            .join("config.json")
    }

    fn profile(host: &str) -> StoredProfile {
        StoredProfile {
            host: Some(host.to_string()),
            port: Some(5433),
            user: Some("app".to_string()),
            database: Some("appdb".to_string()),
            ..StoredProfile::default()
        }
    }

    fn no_prompt() -> Result<String> {
        panic!("password prompt should not run")
    }

    #[test]
    fn test_connection_params_defaults() {
        let params = ConnectionParams::new("postgres", "postgres", "secret");
        assert_eq!(params.host(), "localhost");
        assert_eq!(params.port(), 5432);
        assert_eq!(params.database(), "postgres");
        assert!(params.connect_timeout().is_none());
    }

    #[test]
    fn test_connection_params_builders() {
        let params = ConnectionParams::new("db", "user", "pw")
            .with_host("db.internal")
            .with_port(6432)
            .with_connect_timeout(Duration::from_secs(3));
        assert_eq!(params.host(), "db.internal");
        assert_eq!(params.port(), 6432);
        assert_eq!(params.connect_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let params = ConnectionParams::new("db", "user", "hunter2");
        let debug = format!("{params:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));

        let stored = StoredProfile { password: Some("hunter2".to_string()), ..profile("h") };
        assert!(!format!("{stored:?}").contains("hunter2"));
    }

    #[test]
    fn test_registry_serialization_skips_empty_fields() {
        let mut registry = ProfileRegistry::default();
        insert_profile(&mut registry, "dev", profile("localhost"));

        let json = serde_json::to_string(&registry).unwrap();
        assert!(json.contains(r#""default":"dev""#));
        assert!(json.contains(r#""port":5433"#));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_first_profile_becomes_default() {
        let mut registry = ProfileRegistry::default();
        insert_profile(&mut registry, "dev", profile("a"));
        insert_profile(&mut registry, "prod", profile("b"));

        assert_eq!(registry.default.as_deref(), Some("dev"));
        assert_eq!(registry.connections.len(), 2);
    }

    #[test]
    fn test_select_profile() {
        let mut registry = ProfileRegistry::default();
        assert!(registry.select(None).unwrap().is_none());

        insert_profile(&mut registry, "dev", profile("a"));
        insert_profile(&mut registry, "prod", profile("b"));

        assert_eq!(registry.select(None).unwrap().unwrap().host.as_deref(), Some("a"));
        assert_eq!(registry.select(Some("prod")).unwrap().unwrap().host.as_deref(), Some("b"));

        let err = registry.select(Some("staging")).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.message().contains(r#"["dev", "prod"]"#));
    }

    #[test]
    fn test_merged_prefers_overlay() {
        let mut global = ProfileRegistry::default();
        insert_profile(&mut global, "dev", profile("global-dev"));
        insert_profile(&mut global, "shared", profile("global-shared"));

        let mut local = ProfileRegistry::default();
        insert_profile(&mut local, "shared", profile("local-shared"));

        let merged = global.merged(local);
        assert_eq!(merged.connections.len(), 2);
        assert_eq!(merged.connections["shared"].host.as_deref(), Some("local-shared"));
        assert_eq!(merged.connections["dev"].host.as_deref(), Some("global-dev"));
        assert_eq!(merged.default.as_deref(), Some("shared"));
    }

    #[test]
    fn test_save_and_load_registry() {
        let path = temp_config_path("roundtrip");
        assert_eq!(load_registry(&path).unwrap(), ProfileRegistry::default());

        let mut registry = ProfileRegistry::default();
        insert_profile(&mut registry, "dev", profile("localhost"));
        save_registry(&path, &registry).unwrap();

        let loaded = load_registry(&path).unwrap();
        assert_eq!(loaded, registry);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_registry_rejects_invalid_json() {
        let path = temp_config_path("invalid");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = load_registry(&path).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.message().contains("Invalid config file"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_resolve_password_from_env() {
        std::env::set_var("PGCRUD_TEST_PASSWORD_PRESENT", "from-env");
        let stored = StoredProfile {
            password: Some("ignored".to_string()),
            password_env: Some("PGCRUD_TEST_PASSWORD_PRESENT".to_string()),
            ..StoredProfile::default()
        };
        assert_eq!(stored.resolve_password().unwrap().as_deref(), Some("from-env"));

        let missing = StoredProfile {
            password_env: Some("PGCRUD_TEST_PASSWORD_MISSING".to_string()),
            ..StoredProfile::default()
        };
        let err = missing.resolve_password().unwrap_err();
        assert!(err.message().contains("PGCRUD_TEST_PASSWORD_MISSING"));
    }

    #[test]
    fn test_resolve_params_defaults_and_prompt() {
        let params =
            resolve_params(&ParamOverrides::default(), None, || Ok("typed".to_string())).unwrap();
        assert_eq!(params.host(), DEFAULT_HOST);
        assert_eq!(params.port(), DEFAULT_PORT);
        assert_eq!(params.user(), DEFAULT_USER);
        assert_eq!(params.database(), DEFAULT_DATABASE);
        assert_eq!(params.password(), "typed");
    }

    #[test]
    fn test_resolve_params_overrides_beat_profile() {
        let stored = StoredProfile {
            password: Some("stored".to_string()),
            connect_timeout_ms: Some(1500),
            ..profile("profile-host")
        };
        let overrides = ParamOverrides {
            host: Some("flag-host".to_string()),
            ..ParamOverrides::default()
        };

        let params = resolve_params(&overrides, Some(&stored), no_prompt).unwrap();
        assert_eq!(params.host(), "flag-host");
        assert_eq!(params.port(), 5433);
        assert_eq!(params.user(), "app");
        assert_eq!(params.database(), "appdb");
        assert_eq!(params.password(), "stored");
        assert_eq!(params.connect_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_resolve_params_explicit_password_skips_profile_env() {
        let stored = StoredProfile {
            password_env: Some("PGCRUD_TEST_PASSWORD_NEVER_SET".to_string()),
            ..profile("h")
        };
        let overrides =
            ParamOverrides { password: Some("flag".to_string()), ..ParamOverrides::default() };

        let params = resolve_params(&overrides, Some(&stored), no_prompt).unwrap();
        assert_eq!(params.password(), "flag");
    }

    #[test]
    fn test_profile_from_params_omits_password() {
        let params = ConnectionParams::new("db", "user", "secret")
            .with_connect_timeout(Duration::from_secs(2));
        let stored = StoredProfile::from_params(&params);
        assert!(stored.password.is_none());
        assert_eq!(stored.host.as_deref(), Some("localhost"));
        assert_eq!(stored.connect_timeout_ms, Some(2000));
    }
}
