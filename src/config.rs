use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    /// Registered redirect prefix; navigations starting with it carry the token
    #[serde(default)]
    pub callback_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_backend")]
    pub backend: CredentialBackend,
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
    #[serde(default = "default_credential_key")]
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
    #[serde(default = "default_fetch_secs")]
    pub fetch_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Periodic re-validation of the session credential; off when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revalidate_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

// Defaults
fn default_api_base_url() -> String {
    "https://api.groupme.com/v3".to_string()
}
fn default_authorize_endpoint() -> String {
    "https://oauth.groupme.com/oauth/authorize".to_string()
}
fn default_backend() -> CredentialBackend {
    CredentialBackend::Keyring
}
fn default_keyring_service() -> String {
    "groupdesk".to_string()
}
fn default_credential_key() -> String {
    "access_token".to_string()
}
fn default_probe_secs() -> u64 {
    10
}
fn default_fetch_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            authorize_endpoint: default_authorize_endpoint(),
            callback_url: String::new(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            keyring_service: default_keyring_service(),
            key: default_credential_key(),
            file_path: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: default_probe_secs(),
            fetch_secs: default_fetch_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }
}

impl AuthConfig {
    /// Provider authorization URL requesting an implicit-grant token
    pub fn authorize_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.authorize_endpoint)
            .with_context(|| format!("Invalid authorize endpoint: {}", self.authorize_endpoint))?;
        url.query_pairs_mut().append_pair("client_id", &self.client_id);
        Ok(url)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut config = match Self::locate() {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Find the config file: $GROUPDESK_CONFIG, then ./groupdesk.toml, then the user config dir
    fn locate() -> Option<PathBuf> {
        if let Ok(path) = env::var("GROUPDESK_CONFIG") {
            return Some(PathBuf::from(path));
        }

        let mut locations = vec![PathBuf::from("./groupdesk.toml")];
        if let Some(dir) = dirs::config_dir() {
            locations.push(dir.join("groupdesk").join("config.toml"));
        }

        locations.into_iter().find(|path| path.exists())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        Self::validate_file_permissions(path)?;

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content);
        Ok(toml::from_str(&content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(client_id) = env::var("GROUPDESK_CLIENT_ID") {
            self.auth.client_id = client_id;
        }
        if let Ok(callback) = env::var("GROUPDESK_CALLBACK_URL") {
            self.auth.callback_url = callback;
        }
    }

    /// Substitute ${VAR_NAME} with environment variable values
    ///
    /// Single forward pass: substituted values are never scanned again.
    fn substitute_env_vars(content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find("${") {
            let Some(end) = rest[start..].find('}') else {
                break;
            };
            let var_name = &rest[start + 2..start + end];

            result.push_str(&rest[..start]);
            result.push_str(&env::var(var_name).unwrap_or_default());
            rest = &rest[start + end + 1..];
        }

        result.push_str(rest);
        result
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.client_id.trim().is_empty() {
            anyhow::bail!("auth.client_id is not set (or GROUPDESK_CLIENT_ID)");
        }
        if self.auth.callback_url.trim().is_empty() {
            anyhow::bail!("auth.callback_url is not set (or GROUPDESK_CALLBACK_URL)");
        }

        Url::parse(&self.auth.callback_url)
            .with_context(|| format!("Invalid callback url: {}", self.auth.callback_url))?;
        self.auth.authorize_url()?;
        Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid api base url: {}", self.api.base_url))?;

        if self.timeouts.probe_secs == 0 || self.timeouts.fetch_secs == 0 {
            anyhow::bail!("timeouts must be at least one second");
        }
        if self.session.revalidate_interval_secs == Some(0) {
            anyhow::bail!("session.revalidate_interval_secs must be positive");
        }

        Ok(())
    }

    /// Default location of the file credential store
    pub fn credential_file_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials.file_path {
            return Ok(path.clone());
        }
        let dir = dirs::config_dir().context("Could not determine user config directory")?;
        Ok(dir.join("groupdesk").join("credentials.toml"))
    }

    /// Validate config file permissions (Unix only)
    #[cfg(unix)]
    fn validate_file_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        if !path.exists() {
            tracing::debug!("Config file does not exist yet: {}", path.display());
            return Ok(());
        }

        let mode = fs::metadata(path)
            .with_context(|| {
                format!("Failed to read metadata for config file: {}", path.display())
            })?
            .permissions()
            .mode();

        if mode & 0o022 != 0 {
            anyhow::bail!(
                "Config file {} is writable by group or others (mode: {:o}). Run: chmod 600 {}",
                path.display(),
                mode & 0o777,
                path.display()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [auth]
        client_id = "abc"
        callback_url = "https://example.com/callback"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.api.base_url, "https://api.groupme.com/v3");
        assert_eq!(config.credentials.backend, CredentialBackend::Keyring);
        assert_eq!(config.credentials.key, "access_token");
        assert_eq!(config.timeouts.probe(), Duration::from_secs(10));
        assert_eq!(config.timeouts.fetch(), Duration::from_secs(30));
        assert!(config.session.revalidate_interval_secs.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        config.validate().unwrap();
    }

    #[test]
    fn test_authorize_url_carries_client_id() {
        let config = Config::from_toml(MINIMAL).unwrap();
        let url = config.auth.authorize_url().unwrap();

        assert_eq!(
            url.as_str(),
            "https://oauth.groupme.com/oauth/authorize?client_id=abc"
        );
    }

    #[test]
    fn test_missing_callback_fails_validation() {
        let config = Config::from_toml("[auth]\nclient_id = \"abc\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("callback_url"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = format!("{}\n[timeouts]\nprobe_secs = 0\n", MINIMAL);
        let config = Config::from_toml(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_parses_lowercase() {
        let toml = format!("{}\n[credentials]\nbackend = \"file\"\n", MINIMAL);
        let config = Config::from_toml(&toml).unwrap();
        assert_eq!(config.credentials.backend, CredentialBackend::File);
    }

    #[test]
    fn test_env_var_substitution() {
        unsafe { env::set_var("GROUPDESK_TEST_CLIENT", "from-env") };

        let output = Config::substitute_env_vars("client_id = \"${GROUPDESK_TEST_CLIENT}\"");
        assert_eq!(output, "client_id = \"from-env\"");

        unsafe { env::remove_var("GROUPDESK_TEST_CLIENT") };
    }

    #[test]
    fn test_env_value_is_not_rescanned() {
        unsafe { env::set_var("GROUPDESK_TEST_LOOP", "${GROUPDESK_TEST_LOOP}") };

        let output =
            Config::substitute_env_vars("x = \"${GROUPDESK_TEST_LOOP}\" # ${GROUPDESK_TEST_UNSET}");
        assert_eq!(output, "x = \"${GROUPDESK_TEST_LOOP}\" # ");

        unsafe { env::remove_var("GROUPDESK_TEST_LOOP") };
    }

    #[test]
    fn test_unterminated_placeholder_is_kept() {
        assert_eq!(Config::substitute_env_vars("a = \"${OPEN\""), "a = \"${OPEN\"");
    }

    #[cfg(unix)]
    #[test]
    fn test_group_writable_file_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, MINIMAL).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();

        assert!(Config::from_file(&path).is_err());

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        assert!(Config::from_file(&path).is_ok());
    }
}
