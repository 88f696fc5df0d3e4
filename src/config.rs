use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default OAuth redirect used by the `auth` command's local callback listener.
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";

/// Scopes requested during the OAuth authorization-code flow.
pub const DEFAULT_SCOPE: &str = "tasks:read tasks:write";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "ticktick-mcp".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub v1_base_url: String,
    pub v2_base_url: String,
    pub oauth_authorize_url: String,
    pub oauth_token_url: String,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub max_backoff_secs: u64,
    pub max_concurrent_requests: usize,
    pub prefer_v2: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            v1_base_url: "https://api.ticktick.com/open/v1".to_string(),
            v2_base_url: "https://api.ticktick.com/api/v2".to_string(),
            oauth_authorize_url: "https://ticktick.com/oauth/authorize".to_string(),
            oauth_token_url: "https://ticktick.com/oauth/token".to_string(),
            timeout_secs: 30,
            retry_count: 3,
            retry_delay_ms: 1000,
            max_backoff_secs: 60,
            max_concurrent_requests: 4,
            prefer_v2: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub ttl_secs: u64,
    pub auto_refresh: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_state_dir().join("cache.json"),
            ttl_secs: 300,
            auto_refresh: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_dir: PathBuf,
    pub access_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_dir: default_state_dir(),
            access_token: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            server: ServerConfig::default(),
            oauth: OAuthConfig::default(),
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// `~/.ticktick-mcp`, where tokens and the task cache live by default.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ticktick-mcp")
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir
                .join(project_name)
                .join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!(
                            "Failed to load config from {}: {}",
                            primary_config.display(),
                            e
                        );
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!(
                        "Failed to load config from {}: {}",
                        fallback_config.display(),
                        e
                    );
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply `TICKTICK_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("TICKTICK_CLIENT_ID") {
            self.oauth.client_id = Some(v);
        }
        if let Some(v) = non_empty("TICKTICK_CLIENT_SECRET") {
            self.oauth.client_secret = Some(v);
        }
        if let Some(v) = non_empty("TICKTICK_REDIRECT_URI") {
            self.oauth.redirect_uri = v;
        }
        if let Some(v) = non_empty("TICKTICK_LOG_LEVEL") {
            self.log_level = Some(v.to_lowercase());
        }
        if let Some(v) = non_empty("TICKTICK_API_TIMEOUT") {
            match v.parse() {
                Ok(secs) => self.api.timeout_secs = secs,
                Err(_) => log::warn!("Ignoring invalid TICKTICK_API_TIMEOUT: {}", v),
            }
        }
        if let Some(v) = non_empty("TICKTICK_ACCESS_TOKEN") {
            self.auth.access_token = Some(v);
        }
        if let Some(v) = non_empty("TICKTICK_CACHE_PATH") {
            self.cache.path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("TICKTICK_TOKEN_DIR") {
            self.auth.token_dir = PathBuf::from(v);
        }
    }

    /// Copy of the configuration with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.oauth.client_secret.is_some() {
            copy.oauth.client_secret = Some("***".to_string());
        }
        if copy.auth.access_token.is_some() {
            copy.auth.access_token = Some("***".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.name, "ticktick-mcp");
        assert_eq!(config.oauth.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.oauth.scope, "tasks:read tasks:write");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.retry_count, 3);
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.cache.path.ends_with("cache.json"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "api:\n  timeout_secs: 10\ncache:\n  auto_refresh: true\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.api.retry_count, 3);
        assert!(config.cache.auto_refresh);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "oauth:\n  client_id: abc\nserver:\n  name: my-ticktick\n").unwrap();

        let config = Config::load_file_chain(Some(&path)).unwrap();
        assert_eq!(config.oauth.client_id.as_deref(), Some("abc"));
        assert_eq!(config.server.name, "my-ticktick");
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/ticktick-mcp.yml");
        assert!(Config::load_file_chain(Some(&path)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("TICKTICK_CLIENT_ID", "env-id"),
            ("TICKTICK_CLIENT_SECRET", "env-secret"),
            ("TICKTICK_API_TIMEOUT", "45"),
            ("TICKTICK_LOG_LEVEL", "DEBUG"),
            ("TICKTICK_CACHE_PATH", "/tmp/tt-cache.json"),
        ]));

        assert_eq!(config.oauth.client_id.as_deref(), Some("env-id"));
        assert_eq!(config.oauth.client_secret.as_deref(), Some("env-secret"));
        assert_eq!(config.api.timeout_secs, 45);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.cache.path, PathBuf::from("/tmp/tt-cache.json"));
    }

    #[test]
    fn test_env_invalid_timeout_ignored() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[("TICKTICK_API_TIMEOUT", "soon")]));
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_env_empty_values_ignored() {
        let mut config = Config::default();
        config.oauth.client_id = Some("file-id".to_string());
        config.apply_env(lookup_from(&[("TICKTICK_CLIENT_ID", "  ")]));
        assert_eq!(config.oauth.client_id.as_deref(), Some("file-id"));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = Config::default();
        config.oauth.client_secret = Some("shh".to_string());
        config.auth.access_token = Some("token".to_string());

        let redacted = config.redacted();
        assert_eq!(redacted.oauth.client_secret.as_deref(), Some("***"));
        assert_eq!(redacted.auth.access_token.as_deref(), Some("***"));
        assert_eq!(config.oauth.client_secret.as_deref(), Some("shh"));
    }
}
