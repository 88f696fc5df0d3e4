//! Credential models and on-disk token storage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::atomic::write_atomic;
use crate::error::Result;

/// Lifetime TickTick grants OAuth tokens when the response omits `expires_in` (180 days).
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 15_552_000;

const OAUTH_TOKEN_FILE: &str = "oauth_token.json";
const SESSION_TOKEN_FILE: &str = "session_token.json";
const OAUTH_CONFIG_FILE: &str = "oauth_config.json";

/// OAuth2 bearer token for the v1 API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which the token is no longer valid
    #[serde(default)]
    pub expire_time: Option<i64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl OAuthToken {
    /// Wrap a raw access token with no known expiry, e.g. from `TICKTICK_ACCESS_TOKEN`.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            scope: None,
            refresh_token: None,
            expire_time: None,
            created_at: Utc::now(),
        }
    }

    /// Fill in `expire_time` from `expires_in`, using the default lifetime when absent.
    pub fn stamp_expiry(&mut self) {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        self.expires_in = Some(lifetime);
        self.expire_time = Some(Utc::now().timestamp() + lifetime);
    }

    pub fn is_expired(&self) -> bool {
        match self.expire_time {
            Some(expire) => Utc::now().timestamp() >= expire,
            None => false,
        }
    }

    /// Seconds left before expiry, `None` when the expiry is unknown.
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expire_time
            .map(|expire| (expire - Utc::now().timestamp()).max(0))
    }
}

/// Session token for the v2 API, obtained by username/password sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub inbox_id: Option<String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl SessionToken {
    /// `name=value; name2=value2` for the `Cookie` header, `None` when empty.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// OAuth application registration persisted by `configure_oauth`.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthAppConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl std::fmt::Debug for OAuthAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAppConfig")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Directory holding cached credentials (`~/.ticktick-mcp` by default).
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_oauth(&self) -> Option<OAuthToken> {
        self.load(OAUTH_TOKEN_FILE)
    }

    pub fn save_oauth(&self, token: &OAuthToken) -> Result<()> {
        self.save(OAUTH_TOKEN_FILE, token)
    }

    pub fn load_session(&self) -> Option<SessionToken> {
        self.load(SESSION_TOKEN_FILE)
    }

    pub fn save_session(&self, token: &SessionToken) -> Result<()> {
        self.save(SESSION_TOKEN_FILE, token)
    }

    pub fn load_app_config(&self) -> Option<OAuthAppConfig> {
        self.load(OAUTH_CONFIG_FILE)
    }

    pub fn save_app_config(&self, config: &OAuthAppConfig) -> Result<()> {
        self.save(OAUTH_CONFIG_FILE, config)
    }

    /// Remove both token files. The OAuth app registration is kept.
    pub fn clear(&self) -> Result<()> {
        for name in [OAUTH_TOKEN_FILE, SESSION_TOKEN_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(&path)?;
                log::info!("Removed {}", path.display());
            }
        }
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            return None;
        }
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring unreadable {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value)?;
        write_atomic(&self.dir.join(name), &json, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stamp_expiry_default_lifetime() {
        let mut token = OAuthToken::from_access_token("abc");
        token.stamp_expiry();
        assert_eq!(token.expires_in, Some(DEFAULT_TOKEN_LIFETIME_SECS));
        let remaining = token.seconds_until_expiry().unwrap();
        assert!(remaining > DEFAULT_TOKEN_LIFETIME_SECS - 5);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_expired_token() {
        let mut token = OAuthToken::from_access_token("abc");
        token.expire_time = Some(Utc::now().timestamp() - 10);
        assert!(token.is_expired());
        assert_eq!(token.seconds_until_expiry(), Some(0));
    }

    #[test]
    fn test_token_without_expiry_never_expires() {
        let token = OAuthToken::from_access_token("abc");
        assert!(!token.is_expired());
        assert!(token.seconds_until_expiry().is_none());
    }

    #[test]
    fn test_oauth_token_parses_minimal_response() {
        let token: OAuthToken = serde_json::from_str(r#"{"access_token":"xyz"}"#).unwrap();
        assert_eq!(token.access_token, "xyz");
        assert_eq!(token.token_type, "bearer");
    }

    #[test]
    fn test_cookie_header() {
        let mut session = SessionToken {
            token: "t".to_string(),
            user_id: None,
            inbox_id: None,
            cookies: BTreeMap::new(),
            created_at: Utc::now(),
        };
        assert!(session.cookie_header().is_none());

        session.cookies.insert("t".to_string(), "abc".to_string());
        session.cookies.insert("AWSALB".to_string(), "x".to_string());
        assert_eq!(session.cookie_header().as_deref(), Some("AWSALB=x; t=abc"));
    }

    #[test]
    fn test_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        assert!(store.load_oauth().is_none());

        let mut token = OAuthToken::from_access_token("abc");
        token.stamp_expiry();
        store.save_oauth(&token).unwrap();
        store
            .save_app_config(&OAuthAppConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "http://127.0.0.1:8080/callback".to_string(),
            })
            .unwrap();

        assert_eq!(store.load_oauth().unwrap().access_token, "abc");

        store.clear().unwrap();
        assert!(store.load_oauth().is_none());
        assert!(store.load_app_config().is_some());
    }

    #[test]
    fn test_corrupt_token_file_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SESSION_TOKEN_FILE), "not json").unwrap();
        let store = TokenStore::new(dir.path());
        assert!(store.load_session().is_none());
    }

    #[test]
    fn test_app_config_debug_hides_secret() {
        let config = OAuthAppConfig {
            client_id: "id".to_string(),
            client_secret: "topsecret".to_string(),
            redirect_uri: "http://localhost".to_string(),
        };
        assert!(!format!("{:?}", config).contains("topsecret"));
    }
}
