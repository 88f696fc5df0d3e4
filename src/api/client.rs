//! TickTick HTTP client.
//!
//! One client speaks to both APIs: v1 requests carry the OAuth bearer token,
//! v2 requests carry the session token plus the cookies captured at sign-in.
//! Retryable failures (429, 5xx, transport errors) are retried with
//! exponential backoff up to `retry_count` times.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, COOKIE, RETRY_AFTER, SET_COOKIE};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde_json::{Value, json};
use url::Url;

use super::backoff::RateLimitState;
use super::endpoints::{ApiVersion, Endpoints};
use super::tokens::{OAuthAppConfig, OAuthToken, SessionToken, TokenStore};
use crate::config::{Config, DEFAULT_REDIRECT_URI, DEFAULT_SCOPE};
use crate::error::{Result, TickTickError};

/// `state` parameter sent with the authorization request.
pub const OAUTH_STATE: &str = "mcp_auth";

/// Snapshot of the client's credentials, safe to show to a user.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub api_version: Option<ApiVersion>,
    pub oauth_configured: bool,
    pub oauth: Option<OAuthStatus>,
    pub session: Option<SessionStatus>,
    pub inbox_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuthStatus {
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub created_at: DateTime<Utc>,
}

pub struct TickTickClient {
    http: Client,
    endpoints: Endpoints,
    store: TokenStore,
    scope: String,
    retry_count: u32,
    oauth: RwLock<Option<OAuthToken>>,
    session: RwLock<Option<SessionToken>>,
    app: RwLock<Option<OAuthAppConfig>>,
    inbox_id: RwLock<Option<String>>,
    rate_limit: Mutex<RateLimitState>,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl TickTickClient {
    /// Build a client from the full configuration: token directory, static
    /// access token and OAuth app credentials all come from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = TokenStore::new(&config.auth.token_dir);
        let client = Self::new(&config.api, store, config.auth.access_token.clone())?;

        if let (Some(id), Some(secret)) = (&config.oauth.client_id, &config.oauth.client_secret)
            && read(&client.app).is_none()
        {
            write(
                &client.app,
                Some(OAuthAppConfig {
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                    redirect_uri: config.oauth.redirect_uri.clone(),
                }),
            );
        }
        Ok(client.with_scope(&config.oauth.scope))
    }

    /// Create a client, loading any cached credentials from `store`.
    pub fn new(
        api: &crate::config::ApiConfig,
        store: TokenStore,
        static_access_token: Option<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| {
                TickTickError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let oauth = match static_access_token {
            Some(token) => {
                log::info!("Using access token from configuration");
                Some(OAuthToken::from_access_token(token))
            }
            None => store.load_oauth().and_then(|token| {
                if token.is_expired() {
                    log::warn!("Cached OAuth token is expired, ignoring it");
                    None
                } else {
                    Some(token)
                }
            }),
        };
        let session = store.load_session();
        let inbox_id = session.as_ref().and_then(|s| s.inbox_id.clone());
        let app = store.load_app_config();

        Ok(Self {
            http,
            endpoints: Endpoints::from_config(api),
            store,
            scope: DEFAULT_SCOPE.to_string(),
            retry_count: api.retry_count,
            oauth: RwLock::new(oauth),
            session: RwLock::new(session),
            app: RwLock::new(app),
            inbox_id: RwLock::new(inbox_id),
            rate_limit: Mutex::new(RateLimitState::new(
                Duration::from_millis(api.retry_delay_ms),
                Duration::from_secs(api.max_backoff_secs),
            )),
        })
    }

    fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn backoff(&self) -> MutexGuard<'_, RateLimitState> {
        self.rate_limit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Credentials

    pub fn has_v1(&self) -> bool {
        read(&self.oauth).is_some_and(|t| !t.is_expired())
    }

    pub fn has_v2(&self) -> bool {
        read(&self.session).is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.has_v1() || self.has_v2()
    }

    pub fn inbox_id(&self) -> Option<String> {
        read(&self.inbox_id)
    }

    pub fn user_id(&self) -> Option<String> {
        read(&self.session).and_then(|s| s.user_id)
    }

    pub fn auth_status(&self) -> AuthStatus {
        let oauth = read(&self.oauth);
        let session = read(&self.session);
        let api_version = if session.is_some() {
            Some(ApiVersion::V2)
        } else if self.has_v1() {
            Some(ApiVersion::V1)
        } else {
            None
        };

        AuthStatus {
            is_authenticated: self.is_authenticated(),
            api_version,
            oauth_configured: read(&self.app).is_some(),
            oauth: oauth.map(|t| OAuthStatus {
                expires_in_seconds: t.seconds_until_expiry(),
                token_type: t.token_type,
                scope: t.scope,
            }),
            session: session.as_ref().map(|s| SessionStatus {
                created_at: s.created_at,
            }),
            inbox_id: self.inbox_id(),
            user_id: session.and_then(|s| s.user_id),
        }
    }

    /// Store the OAuth app registration and return the URL the user must visit.
    pub fn configure_oauth(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_uri: Option<&str>,
    ) -> Result<String> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(TickTickError::Validation(
                "client_id and client_secret are required".to_string(),
            ));
        }
        let app = OAuthAppConfig {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
            redirect_uri: redirect_uri.unwrap_or(DEFAULT_REDIRECT_URI).to_string(),
        };
        self.store.save_app_config(&app)?;
        write(&self.app, Some(app));
        self.authorize_url()
    }

    /// Authorization URL for the configured OAuth app.
    pub fn authorize_url(&self) -> Result<String> {
        let app = read(&self.app).ok_or_else(|| {
            TickTickError::Configuration(
                "OAuth not configured. Call ticktick_configure_oauth first.".to_string(),
            )
        })?;
        let url = Url::parse_with_params(
            self.endpoints.authorize_url(),
            &[
                ("client_id", app.client_id.as_str()),
                ("scope", self.scope.as_str()),
                ("response_type", "code"),
                ("redirect_uri", app.redirect_uri.as_str()),
                ("state", OAUTH_STATE),
            ],
        )
        .map_err(|e| TickTickError::Configuration(format!("Invalid authorize URL: {}", e)))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for an access token and persist it.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        let app = read(&self.app).ok_or_else(|| {
            TickTickError::Configuration(
                "OAuth not configured. Call ticktick_configure_oauth first.".to_string(),
            )
        })?;

        let form = [
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("code", code.trim()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", app.redirect_uri.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(self.endpoints.token_url())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TickTickError::Authentication(format!(
                "OAuth token exchange failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let mut token: OAuthToken = serde_json::from_str(&body)?;
        token.stamp_expiry();
        self.store.save_oauth(&token)?;
        write(&self.oauth, Some(token.clone()));
        log::info!("OAuth token stored in {}", self.store.dir().display());
        Ok(token)
    }

    /// Sign in to the v2 API with account credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionToken> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(TickTickError::Validation(
                "username and password are required".to_string(),
            ));
        }

        let response = self
            .http
            .post(self.endpoints.url(ApiVersion::V2, Endpoints::signin()))
            .header(ACCEPT, "application/json")
            .json(&json!({ "username": username.trim(), "password": password }))
            .send()
            .await?;

        let status = response.status();
        let cookies = collect_cookies(&response);
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TickTickError::Authentication(format!(
                "Login failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let data: Value = serde_json::from_str(&body)?;
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                TickTickError::Authentication("Login response did not include a token".to_string())
            })?;

        let session = SessionToken {
            token: token.to_string(),
            user_id: string_field(&data, "userId"),
            inbox_id: string_field(&data, "inboxId"),
            cookies,
            created_at: Utc::now(),
        };
        self.store.save_session(&session)?;
        write(&self.inbox_id, session.inbox_id.clone());
        write(&self.session, Some(session.clone()));
        log::info!("v2 session established");
        Ok(session)
    }

    /// Forget all credentials, in memory and on disk.
    pub fn logout(&self) -> Result<()> {
        write(&self.oauth, None);
        write(&self.session, None);
        write(&self.inbox_id, None);
        self.store.clear()
    }

    // Requests

    pub async fn get(&self, version: ApiVersion, path: &str) -> Result<Value> {
        self.request(Method::GET, version, path, &[], None).await
    }

    pub async fn get_query(
        &self,
        version: ApiVersion,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value> {
        self.request(Method::GET, version, path, query, None).await
    }

    pub async fn post(&self, version: ApiVersion, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, version, path, &[], Some(body))
            .await
    }

    pub async fn put(&self, version: ApiVersion, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::PUT, version, path, &[], Some(body))
            .await
    }

    pub async fn delete(&self, version: ApiVersion, path: &str) -> Result<Value> {
        self.request(Method::DELETE, version, path, &[], None).await
    }

    pub async fn delete_query(
        &self,
        version: ApiVersion,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value> {
        self.request(Method::DELETE, version, path, query, None)
            .await
    }

    /// Full account sync (v2). Records the inbox id when present.
    pub async fn sync(&self, checkpoint: u64) -> Result<Value> {
        let data = self
            .get(ApiVersion::V2, &Endpoints::batch_check(checkpoint))
            .await?;
        if let Some(inbox) = string_field(&data, "inboxId") {
            write(&self.inbox_id, Some(inbox));
        }
        Ok(data)
    }

    /// Send an authenticated request, retrying transient failures.
    pub async fn request(
        &self,
        method: Method,
        version: ApiVersion,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.endpoints.url(version, path);
        let mut attempt = 0;

        loop {
            let wait = self.backoff().remaining_backoff();
            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
            }

            match self
                .send_once(method.clone(), version, &url, path, query, body)
                .await
            {
                Ok(value) => {
                    self.backoff().record_success();
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.retry_count => {
                    attempt += 1;
                    let retry_after = match &err {
                        TickTickError::RateLimited { retry_after_secs } if *retry_after_secs > 0 => {
                            Some(Duration::from_secs(*retry_after_secs))
                        }
                        _ => None,
                    };
                    let delay = self.backoff().record_failure(retry_after);
                    log::warn!(
                        "{} {} failed ({}), retry {}/{} in {:?}",
                        method,
                        path,
                        err,
                        attempt,
                        self.retry_count,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        version: ApiVersion,
        url: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut builder = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");

        match version {
            ApiVersion::V1 => {
                let token = read(&self.oauth)
                    .filter(|t| !t.is_expired())
                    .ok_or_else(|| {
                        TickTickError::Authentication(
                            "Not authenticated for the v1 API. Run `ticktick-mcp auth` or use ticktick_authorize_oauth."
                                .to_string(),
                        )
                    })?;
                builder = builder.bearer_auth(token.access_token);
            }
            ApiVersion::V2 => {
                let session = read(&self.session).ok_or_else(|| {
                    TickTickError::Authentication(
                        "No v2 session. Use ticktick_login first.".to_string(),
                    )
                })?;
                builder = builder.bearer_auth(&session.token);
                if let Some(cookie) = session.cookie_header() {
                    builder = builder.header(COOKIE, cookie);
                }
            }
        }

        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        log::debug!("{} {} ({})", method, path, version);
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            let err = TickTickError::from_status(status.as_u16(), &text, path);
            return Err(match (err, retry_after) {
                (TickTickError::RateLimited { .. }, Some(secs)) => TickTickError::RateLimited {
                    retry_after_secs: secs,
                },
                (err, _) => err,
            });
        }

        let text = response.text().await?;
        if status.as_u16() == 204 || text.trim().is_empty() {
            return Ok(json!({ "success": true }));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl std::fmt::Debug for TickTickClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickTickClient")
            .field("endpoints", &self.endpoints)
            .field("has_v1", &self.has_v1())
            .field("has_v2", &self.has_v2())
            .finish()
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Name/value pairs from every `Set-Cookie` header.
fn collect_cookies(response: &Response) -> BTreeMap<String, String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.trim().to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use tempfile::TempDir;

    fn offline_client(dir: &TempDir) -> TickTickClient {
        TickTickClient::new(&ApiConfig::default(), TokenStore::new(dir.path()), None).unwrap()
    }

    #[test]
    fn test_new_client_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let client = offline_client(&dir);
        assert!(!client.is_authenticated());
        let status = client.auth_status();
        assert!(!status.is_authenticated);
        assert!(status.api_version.is_none());
        assert!(!status.oauth_configured);
    }

    #[test]
    fn test_static_access_token_enables_v1() {
        let dir = TempDir::new().unwrap();
        let client = TickTickClient::new(
            &ApiConfig::default(),
            TokenStore::new(dir.path()),
            Some("static".to_string()),
        )
        .unwrap();
        assert!(client.has_v1());
        assert!(!client.has_v2());
        assert_eq!(client.auth_status().api_version, Some(ApiVersion::V1));
    }

    #[test]
    fn test_expired_cached_token_discarded() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        let mut token = OAuthToken::from_access_token("old");
        token.expire_time = Some(Utc::now().timestamp() - 1);
        store.save_oauth(&token).unwrap();

        let client = TickTickClient::new(&ApiConfig::default(), store, None).unwrap();
        assert!(!client.has_v1());
    }

    #[test]
    fn test_configure_oauth_builds_authorize_url() {
        let dir = TempDir::new().unwrap();
        let client = offline_client(&dir);
        let url = client
            .configure_oauth("my-client", "my-secret", None)
            .unwrap();

        let parsed = Url::parse(&url).unwrap();
        let params: BTreeMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(parsed.host_str(), Some("ticktick.com"));
        assert_eq!(params["client_id"], "my-client");
        assert_eq!(params["scope"], "tasks:read tasks:write");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], DEFAULT_REDIRECT_URI);
        assert_eq!(params["state"], OAUTH_STATE);
        assert!(client.auth_status().oauth_configured);
    }

    #[test]
    fn test_configure_oauth_requires_credentials() {
        let dir = TempDir::new().unwrap();
        let client = offline_client(&dir);
        assert!(matches!(
            client.configure_oauth("", "secret", None),
            Err(TickTickError::Validation(_))
        ));
    }

    #[test]
    fn test_authorize_url_without_config() {
        let dir = TempDir::new().unwrap();
        let client = offline_client(&dir);
        assert!(matches!(
            client.authorize_url(),
            Err(TickTickError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_config_uses_oauth_section() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.auth.token_dir = dir.path().to_path_buf();
        config.oauth.client_id = Some("cfg-id".to_string());
        config.oauth.client_secret = Some("cfg-secret".to_string());

        let client = TickTickClient::from_config(&config).unwrap();
        assert!(client.authorize_url().unwrap().contains("client_id=cfg-id"));
    }

    #[tokio::test]
    async fn test_v2_request_without_session() {
        let dir = TempDir::new().unwrap();
        let client = offline_client(&dir);
        let err = client.get(ApiVersion::V2, "/habits").await.unwrap_err();
        assert!(matches!(err, TickTickError::Authentication(_)));
    }

    #[test]
    fn test_logout_clears_tokens() {
        let dir = TempDir::new().unwrap();
        let client = TickTickClient::new(
            &ApiConfig::default(),
            TokenStore::new(dir.path()),
            Some("static".to_string()),
        )
        .unwrap();
        client.logout().unwrap();
        assert!(!client.is_authenticated());
    }
}
