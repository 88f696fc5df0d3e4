//! TickTick remote API access: endpoints, credentials and the HTTP client.

pub mod backoff;
pub mod client;
pub mod endpoints;
pub mod tokens;

pub use backoff::RateLimitState;
pub use client::{AuthStatus, TickTickClient};
pub use endpoints::{ApiVersion, Endpoints};
pub use tokens::{OAuthAppConfig, OAuthToken, SessionToken, TokenStore};
