use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, RequestTokenError, Scope, StandardErrorResponse,
    TokenResponse, TokenUrl,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{invalid_argument, Error, Result};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Application identity used for the client-credentials grant.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub tenant_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            client_secret: client_secret.into(),
        };

        if credentials.client_id.trim().is_empty() {
            return Err(invalid_argument("client id must not be empty"));
        }
        if credentials.tenant_id.trim().is_empty() {
            return Err(invalid_argument("tenant id must not be empty"));
        }
        if credentials.client_secret.trim().is_empty() {
            return Err(invalid_argument("client secret must not be empty"));
        }

        Ok(credentials)
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

/// Supplies a bearer token that is valid at the time of the call.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

#[derive(Clone)]
struct CachedToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + TimeDelta::seconds(EXPIRY_SKEW_SECS) < expires_at,
            None => true,
        }
    }
}

/// Acquires Graph tokens with the client-credentials grant and caches them until expiry.
pub struct CredentialManager {
    oauth: BasicClient,
    scope: String,
    timeout: Duration,
    cached: RwLock<Option<CachedToken>>,
}

impl CredentialManager {
    pub fn new(
        credentials: &ClientCredentials,
        authority_host: &str,
        scope: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let authority = format!(
            "{}/{}/oauth2/v2.0",
            authority_host.trim_end_matches('/'),
            credentials.tenant_id
        );
        let auth_url = AuthUrl::new(format!("{authority}/authorize"))
            .map_err(|e| invalid_argument(&format!("invalid authority URL: {e}")))?;
        let token_url = TokenUrl::new(format!("{authority}/token"))
            .map_err(|e| invalid_argument(&format!("invalid token URL: {e}")))?;

        let oauth = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        Ok(Self {
            oauth,
            scope: scope.to_string(),
            timeout,
            cached: RwLock::new(None),
        })
    }

    /// Requests a new token unconditionally and replaces the cached one.
    pub async fn acquire(&self) -> Result<String> {
        let token = self.request_token().await?;
        let secret = token.secret.clone();
        *self.cached.write().await = Some(token);
        Ok(secret)
    }

    /// Expiry of the cached token, if one is cached and the provider reported it.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.cached
            .read()
            .await
            .as_ref()
            .and_then(|token| token.expires_at)
    }

    async fn request_token(&self) -> Result<CachedToken> {
        debug!(scope = %self.scope, "Requesting client-credentials token");

        let request = self
            .oauth
            .exchange_client_credentials()
            .add_scope(Scope::new(self.scope.clone()))
            .request_async(async_http_client);

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| Error::Timeout {
                operation: "token request",
                timeout: self.timeout,
            })?
            .map_err(describe_token_error)?;

        let token = cache_entry(&response, Utc::now());
        info!(
            expires_at = ?token.expires_at,
            "Acquired access token for Microsoft Graph"
        );
        Ok(token)
    }
}

#[async_trait]
impl AccessTokenProvider for CredentialManager {
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.secret.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.secret.clone());
            }
        }

        debug!("Cached access token missing or expired, refreshing");
        let token = self.request_token().await?;
        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }
}

fn cache_entry(response: &BasicTokenResponse, now: DateTime<Utc>) -> CachedToken {
    let expires_at = response
        .expires_in()
        .and_then(|lifetime| TimeDelta::from_std(lifetime).ok())
        .and_then(|lifetime| now.checked_add_signed(lifetime));

    CachedToken {
        secret: response.access_token().secret().clone(),
        expires_at,
    }
}

fn describe_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> Error
where
    RE: std::error::Error + 'static,
{
    let message = match err {
        RequestTokenError::ServerResponse(response) => describe_server_response(&response),
        RequestTokenError::Request(e) => format!("token request failed: {e}"),
        RequestTokenError::Parse(e, _) => format!("unreadable token response: {e}"),
        RequestTokenError::Other(e) => e,
    };
    Error::Authentication(message)
}

fn describe_server_response<T>(response: &StandardErrorResponse<T>) -> String
where
    T: oauth2::ErrorResponseType + std::fmt::Display,
{
    match response.error_description() {
        Some(description) => format!("{}: {}", response.error(), description),
        None => response.error().to_string(),
    }
}
