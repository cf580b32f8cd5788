//! Google service-account authentication.
//!
//! Signs an RS256 assertion with the service-account key and exchanges it at
//! the OAuth2 token endpoint for a short-lived bearer token.

use crate::{
    config::GoogleConfig,
    services::transport::{execute_with_timeout, HttpRequest, HttpTransport, TransportError},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime requested for the signed assertion
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached tokens are dropped this long before they actually expire
const CACHE_EXPIRY_SKEW_SECS: i64 = 60;

/// Service-account credential loaded once at startup
#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredential {
    pub client_email: String,
    pub private_key: String,
}

impl std::fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read service account key file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid service account JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("service account is missing {0}")]
    MissingField(&'static str),
}

impl ServiceAccountCredential {
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        let credential: Self = serde_json::from_str(raw)?;
        if credential.client_email.trim().is_empty() {
            return Err(CredentialError::MissingField("client_email"));
        }
        if credential.private_key.trim().is_empty() {
            return Err(CredentialError::MissingField("private_key"));
        }
        Ok(credential)
    }

    /// Load the credential from inline JSON or a key file, if either is configured
    pub fn load(config: &GoogleConfig) -> Result<Option<Self>, CredentialError> {
        if let Some(raw) = config.service_account_json.as_deref() {
            return Self::from_json(raw).map(Some);
        }
        if let Some(path) = config.service_account_key_path.as_deref() {
            let raw = std::fs::read_to_string(path)?;
            return Self::from_json(&raw).map(Some);
        }
        Ok(None)
    }
}

/// Bearer token issued by the token endpoint
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    #[error("token endpoint rejected the assertion with status {0}")]
    Rejected(u16),

    #[error("token endpoint response has no access_token")]
    MissingToken,

    #[error("token endpoint returned unusable expires_in {0}")]
    InvalidLifetime(i64),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Claims of the signed service-account assertion
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

pub struct TokenService {
    transport: Arc<dyn HttpTransport>,
    token_url: String,
    scope: String,
    timeout: Duration,
    /// Tokens keyed by service-account email; `None` re-authenticates every call
    cache: Option<RwLock<HashMap<String, AccessToken>>>,
}

impl TokenService {
    pub fn new(config: &GoogleConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            token_url: config.token_url.clone(),
            scope: config.scope.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            cache: config
                .cache_access_token
                .then(|| RwLock::new(HashMap::new())),
        }
    }

    /// Build the RS256-signed assertion for `credential`
    pub fn sign_assertion(
        &self,
        credential: &ServiceAccountCredential,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let iat = now.unix_timestamp();
        let claims = AssertionClaims {
            iss: credential.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.token_url.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(credential.private_key.as_bytes())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| TokenError::InvalidKey(e.to_string()))
    }

    /// Obtain a bearer token for `credential`
    #[instrument(skip_all, fields(client_email = %credential.client_email))]
    pub async fn get_access_token(
        &self,
        credential: &ServiceAccountCredential,
    ) -> Result<AccessToken, TokenError> {
        let now = OffsetDateTime::now_utc();

        if let Some(cache) = &self.cache {
            let cached = cache.read().await;
            if let Some(token) = cached.get(&credential.client_email) {
                let remaining = (token.expires_at - now).whole_seconds();
                if remaining > CACHE_EXPIRY_SKEW_SECS {
                    debug!("Using cached access token ({}s remaining)", remaining);
                    return Ok(token.clone());
                }
            }
        }

        let token = self.exchange(credential, now).await?;

        if let Some(cache) = &self.cache {
            cache
                .write()
                .await
                .insert(credential.client_email.clone(), token.clone());
            info!("Access token cached until {}", token.expires_at);
        }

        Ok(token)
    }

    async fn exchange(
        &self,
        credential: &ServiceAccountCredential,
        now: OffsetDateTime,
    ) -> Result<AccessToken, TokenError> {
        let assertion = self.sign_assertion(credential, now)?;

        let request = HttpRequest::post_form(
            self.token_url.clone(),
            vec![
                ("grant_type".to_string(), JWT_BEARER_GRANT.to_string()),
                ("assertion".to_string(), assertion),
            ],
        );

        let response = execute_with_timeout(self.transport.as_ref(), request, self.timeout).await?;

        if !response.is_success() {
            return Err(TokenError::Rejected(response.status));
        }

        let body: TokenEndpointResponse = response.json()?;
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingToken)?;

        let lifetime = body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);

        let expires_at = Some(lifetime)
            .filter(|secs| *secs > 0)
            .and_then(|secs| now.checked_add(time::Duration::seconds(secs)))
            .ok_or(TokenError::InvalidLifetime(lifetime))?;

        debug!("Obtained access token valid for {}s", lifetime);

        Ok(AccessToken { token, expires_at })
    }
}
