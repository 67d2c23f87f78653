//! Client-credentials OAuth2 for the Battle.net API.
//!
//! [`AuthenticatedTransport::authenticate`] performs the grant once up front so
//! bad credentials fail the invocation immediately. Afterwards every request
//! sent through the transport carries a bearer token, and the token is
//! re-requested when it gets close to expiry.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::domain::error::PipelineError;

const TOKEN_URL_FORMAT: &str = "https://{region}.battle.net/oauth/token";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Tokens this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

pub fn token_url_for_region(region: &str) -> String {
    TOKEN_URL_FORMAT.replace("{region}", region)
}

/// Credentials for the client-credentials grant.
#[derive(Clone)]
pub struct OAuth2Secrets {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for OAuth2Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Secrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_expired(&self, skew_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(skew_seconds) >= expires_at,
            None => false,
        }
    }
}

impl From<TokenResponse> for AccessToken {
    fn from(response: TokenResponse) -> Self {
        let expires_at = response
            .expires_in
            .map(|seconds| Utc::now() + chrono::Duration::seconds(seconds));
        Self {
            value: response.access_token,
            expires_at,
        }
    }
}

/// HTTP transport that authorizes every request with a fresh bearer token.
pub struct AuthenticatedTransport {
    http: Client,
    token_url: String,
    secrets: OAuth2Secrets,
    token: Mutex<AccessToken>,
}

impl AuthenticatedTransport {
    /// Authenticates against the token endpoint of `region`.
    pub async fn authenticate(secrets: OAuth2Secrets, region: &str) -> Result<Self, PipelineError> {
        Self::with_token_url(secrets, token_url_for_region(region)).await
    }

    pub async fn with_token_url(
        secrets: OAuth2Secrets,
        token_url: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let token_url = token_url.into();
        debug!("Building OAuth2 transport against {}", token_url);

        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| PipelineError::Authentication(format!("failed to build HTTP client: {}", e)))?;

        let token = request_token(&http, &token_url, &secrets).await.map_err(|e| {
            error!("Failed to perform client credentials grant: {}", e);
            e
        })?;
        info!("Obtained initial access token from {}", token_url);

        Ok(Self {
            http,
            token_url,
            secrets,
            token: Mutex::new(token),
        })
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// Sends `request` with the current bearer token attached.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, PipelineError> {
        let token = self.bearer_token().await?;
        let request = request.bearer_auth(token).build().map_err(|e| PipelineError::Upstream {
            context: "request builder".to_string(),
            message: e.to_string(),
        })?;
        let url = request.url().to_string();

        self.http.execute(request).await.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            PipelineError::Upstream {
                context: url,
                message: e.to_string(),
            }
        })
    }

    async fn bearer_token(&self) -> Result<String, PipelineError> {
        let mut token = self.token.lock().await;
        if token.is_expired(EXPIRY_SKEW_SECS) {
            debug!("Access token is about to expire, requesting a new one");
            *token = request_token(&self.http, &self.token_url, &self.secrets).await?;
        }
        Ok(token.value.clone())
    }
}

async fn request_token(
    http: &Client,
    token_url: &str,
    secrets: &OAuth2Secrets,
) -> Result<AccessToken, PipelineError> {
    let response = http
        .post(token_url)
        .basic_auth(&secrets.client_id, Some(&secrets.client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .map_err(|e| PipelineError::Authentication(format!("token endpoint {} unreachable: {}", token_url, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PipelineError::Authentication(format!(
            "token request rejected with status {}: {}",
            status, body
        )));
    }

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| PipelineError::Authentication(format!("malformed token response: {}", e)))?;
    debug!(
        "Token granted, type: {:?}, expires in: {:?}s",
        parsed.token_type, parsed.expires_in
    );

    Ok(parsed.into())
}
