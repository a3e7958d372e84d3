//! OAuth access tokens for outbound mail.
//!
//! Gmail wants a short-lived bearer token. [`GoogleTokenProvider`] exchanges the
//! long-lived refresh token for one and caches it until shortly before expiry.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_EXPIRES_IN_SECONDS: u64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<SecretString>;
}

/// Provider for a token obtained out of band; never refreshes.
#[derive(Clone)]
pub struct StaticTokenProvider(SecretString);

impl StaticTokenProvider {
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<SecretString> {
        Ok(self.0.clone())
    }
}

#[derive(Clone)]
pub struct GoogleOAuthOptions {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
}

impl std::fmt::Debug for GoogleOAuthOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOAuthOptions")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

pub struct GoogleTokenProvider {
    client: Client,
    options: GoogleOAuthOptions,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleTokenProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: GoogleOAuthOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build OAuth HTTP client")?;

        Ok(Self {
            client,
            options,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    async fn refresh(&self) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.options.client_id.as_str()),
            ("client_secret", self.options.client_secret.expose_secret()),
            ("refresh_token", self.options.refresh_token.expose_secret()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .context("request to OAuth token endpoint failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body: Value = response.json().await.unwrap_or_default();
            return Err(anyhow!(
                "{} - {}, {}",
                self.token_url,
                status,
                error_body["error_description"]
                    .as_str()
                    .or_else(|| error_body["error"].as_str())
                    .unwrap_or("")
            ));
        }

        response
            .json::<TokenResponse>()
            .await
            .context("Error parsing OAuth token response")
    }
}

#[async_trait]
impl AccessTokenProvider for GoogleTokenProvider {
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<SecretString> {
        // Holding the lock across the refresh keeps concurrent callers to one request.
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref()
            && Instant::now() < entry.refresh_at
        {
            return Ok(entry.token.clone());
        }

        let response = self.refresh().await?;
        let lifetime =
            Duration::from_secs(response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS));
        let token = SecretString::from(response.access_token);

        debug!(expires_in = lifetime.as_secs(), "refreshed OAuth access token");

        let now = Instant::now();
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: now
                .checked_add(lifetime.saturating_sub(REFRESH_MARGIN))
                .unwrap_or(now),
        });

        Ok(token)
    }
}
