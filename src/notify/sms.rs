//! SMS delivery.
//!
//! [`TwilioSmsSender`] posts to Twilio's Programmable Messaging API; [`LogSmsSender`]
//! only logs and is what runs when no Twilio credentials are configured.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info, instrument};

const TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

/// Deliver a text message to an already canonicalized number.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<()>;
}

/// Local dev sender that logs the message instead of texting it.
#[derive(Clone, Debug)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        info!(to = %to, body = %body, "sms send stub");
        Ok(())
    }
}

#[derive(Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
}

impl std::fmt::Debug for TwilioOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioOptions")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"***")
            .field("from_number", &self.from_number)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct TwilioSmsSender {
    client: Client,
    options: TwilioOptions,
    base_url: String,
}

impl TwilioSmsSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: TwilioOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build Twilio HTTP client")?;

        Ok(Self {
            client,
            options,
            base_url: TWILIO_API_BASE_URL.to_string(),
        })
    }

    /// Point the sender at another API host (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.options.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    #[instrument(skip(self, body))]
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        let form = [
            ("To", to),
            ("From", self.options.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.options.account_sid,
                Some(self.options.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .await
            .context("request to Twilio failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body: Value = response.json().await.unwrap_or_default();
            return Err(anyhow!(
                "Twilio returned {} - {}",
                status,
                error_body["message"].as_str().unwrap_or("")
            ));
        }

        let json_response: Value = response.json().await.unwrap_or_default();
        debug!(
            sid = json_response["sid"].as_str().unwrap_or(""),
            "Twilio accepted message"
        );

        Ok(())
    }
}
