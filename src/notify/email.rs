//! Email delivery abstractions.
//!
//! The workflow hands an [`EmailMessage`] to an [`EmailSender`] and only cares about
//! `Ok`/`Err`. [`GmailSender`] delivers through the Gmail REST API using an OAuth
//! bearer token; [`LogEmailSender`] logs the message and returns `Ok(())`.

use super::oauth::AccessTokenProvider;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64ct::{Base64Url, Encoding};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const GMAIL_API_BASE_URL: &str = "https://gmail.googleapis.com";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the verification workflow.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error describing why it was not sent.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "email send stub"
        );
        Ok(())
    }
}

pub struct GmailSender {
    client: Client,
    from: String,
    tokens: Arc<dyn AccessTokenProvider>,
    base_url: String,
}

impl GmailSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(from: String, tokens: Arc<dyn AccessTokenProvider>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build Gmail HTTP client")?;

        Ok(Self {
            client,
            from,
            tokens,
            base_url: GMAIL_API_BASE_URL.to_string(),
        })
    }

    /// Point the sender at another API host (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmailSender for GmailSender {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let token = self
            .tokens
            .access_token()
            .await
            .context("could not obtain Gmail access token")?;

        let raw = Base64Url::encode_string(rfc5322_message(&self.from, message).as_bytes());
        let send_url = format!("{}/gmail/v1/users/me/messages/send", self.base_url);

        let response = self
            .client
            .post(&send_url)
            .bearer_auth(token.expose_secret())
            .json(&json!({ "raw": raw }))
            .send()
            .await
            .context("request to Gmail failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body: Value = response.json().await.unwrap_or_default();
            return Err(anyhow!(
                "{} - {}, {}",
                send_url,
                status,
                error_body["error"]["message"].as_str().unwrap_or("")
            ));
        }

        let json_response: Value = response.json().await.unwrap_or_default();
        debug!(
            id = json_response["id"].as_str().unwrap_or(""),
            "Gmail accepted message"
        );

        Ok(())
    }
}

/// Render a plain text RFC 5322 message. Header values are flattened to one line.
pub(crate) fn rfc5322_message(from: &str, message: &EmailMessage) -> String {
    format!(
        "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}",
        header_value(from),
        header_value(&message.to),
        header_value(&message.subject),
        message.body.replace("\r\n", "\n").replace('\n', "\r\n")
    )
}

fn header_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
