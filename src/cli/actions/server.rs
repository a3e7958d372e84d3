use crate::{
    api::{self, ApiOptions},
    cli::{commands::email, telemetry},
    notify::{
        EmailSender, GmailSender, GoogleTokenProvider, LogEmailSender, LogSmsSender, SmsSender,
        TwilioOptions, TwilioSmsSender,
    },
    otp::{FixedWindowRateLimiter, VerificationWorkflow, WorkflowConfig},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub trust_proxy_headers: bool,
    pub otp_ttl_seconds: u64,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_max: u32,
    pub calling_code: String,
    pub operator_email: String,
    pub twilio: Option<TwilioOptions>,
    pub gmail: Option<email::Options>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if a delivery client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let workflow = Arc::new(build_workflow(&args)?);

    let options = ApiOptions {
        allowed_origins: args.allowed_origins,
        trust_proxy_headers: args.trust_proxy_headers,
    };

    let result = api::new(args.port, workflow, options).await;

    telemetry::shutdown_tracer();

    result
}

/// Wire the configured senders and rate limiter into a workflow.
///
/// # Errors
/// Returns an error if an HTTP client cannot be built or the calling code is invalid.
pub fn build_workflow(args: &Args) -> Result<VerificationWorkflow> {
    let sms: Arc<dyn SmsSender> = if let Some(twilio) = &args.twilio {
        Arc::new(TwilioSmsSender::new(twilio.clone()).context("Failed to build Twilio client")?)
    } else {
        warn!("Twilio credentials not configured, OTP messages will only be logged");
        Arc::new(LogSmsSender)
    };

    let email: Arc<dyn EmailSender> = if let Some(gmail) = &args.gmail {
        let tokens = GoogleTokenProvider::new(gmail.oauth.clone())
            .context("Failed to build Google OAuth client")?;
        Arc::new(
            GmailSender::new(gmail.sender.clone(), Arc::new(tokens))
                .context("Failed to build Gmail client")?,
        )
    } else {
        warn!("Gmail credentials not configured, booking emails will only be logged");
        Arc::new(LogEmailSender)
    };

    let rate_limiter = Arc::new(FixedWindowRateLimiter::new(
        Duration::from_secs(args.rate_limit_window_seconds),
        args.rate_limit_max,
    ));

    let config = WorkflowConfig::new(args.operator_email.clone())
        .with_calling_code(args.calling_code.clone())
        .with_otp_ttl_seconds(args.otp_ttl_seconds);

    VerificationWorkflow::new(config, rate_limiter, sms, email)
}

fn log_startup_args(args: &Args) {
    info!("{}", startup_message(args));
}

fn startup_message(args: &Args) -> String {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("allowed_origins", args.allowed_origins.join(",")),
        ("trust_proxy_headers", args.trust_proxy_headers.to_string()),
        ("otp_ttl_seconds", args.otp_ttl_seconds.to_string()),
        (
            "rate_limit",
            format!(
                "{} per {}s",
                args.rate_limit_max, args.rate_limit_window_seconds
            ),
        ),
        ("calling_code", args.calling_code.clone()),
        ("operator_email", args.operator_email.clone()),
        (
            "sms",
            args.twilio
                .as_ref()
                .map_or_else(|| "log".to_string(), |t| format!("twilio:{}", t.account_sid)),
        ),
        (
            "email",
            args.gmail
                .as_ref()
                .map_or_else(|| "log".to_string(), |g| format!("gmail:{}", g.sender)),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        message.push_str(&format!("\n  {key}:{padding} {value}"));
    }
    message
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
