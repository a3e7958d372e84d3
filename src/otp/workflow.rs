//! Issue and verify one-time passcodes for booking requests.
//!
//! Per phone number the workflow moves `NONE -> PENDING` on issue, stays `PENDING`
//! on a failed verify, and returns to `NONE` on a successful verify, on expiry, or
//! (briefly, before the replacement is stored) on re-issue.

use super::booking::booking_email;
use super::code::OtpCode;
use super::error::OtpError;
use super::phone::{Canonicalizer, DEFAULT_CALLING_CODE};
use super::rate_limit::{RateLimitDecision, RateLimiter};
use super::registry::{Challenge, DEFAULT_OTP_TTL, MAX_OTP_TTL, OtpRegistry};
use crate::notify::{EmailSender, SmsSender};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    operator_email: String,
    calling_code: String,
    otp_ttl: Duration,
}

impl WorkflowConfig {
    #[must_use]
    pub fn new(operator_email: String) -> Self {
        Self {
            operator_email,
            calling_code: DEFAULT_CALLING_CODE.to_string(),
            otp_ttl: DEFAULT_OTP_TTL,
        }
    }

    #[must_use]
    pub fn with_calling_code(mut self, calling_code: String) -> Self {
        self.calling_code = calling_code;
        self
    }

    /// Values above [`MAX_OTP_TTL`] are clamped to it.
    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: u64) -> Self {
        self.otp_ttl = Duration::from_secs(seconds).min(MAX_OTP_TTL);
        self
    }

    #[must_use]
    pub fn operator_email(&self) -> &str {
        &self.operator_email
    }

    #[must_use]
    pub fn calling_code(&self) -> &str {
        &self.calling_code
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        self.otp_ttl
    }
}

pub struct VerificationWorkflow {
    canonicalizer: Canonicalizer,
    registry: OtpRegistry<Value>,
    rate_limiter: Arc<dyn RateLimiter>,
    sms: Arc<dyn SmsSender>,
    email: Arc<dyn EmailSender>,
    operator_email: String,
    otp_ttl: Duration,
}

impl VerificationWorkflow {
    /// # Errors
    /// Returns an error if the configured calling code is malformed.
    pub fn new(
        config: WorkflowConfig,
        rate_limiter: Arc<dyn RateLimiter>,
        sms: Arc<dyn SmsSender>,
        email: Arc<dyn EmailSender>,
    ) -> Result<Self> {
        Ok(Self {
            canonicalizer: Canonicalizer::new(config.calling_code())?,
            registry: OtpRegistry::new(),
            rate_limiter,
            sms,
            email,
            operator_email: config.operator_email,
            otp_ttl: config.otp_ttl,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &OtpRegistry<Value> {
        &self.registry
    }

    #[must_use]
    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Text a fresh code to `raw_number` and park `form` until it is verified.
    ///
    /// Nothing is stored unless the SMS was accepted, so a stored code is always one
    /// the visitor was actually sent.
    ///
    /// # Errors
    /// [`OtpError::RateLimited`], [`OtpError::InvalidPhoneNumber`] or
    /// [`OtpError::DeliveryFailed`].
    #[instrument(skip_all)]
    pub async fn issue(
        &self,
        client: Option<&str>,
        raw_number: &str,
        form: Value,
    ) -> Result<(), OtpError> {
        if self.rate_limiter.check(client) == RateLimitDecision::Limited {
            warn!(client = client.unwrap_or("unknown"), "OTP issuance rate limited");
            return Err(OtpError::RateLimited);
        }

        let number = self.canonicalizer.canonicalize(raw_number)?;
        let code = OtpCode::generate();

        if let Err(err) = self
            .sms
            .send(number.as_str(), &format!("Your OTP is: {code}"))
            .await
        {
            error!(phone = %number, "Error sending OTP: {err:#}");
            return Err(OtpError::DeliveryFailed);
        }

        self.registry
            .put(number.clone(), Challenge::new(code, form, self.otp_ttl))
            .await;

        info!(phone = %number, "OTP sent");

        Ok(())
    }

    /// Check `submitted_code` for `raw_number` and forward the booking on success.
    ///
    /// The challenge is consumed before the email goes out; a failed email does not
    /// bring it back.
    ///
    /// # Errors
    /// [`OtpError::InvalidPhoneNumber`], [`OtpError::VerificationFailed`] or
    /// [`OtpError::NotificationFailed`].
    #[instrument(skip_all)]
    pub async fn verify(&self, raw_number: &str, submitted_code: &str) -> Result<(), OtpError> {
        let number = self.canonicalizer.canonicalize(raw_number)?;

        let code = OtpCode::parse(submitted_code).ok_or(OtpError::VerificationFailed)?;

        let form = self.registry.consume(&number, code).await.map_err(|err| {
            info!(phone = %number, reason = %err, "OTP verification failed");
            OtpError::from(err)
        })?;

        info!(phone = %number, "OTP verified");

        let message = booking_email(&self.operator_email, &number, &form);
        if let Err(err) = self.email.send(&message).await {
            error!(phone = %number, "Error sending booking email: {err:#}");
            return Err(OtpError::NotificationFailed);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::EmailMessage;
    use crate::otp::rate_limit::{FixedWindowRateLimiter, NoopRateLimiter};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::sleep;

    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingSms {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }

        fn last_code(&self) -> String {
            self.sent()
                .last()
                .and_then(|(_, body)| body.strip_prefix("Your OTP is: "))
                .map(str::to_string)
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send(&self, to: &str, body: &str) -> Result<()> {
            if self.fail {
                return Err(anyhow!("carrier unavailable"));
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((to.to_string(), body.to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingEmail {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    impl RecordingEmail {
        fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmail {
        async fn send(&self, message: &EmailMessage) -> Result<()> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(message.clone());
            }
            if self.fail {
                return Err(anyhow!("smtp down"));
            }
            Ok(())
        }
    }

    struct Harness {
        workflow: VerificationWorkflow,
        sms: Arc<RecordingSms>,
        email: Arc<RecordingEmail>,
    }

    fn harness_with(
        rate_limiter: Arc<dyn RateLimiter>,
        sms: RecordingSms,
        email: RecordingEmail,
    ) -> Result<Harness> {
        let sms = Arc::new(sms);
        let email = Arc::new(email);
        let workflow = VerificationWorkflow::new(
            WorkflowConfig::new("ops@example.com".to_string()),
            rate_limiter,
            sms.clone(),
            email.clone(),
        )?;
        Ok(Harness {
            workflow,
            sms,
            email,
        })
    }

    fn harness() -> Result<Harness> {
        harness_with(
            Arc::new(NoopRateLimiter),
            RecordingSms::default(),
            RecordingEmail::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_issue_and_verify() -> Result<()> {
        let h = harness()?;

        h.workflow
            .issue(Some("10.0.0.1"), "9876543210", json!({"name": "A"}))
            .await?;

        let sent = h.sms.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+919876543210");
        let code = h.sms.last_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(h.workflow.registry().len().await, 1);

        h.workflow.verify("9876543210", &code).await?;

        let emails = h.email.sent();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].to, "ops@example.com");
        assert!(emails[0].body.contains("Name: A"));
        assert!(h.workflow.registry().is_empty().await);

        assert_eq!(
            h.workflow.verify("9876543210", &code).await,
            Err(OtpError::VerificationFailed)
        );
        assert_eq!(h.email.sent().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn verify_without_issue_fails_quietly() -> Result<()> {
        let h = harness()?;
        assert_eq!(
            h.workflow.verify("9876543210", "999999").await,
            Err(OtpError::VerificationFailed)
        );
        assert!(h.email.sent().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn reissue_invalidates_first_code() -> Result<()> {
        let h = harness()?;

        h.workflow.issue(None, "9876543210", json!({"name": "A"})).await?;
        let first = h.sms.last_code();
        h.workflow.issue(None, "9876543210", json!({"name": "B"})).await?;
        let second = h.sms.last_code();

        if first != second {
            assert_eq!(
                h.workflow.verify("9876543210", &first).await,
                Err(OtpError::VerificationFailed)
            );
        }
        h.workflow.verify("9876543210", &second).await?;

        let emails = h.email.sent();
        assert_eq!(emails.len(), 1);
        assert!(emails[0].body.contains("Name: B"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_code_fails_and_number_starts_fresh() -> Result<()> {
        let h = harness()?;

        h.workflow.issue(None, "9876543210", json!({"name": "A"})).await?;
        let code = h.sms.last_code();

        sleep(DEFAULT_OTP_TTL + Duration::from_secs(1)).await;

        assert_eq!(
            h.workflow.verify("9876543210", &code).await,
            Err(OtpError::VerificationFailed)
        );
        assert!(h.workflow.registry().is_empty().await);

        h.workflow.issue(None, "9876543210", json!({"name": "A"})).await?;
        let code = h.sms.last_code();
        h.workflow.verify("9876543210", &code).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_code_keeps_challenge_pending() -> Result<()> {
        let h = harness()?;

        h.workflow.issue(None, "9876543210", json!({"name": "A"})).await?;
        let code = h.sms.last_code();
        let wrong = if code == "100000" { "100001" } else { "100000" };

        assert_eq!(
            h.workflow.verify("9876543210", wrong).await,
            Err(OtpError::VerificationFailed)
        );
        assert_eq!(
            h.workflow.verify("9876543210", "not-a-code").await,
            Err(OtpError::VerificationFailed)
        );
        h.workflow.verify("98765-43210", &code).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_number_is_rejected_before_sms() -> Result<()> {
        let h = harness()?;

        assert_eq!(
            h.workflow.issue(None, "12345", json!({})).await,
            Err(OtpError::InvalidPhoneNumber)
        );
        assert_eq!(
            h.workflow.verify("12345", "123456").await,
            Err(OtpError::InvalidPhoneNumber)
        );
        assert!(h.sms.sent().is_empty());
        assert!(h.workflow.registry().is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_registers_nothing() -> Result<()> {
        let h = harness_with(
            Arc::new(NoopRateLimiter),
            RecordingSms::failing(),
            RecordingEmail::default(),
        )?;

        assert_eq!(
            h.workflow.issue(None, "9876543210", json!({})).await,
            Err(OtpError::DeliveryFailed)
        );
        assert!(h.workflow.registry().is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_notification_still_consumes() -> Result<()> {
        let h = harness_with(
            Arc::new(NoopRateLimiter),
            RecordingSms::default(),
            RecordingEmail {
                fail: true,
                ..RecordingEmail::default()
            },
        )?;

        h.workflow.issue(None, "9876543210", json!({"name": "A"})).await?;
        let code = h.sms.last_code();

        assert_eq!(
            h.workflow.verify("9876543210", &code).await,
            Err(OtpError::NotificationFailed)
        );
        assert!(h.workflow.registry().is_empty().await);
        assert_eq!(
            h.workflow.verify("9876543210", &code).await,
            Err(OtpError::VerificationFailed)
        );
        assert_eq!(h.sms.sent().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_blocks_before_sms() -> Result<()> {
        let h = harness_with(
            Arc::new(FixedWindowRateLimiter::default()),
            RecordingSms::default(),
            RecordingEmail::default(),
        )?;

        for _ in 0..5 {
            h.workflow
                .issue(Some("10.0.0.1"), "9876543210", json!({}))
                .await?;
        }
        assert_eq!(
            h.workflow
                .issue(Some("10.0.0.1"), "9876543210", json!({}))
                .await,
            Err(OtpError::RateLimited)
        );
        assert_eq!(h.sms.sent().len(), 5);

        h.workflow
            .issue(Some("10.0.0.2"), "9876543210", json!({}))
            .await?;
        assert_eq!(h.sms.sent().len(), 6);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_verifies_succeed_once() -> Result<()> {
        let h = harness()?;

        h.workflow.issue(None, "9876543210", json!({"name": "A"})).await?;
        let code = h.sms.last_code();

        let (first, second) = tokio::join!(
            h.workflow.verify("9876543210", &code),
            h.workflow.verify("9876543210", &code)
        );

        assert_eq!(
            [first, second].iter().filter(|result| result.is_ok()).count(),
            1
        );
        assert_eq!(h.email.sent().len(), 1);
        Ok(())
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = WorkflowConfig::new("ops@example.com".to_string());
        assert_eq!(config.operator_email(), "ops@example.com");
        assert_eq!(config.calling_code(), DEFAULT_CALLING_CODE);
        assert_eq!(config.otp_ttl(), DEFAULT_OTP_TTL);

        let config = config
            .with_calling_code("+1".to_string())
            .with_otp_ttl_seconds(30);
        assert_eq!(config.calling_code(), "+1");
        assert_eq!(config.otp_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn malformed_calling_code_is_rejected() {
        let result = VerificationWorkflow::new(
            WorkflowConfig::new("ops@example.com".to_string()).with_calling_code("91".to_string()),
            Arc::new(NoopRateLimiter),
            Arc::new(RecordingSms::default()),
            Arc::new(RecordingEmail::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_ttl_still_issues() -> Result<()> {
        let sms = Arc::new(RecordingSms::default());
        let workflow = VerificationWorkflow::new(
            WorkflowConfig::new("ops@example.com".to_string()).with_otp_ttl_seconds(u64::MAX),
            Arc::new(NoopRateLimiter),
            sms.clone(),
            Arc::new(RecordingEmail::default()),
        )?;
        assert_eq!(workflow.otp_ttl, MAX_OTP_TTL);

        workflow.issue(None, "9876543210", json!({})).await?;
        assert_eq!(workflow.registry().len().await, 1);
        workflow.verify("9876543210", &sms.last_code()).await?;
        Ok(())
    }
}
