//! Outbound capabilities used by the OTP workflow: SMS for the code, email for the
//! operator, and the OAuth token source the mail transport needs.

pub mod email;
pub mod oauth;
pub mod sms;

pub use email::{EmailMessage, EmailSender, GmailSender, LogEmailSender};
pub use oauth::{AccessTokenProvider, GoogleOAuthOptions, GoogleTokenProvider, StaticTokenProvider};
pub use sms::{LogSmsSender, SmsSender, TwilioOptions, TwilioSmsSender};
