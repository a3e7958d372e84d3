//! # otpgate
//!
//! Phone-verified booking requests. A visitor submits a booking form together with
//! a mobile number; the service texts a six digit one-time passcode to that number
//! and only forwards the booking to the operator's inbox once the visitor proves
//! they received it.
//!
//! ## Flow
//!
//! - `POST /api/submit` rate-limits the caller, canonicalizes the number, sends the
//!   code over SMS and parks the form in the in-memory [`otp::OtpRegistry`].
//! - `POST /api/verify` consumes the pending challenge (single use) and emails the
//!   booking to the operator.
//!
//! Wrong, expired and never-issued codes all fail the same way so the API does not
//! reveal whether a number has a pending code.

pub mod api;
pub mod cli;
pub mod notify;
pub mod otp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
