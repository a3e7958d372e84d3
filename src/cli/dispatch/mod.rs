//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{
    ARG_ALLOWED_ORIGINS, ARG_PORT, ARG_TRUST_PROXY_HEADERS, email, otp, sms,
};
use anyhow::{Result, bail};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(5000);

    let allowed_origins: Vec<String> = matches
        .get_many::<String>(ARG_ALLOWED_ORIGINS)
        .map(|values| {
            values
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if allowed_origins.is_empty() {
        bail!("--{ARG_ALLOWED_ORIGINS} must list at least one origin");
    }

    let otp_opts = otp::Options::parse(matches)?;
    let twilio = sms::parse(matches)?;
    let gmail = email::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        allowed_origins,
        trust_proxy_headers: matches.get_flag(ARG_TRUST_PROXY_HEADERS),
        otp_ttl_seconds: otp_opts.otp_ttl_seconds,
        rate_limit_window_seconds: otp_opts.rate_limit_window_seconds,
        rate_limit_max: otp_opts.rate_limit_max,
        calling_code: otp_opts.calling_code,
        operator_email: otp_opts.operator_email,
        twilio,
        gmail,
    }))
}
