use super::otp::valid_email;
use crate::notify::GoogleOAuthOptions;
use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_GMAIL_SENDER: &str = "gmail-sender";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_GOOGLE_REFRESH_TOKEN: &str = "google-refresh-token";

#[derive(Debug, Clone)]
pub struct Options {
    pub sender: String,
    pub oauth: GoogleOAuthOptions,
}

impl Options {
    /// Parse Gmail sender and Google OAuth credentials; `None` when none are set.
    ///
    /// # Errors
    /// Returns an error when only part of the set is provided or the sender is not
    /// an email address.
    pub fn parse(matches: &ArgMatches) -> Result<Option<Self>> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        match (
            get_non_empty(ARG_GMAIL_SENDER),
            get_non_empty(ARG_GOOGLE_CLIENT_ID),
            get_non_empty(ARG_GOOGLE_CLIENT_SECRET),
            get_non_empty(ARG_GOOGLE_REFRESH_TOKEN),
        ) {
            (Some(sender), Some(client_id), Some(client_secret), Some(refresh_token)) => {
                if !valid_email(&sender) {
                    bail!("invalid --{ARG_GMAIL_SENDER}: {sender}");
                }
                Ok(Some(Self {
                    sender,
                    oauth: GoogleOAuthOptions {
                        client_id,
                        client_secret: SecretString::from(client_secret),
                        refresh_token: SecretString::from(refresh_token),
                    },
                }))
            }
            (None, None, None, None) => Ok(None),
            _ => bail!(
                "Gmail credentials are incomplete: set all of --{ARG_GMAIL_SENDER}, --{ARG_GOOGLE_CLIENT_ID}, --{ARG_GOOGLE_CLIENT_SECRET}, --{ARG_GOOGLE_REFRESH_TOKEN} or none"
            ),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GMAIL_SENDER)
                .long(ARG_GMAIL_SENDER)
                .help("Gmail account the booking emails are sent from")
                .env("OTPGATE_GMAIL_SENDER"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id")
                .env("OTPGATE_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("OTPGATE_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_GOOGLE_REFRESH_TOKEN)
                .long(ARG_GOOGLE_REFRESH_TOKEN)
                .help("Google OAuth refresh token with the gmail.send scope")
                .env("OTPGATE_GOOGLE_REFRESH_TOKEN")
                .hide_env_values(true),
        )
}
