use crate::notify::TwilioOptions;
use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_TWILIO_ACCOUNT_SID: &str = "twilio-account-sid";
pub const ARG_TWILIO_AUTH_TOKEN: &str = "twilio-auth-token";
pub const ARG_TWILIO_FROM_NUMBER: &str = "twilio-from-number";

const GROUP: [&str; 3] = [
    ARG_TWILIO_ACCOUNT_SID,
    ARG_TWILIO_AUTH_TOKEN,
    ARG_TWILIO_FROM_NUMBER,
];

/// Parse Twilio credentials; `None` when none of them are set.
///
/// # Errors
/// Returns an error when only part of the credential set is provided.
pub fn parse(matches: &ArgMatches) -> Result<Option<TwilioOptions>> {
    let get_non_empty = |id: &str| {
        matches
            .get_one::<String>(id)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    match (
        get_non_empty(ARG_TWILIO_ACCOUNT_SID),
        get_non_empty(ARG_TWILIO_AUTH_TOKEN),
        get_non_empty(ARG_TWILIO_FROM_NUMBER),
    ) {
        (Some(account_sid), Some(auth_token), Some(from_number)) => Ok(Some(TwilioOptions {
            account_sid,
            auth_token: SecretString::from(auth_token),
            from_number,
        })),
        (None, None, None) => Ok(None),
        _ => bail!(
            "Twilio credentials are incomplete: set all of --{} or none",
            GROUP.join(", --")
        ),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TWILIO_ACCOUNT_SID)
                .long(ARG_TWILIO_ACCOUNT_SID)
                .help("Twilio account SID")
                .env("OTPGATE_TWILIO_ACCOUNT_SID"),
        )
        .arg(
            Arg::new(ARG_TWILIO_AUTH_TOKEN)
                .long(ARG_TWILIO_AUTH_TOKEN)
                .help("Twilio auth token")
                .env("OTPGATE_TWILIO_AUTH_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TWILIO_FROM_NUMBER)
                .long(ARG_TWILIO_FROM_NUMBER)
                .help("Twilio sender number in E.164 form")
                .env("OTPGATE_TWILIO_FROM_NUMBER"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn parse_args(args: &[&str]) -> Result<Option<TwilioOptions>> {
        temp_env::with_vars(
            [
                ("OTPGATE_TWILIO_ACCOUNT_SID", None::<&str>),
                ("OTPGATE_TWILIO_AUTH_TOKEN", None::<&str>),
                ("OTPGATE_TWILIO_FROM_NUMBER", None::<&str>),
            ],
            || {
                let mut argv = vec!["otpgate"];
                argv.extend_from_slice(args);
                let matches = with_args(Command::new("otpgate")).try_get_matches_from(argv)?;
                parse(&matches)
            },
        )
    }

    #[test]
    fn none_set() -> Result<()> {
        assert!(parse_args(&[])?.is_none());
        Ok(())
    }

    #[test]
    fn all_set() -> Result<()> {
        let options = parse_args(&[
            "--twilio-account-sid",
            "AC123",
            "--twilio-auth-token",
            "secret",
            "--twilio-from-number",
            "+15005550006",
        ])?;
        let Some(options) = options else {
            bail!("expected Twilio options");
        };
        assert_eq!(options.account_sid, "AC123");
        assert_eq!(options.auth_token.expose_secret(), "secret");
        assert_eq!(options.from_number, "+15005550006");
        Ok(())
    }

    #[test]
    fn partial_set_is_rejected() {
        let result = parse_args(&["--twilio-account-sid", "AC123"]);
        assert!(result.is_err());

        let result = parse_args(&[
            "--twilio-account-sid",
            "AC123",
            "--twilio-auth-token",
            "secret",
        ]);
        assert!(result.is_err());
    }
}
