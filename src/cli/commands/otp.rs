use crate::otp::phone::{DEFAULT_CALLING_CODE, valid_calling_code};
use anyhow::{Result, anyhow, bail};
use clap::{Arg, ArgMatches, Command};
use regex::Regex;

pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_RATE_LIMIT_WINDOW_SECONDS: &str = "rate-limit-window-seconds";
pub const ARG_RATE_LIMIT_MAX: &str = "rate-limit-max";
pub const ARG_CALLING_CODE: &str = "calling-code";
pub const ARG_OPERATOR_EMAIL: &str = "operator-email";

/// Upper bound for the OTP TTL and the rate limit window.
pub const MAX_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Options {
    pub otp_ttl_seconds: u64,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_max: u32,
    pub calling_code: String,
    pub operator_email: String,
}

impl Options {
    /// Parse OTP and rate limiting arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the operator email or calling code is malformed, or a
    /// limit is zero or a duration exceeds [`MAX_SECONDS`].
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let operator_email = matches
            .get_one::<String>(ARG_OPERATOR_EMAIL)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_OPERATOR_EMAIL}"))?;

        if !valid_email(&operator_email) {
            bail!("invalid --{ARG_OPERATOR_EMAIL}: {operator_email}");
        }

        let calling_code = matches
            .get_one::<String>(ARG_CALLING_CODE)
            .map_or_else(|| DEFAULT_CALLING_CODE.to_string(), |v| v.trim().to_string());

        if !valid_calling_code(&calling_code) {
            bail!("invalid --{ARG_CALLING_CODE}: {calling_code} (expected e.g. +91)");
        }

        let otp_ttl_seconds = matches
            .get_one::<u64>(ARG_OTP_TTL_SECONDS)
            .copied()
            .unwrap_or(600);
        let rate_limit_window_seconds = matches
            .get_one::<u64>(ARG_RATE_LIMIT_WINDOW_SECONDS)
            .copied()
            .unwrap_or(900);
        let rate_limit_max = matches
            .get_one::<u32>(ARG_RATE_LIMIT_MAX)
            .copied()
            .unwrap_or(5);

        if otp_ttl_seconds == 0 {
            bail!("--{ARG_OTP_TTL_SECONDS} must be greater than zero");
        }
        if rate_limit_window_seconds == 0 || rate_limit_max == 0 {
            bail!(
                "--{ARG_RATE_LIMIT_WINDOW_SECONDS} and --{ARG_RATE_LIMIT_MAX} must be greater than zero"
            );
        }
        if otp_ttl_seconds > MAX_SECONDS {
            bail!("--{ARG_OTP_TTL_SECONDS} must be at most {MAX_SECONDS}");
        }
        if rate_limit_window_seconds > MAX_SECONDS {
            bail!("--{ARG_RATE_LIMIT_WINDOW_SECONDS} must be at most {MAX_SECONDS}");
        }

        Ok(Self {
            otp_ttl_seconds,
            rate_limit_window_seconds,
            rate_limit_max,
            calling_code,
            operator_email,
        })
    }
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OPERATOR_EMAIL)
                .long(ARG_OPERATOR_EMAIL)
                .help("Mailbox that receives verified booking requests")
                .env("OTPGATE_OPERATOR_EMAIL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CALLING_CODE)
                .long(ARG_CALLING_CODE)
                .help("Country calling code prefixed to local mobile numbers")
                .env("OTPGATE_CALLING_CODE")
                .default_value(DEFAULT_CALLING_CODE),
        )
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("Seconds an issued OTP stays valid")
                .env("OTPGATE_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .long(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .help("Length of the per-client OTP issuance window in seconds")
                .env("OTPGATE_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_MAX)
                .long(ARG_RATE_LIMIT_MAX)
                .help("OTP requests allowed per client within one window")
                .env("OTPGATE_RATE_LIMIT_MAX")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_from(args: &[&str]) -> Result<ArgMatches, clap::Error> {
        let command = with_args(Command::new("otpgate"));
        let mut argv = vec!["otpgate"];
        argv.extend_from_slice(args);
        command.try_get_matches_from(argv)
    }

    fn with_cleared_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        temp_env::with_vars(
            [
                ("OTPGATE_OPERATOR_EMAIL", None::<&str>),
                ("OTPGATE_CALLING_CODE", None::<&str>),
                ("OTPGATE_OTP_TTL_SECONDS", None::<&str>),
                ("OTPGATE_RATE_LIMIT_WINDOW_SECONDS", None::<&str>),
                ("OTPGATE_RATE_LIMIT_MAX", None::<&str>),
            ],
            f,
        )
    }

    #[test]
    fn defaults() -> Result<()> {
        with_cleared_env(|| {
            let matches = matches_from(&["--operator-email", "bookings@example.com"])?;
            let options = Options::parse(&matches)?;
            assert_eq!(options.operator_email, "bookings@example.com");
            assert_eq!(options.calling_code, "+91");
            assert_eq!(options.otp_ttl_seconds, 600);
            assert_eq!(options.rate_limit_window_seconds, 900);
            assert_eq!(options.rate_limit_max, 5);
            Ok(())
        })
    }

    #[test]
    fn operator_email_is_required() {
        with_cleared_env(|| {
            let result = matches_from(&[]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }

    #[test]
    fn rejects_malformed_operator_email() -> Result<()> {
        with_cleared_env(|| {
            let matches = matches_from(&["--operator-email", "not-an-email"])?;
            assert!(Options::parse(&matches).is_err());
            Ok(())
        })
    }

    #[test]
    fn rejects_malformed_calling_code() -> Result<()> {
        with_cleared_env(|| {
            for code in ["91", "+", "+12345", "+9a"] {
                let matches =
                    matches_from(&["--operator-email", "ops@example.com", "--calling-code", code])?;
                assert!(Options::parse(&matches).is_err(), "accepted {code}");
            }
            Ok(())
        })
    }

    #[test]
    fn rejects_zero_limits() -> Result<()> {
        with_cleared_env(|| {
            let matches =
                matches_from(&["--operator-email", "ops@example.com", "--rate-limit-max", "0"])?;
            assert!(Options::parse(&matches).is_err());

            let matches =
                matches_from(&["--operator-email", "ops@example.com", "--otp-ttl-seconds", "0"])?;
            assert!(Options::parse(&matches).is_err());
            Ok(())
        })
    }

    #[test]
    fn rejects_durations_above_one_day() -> Result<()> {
        with_cleared_env(|| {
            for flag in ["--otp-ttl-seconds", "--rate-limit-window-seconds"] {
                for value in ["86401", "18446744073709551615"] {
                    let matches =
                        matches_from(&["--operator-email", "ops@example.com", flag, value])?;
                    assert!(Options::parse(&matches).is_err(), "accepted {flag} {value}");
                }
                let matches =
                    matches_from(&["--operator-email", "ops@example.com", flag, "86400"])?;
                assert!(Options::parse(&matches).is_ok(), "rejected {flag} 86400");
            }
            Ok(())
        })
    }

    #[test]
    fn reads_environment() {
        temp_env::with_vars(
            [
                ("OTPGATE_OPERATOR_EMAIL", Some("desk@thewheeldeal.in")),
                ("OTPGATE_CALLING_CODE", Some("+1")),
                ("OTPGATE_OTP_TTL_SECONDS", Some("120")),
                ("OTPGATE_RATE_LIMIT_WINDOW_SECONDS", Some("60")),
                ("OTPGATE_RATE_LIMIT_MAX", Some("2")),
            ],
            || {
                let matches = matches_from(&[]).map_err(|e| e.kind());
                assert!(matches.is_ok());
                if let Ok(matches) = matches {
                    let options = Options::parse(&matches).map_err(|e| e.to_string());
                    assert!(options.is_ok());
                    if let Ok(options) = options {
                        assert_eq!(options.operator_email, "desk@thewheeldeal.in");
                        assert_eq!(options.calling_code, "+1");
                        assert_eq!(options.otp_ttl_seconds, 120);
                        assert_eq!(options.rate_limit_window_seconds, 60);
                        assert_eq!(options.rate_limit_max, 2);
                    }
                }
            },
        );
    }

    #[test]
    fn email_validation() {
        assert!(valid_email("a@b.co"));
        assert!(!valid_email("a@b"));
        assert!(!valid_email("a b@c.de"));
        assert!(!valid_email("@c.de"));
    }
}
