pub mod email;
pub mod logging;
pub mod otp;
pub mod sms;

use crate::api::DEFAULT_ALLOWED_ORIGINS;
use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_ALLOWED_ORIGINS: &str = "allowed-origins";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("otpgate")
        .about("Phone-verified booking requests")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("5000")
                .env("OTPGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ALLOWED_ORIGINS)
                .long(ARG_ALLOWED_ORIGINS)
                .help("Comma separated list of origins allowed to call the API")
                .env("OTPGATE_ALLOWED_ORIGINS")
                .value_delimiter(',')
                .default_value(DEFAULT_ALLOWED_ORIGINS),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY_HEADERS)
                .long(ARG_TRUST_PROXY_HEADERS)
                .help("Take the client address from X-Forwarded-For / X-Real-IP")
                .long_help(
                    "Take the client address used for rate limiting from X-Forwarded-For or X-Real-IP.\n\nOnly enable this behind a reverse proxy that overwrites those headers.",
                )
                .env("OTPGATE_TRUST_PROXY_HEADERS")
                .action(ArgAction::SetTrue),
        );

    let command = otp::with_args(command);
    let command = sms::with_args(command);
    let command = email::with_args(command);
    logging::with_args(command)
}
