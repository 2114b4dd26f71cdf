mod logging;

pub use self::logging::validator_log_level;

use crate::session::config::DEFAULT_API_URL;
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        PossibleValuesParser,
    },
    Arg, ColorChoice, Command,
};

fn credential_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .help("Account user name")
                .env("TASKIFY_USERNAME")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .help("Account password")
                .env("TASKIFY_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
}

fn global_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Taskify API root URL")
                .env("TASKIFY_API_URL")
                .default_value(DEFAULT_API_URL)
                .global(true),
        )
        .arg(
            Arg::new("session-file")
                .long("session-file")
                .help("Where the session is kept between invocations (default: <config dir>/taskify/session.json)")
                .env("TASKIFY_SESSION_FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("renewal-timeout")
                .long("renewal-timeout")
                .help("Seconds to wait for a session renewal before giving up")
                .env("TASKIFY_RENEWAL_TIMEOUT")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..))
                .global(true),
        )
        .arg(
            Arg::new("request-timeout")
                .long("request-timeout")
                .help("Seconds to wait for any single HTTP request")
                .env("TASKIFY_REQUEST_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..))
                .global(true),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("taskify-session")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(credential_args(
            Command::new("login").about("Sign in and store the session"),
        ))
        .subcommand(credential_args(
            Command::new("register").about("Create an account (does not sign in)"),
        ))
        .subcommand(Command::new("logout").about("Forget the stored session"))
        .subcommand(Command::new("status").about("Show the stored session"))
        .subcommand(Command::new("refresh").about("Renew the access token now"))
        .subcommand(
            Command::new("request")
                .about("Send an authenticated API request, renewing the session if needed")
                .arg(
                    Arg::new("method")
                        .help("HTTP method")
                        .required(true)
                        .ignore_case(true)
                        .value_parser(PossibleValuesParser::new([
                            "GET", "POST", "PUT", "PATCH", "DELETE",
                        ])),
                )
                .arg(
                    Arg::new("path")
                        .help("Path relative to the API root, example: /tasks")
                        .required(true),
                )
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .help("JSON request body"),
                ),
        )
        .subcommand(
            Command::new("guard")
                .about("Decide whether a protected view may be shown")
                .arg(
                    Arg::new("role")
                        .short('r')
                        .long("role")
                        .help("Role the view requires"),
                ),
        );

    let command = global_args(command);
    logging::with_args(command)
}
