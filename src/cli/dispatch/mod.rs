use crate::cli::{
    actions::{guard, login, register, request, Action},
    globals::GlobalArgs,
};
use anyhow::{bail, Context, Result};
use reqwest::Method;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let api_url = matches
        .get_one::<String>("api-url")
        .cloned()
        .context("missing required argument: --api-url")?;

    let mut globals = GlobalArgs::new(api_url);
    if let Some(path) = matches.get_one::<PathBuf>("session-file") {
        globals.session_file.clone_from(path);
    }
    if let Some(seconds) = matches.get_one::<u64>("renewal-timeout") {
        globals.renewal_timeout = Duration::from_secs(*seconds);
    }
    if let Some(seconds) = matches.get_one::<u64>("request-timeout") {
        globals.request_timeout = Duration::from_secs(*seconds);
    }
    Ok(globals)
}

fn credentials(matches: &clap::ArgMatches) -> Result<(String, SecretString)> {
    let username = matches
        .get_one::<String>("username")
        .cloned()
        .context("missing required argument: --username")?;
    let password = matches
        .get_one::<String>("password")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --password")?;
    Ok((username, password))
}

/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = globals(matches)?;

    match matches.subcommand() {
        Some(("login", sub_m)) => {
            let (username, password) = credentials(sub_m)?;
            Ok(Action::Login(login::Args {
                globals,
                username,
                password,
            }))
        }
        Some(("register", sub_m)) => {
            let (username, password) = credentials(sub_m)?;
            Ok(Action::Register(register::Args {
                globals,
                username,
                password,
            }))
        }
        Some(("logout", _)) => Ok(Action::Logout(globals)),
        Some(("status", _)) => Ok(Action::Status(globals)),
        Some(("refresh", _)) => Ok(Action::Refresh(globals)),
        Some(("request", sub_m)) => {
            let method = sub_m
                .get_one::<String>("method")
                .context("missing required argument: METHOD")?;
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method: {method}"))?;
            let path = sub_m
                .get_one::<String>("path")
                .cloned()
                .context("missing required argument: PATH")?;
            let body = sub_m
                .get_one::<String>("data")
                .map(|raw| serde_json::from_str::<serde_json::Value>(raw))
                .transpose()
                .context("--data must be valid JSON")?;

            Ok(Action::Request(request::Args {
                globals,
                method,
                path,
                body,
            }))
        }
        Some(("guard", sub_m)) => Ok(Action::Guard(guard::Args {
            globals,
            role: sub_m.get_one::<String>("role").cloned(),
        })),
        Some((name, _)) => bail!("unknown subcommand: {name}"),
        None => bail!("missing subcommand"),
    }
}
