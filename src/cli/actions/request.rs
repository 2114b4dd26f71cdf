use crate::{
    cli::globals::GlobalArgs,
    session::{ApiRequest, RequestError},
};
use anyhow::{anyhow, bail, Result};
use reqwest::Method;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

/// Execute the request action.
/// # Errors
/// Returns an error if the request cannot be sent, the session cannot be
/// recovered, or the API answers with an error status.
pub async fn execute(args: Args) -> Result<()> {
    let client = args.globals.client()?;

    let mut request = ApiRequest::new(args.method, args.path);
    request.body = args.body;

    let response = match client.execute(request).await {
        Ok(response) => response,
        Err(err @ RequestError::RetryExhausted { .. }) => {
            let route = err
                .navigation()
                .map_or("", |navigation| client.config().route(navigation));
            return Err(anyhow!(err).context(format!("session expired, sign in again ({route})")));
        }
        Err(err) => return Err(err.into()),
    };

    info!(status = %response.status, "response received");
    if !response.is_success() {
        bail!("{}: {}", response.status, response.error_message());
    }

    let body = response.text();
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) if body.is_empty() => println!("{}", response.status),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
