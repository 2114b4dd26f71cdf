use anyhow::{bail, Result};
use futures_util::future::join_all;
use secrecy::SecretString;
use serde_json::json;
use std::{net::TcpListener, sync::Arc, time::Duration};
use taskify_session::session::{
    ApiRequest, CredentialStore, FileStorage, GuardState, HttpTransport, Navigation,
    RenewalError, RequestError, RetryCause, Session, SessionClient, SessionConfig, SessionEvent,
    Token, ViewRequirement,
};
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client_for(
    server: &MockServer,
    store: Arc<CredentialStore>,
) -> Result<SessionClient<HttpTransport>> {
    let config = SessionConfig::new()
        .with_api_url(server.uri())
        .with_renewal_timeout(Duration::from_millis(500));
    let transport = HttpTransport::new(&config)?;
    Ok(SessionClient::new(config, store, Arc::new(transport)))
}

fn signed_in_store() -> Result<Arc<CredentialStore>> {
    let store = CredentialStore::in_memory();
    store.set(&Session {
        access_token: Some(Token::new("a1")),
        refresh_token: Some(Token::new("r1")),
        roles: ["USER".to_string()].into(),
    })?;
    Ok(Arc::new(store))
}

async fn count_requests(server: &MockServer, endpoint: &str) -> Result<usize> {
    let Some(requests) = server.received_requests().await else {
        bail!("wiremock request recording is disabled");
    };
    Ok(requests
        .iter()
        .filter(|request| request.url.path() == endpoint)
        .count())
}

async fn mount_tasks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .and(header("Authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "expired" })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .and(header("Authorization", "Bearer a2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "title": "ship it" }])),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_then_transparent_renewal() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/login"))
        .and(body_json(json!({ "userName": "ada", "userPassword": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "roles": ["USER"]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .and(body_json(json!({ "refreshToken": "r1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "a2" })))
        .expect(1)
        .mount(&server)
        .await;

    mount_tasks(&server).await;

    let client = client_for(&server, Arc::new(CredentialStore::in_memory()))?;
    let mut events = client.subscribe();

    client
        .auth()
        .login("ada", &SecretString::from("hunter2".to_string()))
        .await?;
    let response = client.execute(ApiRequest::get("/tasks")).await?;

    if response.status != 200 {
        bail!("expected 200 after renewal, got {}", response.status);
    }
    let session = client.store().get();
    if session.access_token != Some(Token::new("a2")) {
        bail!("store should hold the renewed access token");
    }
    if session.refresh_token != Some(Token::new("r1")) || !session.has_role("USER") {
        bail!("refresh token and roles must survive a renewal");
    }

    if events.try_recv().ok() != Some(SessionEvent::SignedIn) {
        bail!("expected a sign-in event");
    }
    if events.try_recv().ok() != Some(SessionEvent::Renewed) {
        bail!("expected a renewal event");
    }

    let Some(requests) = server.received_requests().await else {
        bail!("wiremock request recording is disabled");
    };
    let ids: Vec<_> = requests
        .iter()
        .filter(|request| request.url.path() == "/tasks")
        .filter_map(|request| request.headers.get("x-request-id").cloned())
        .collect();
    if ids.len() != 2 || ids[0] != ids[1] {
        bail!("replay should keep the request id, got {ids:?}");
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_renew_once() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "a2" }))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    mount_tasks(&server).await;

    let client = client_for(&server, signed_in_store()?)?;

    let results = join_all((0..5).map(|_| client.execute(ApiRequest::get("/tasks")))).await;

    for result in results {
        let response = result?;
        if response.status != 200 {
            bail!("expected 200, got {}", response.status);
        }
    }
    let refreshes = count_requests(&server, "/users/refresh").await?;
    if refreshes != 1 {
        bail!("expected exactly one renewal, got {refreshes}");
    }
    Ok(())
}

#[tokio::test]
async fn rejected_renewal_ends_session() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid refresh token" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_tasks(&server).await;

    let dir = tempfile::tempdir()?;
    let session_file = dir.path().join("session.json");
    let store = CredentialStore::new(FileStorage::open(&session_file)?);
    store.set(&Session {
        access_token: Some(Token::new("a1")),
        refresh_token: Some(Token::new("r1")),
        roles: ["USER".to_string()].into(),
    })?;
    let client = client_for(&server, Arc::new(store))?;
    let mut events = client.subscribe();

    let result = client.execute(ApiRequest::get("/tasks")).await;

    match result {
        Err(RequestError::RetryExhausted {
            navigation: Navigation::Login,
            cause: RetryCause::Renewal(RenewalError::Rejected { status: 401 }),
        }) => {}
        other => bail!("expected an exhausted retry, got {other:?}"),
    }
    if !client.store().get().is_empty() {
        bail!("store should be empty after a rejected renewal");
    }
    if session_file.exists() {
        bail!("session file should be removed");
    }
    if events.try_recv().ok() != Some(SessionEvent::Navigate(Navigation::Login)) {
        bail!("expected one redirect to login");
    }
    if events.try_recv().is_ok() {
        bail!("redirect must be published only once");
    }
    Ok(())
}

#[tokio::test]
async fn slow_renewal_times_out() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "a2" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in_store()?)?;

    match client.coordinator().renew().await {
        Err(RenewalError::Network(_)) => {}
        other => bail!("expected a network error, got {other:?}"),
    }
    if !client.store().get().is_empty() {
        bail!("store should be cleared after a timed out renewal");
    }
    Ok(())
}

#[tokio::test]
async fn stored_refresh_token_restores_protected_view() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .and(body_json(json!({ "refreshToken": "r1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "a2",
            "refreshToken": "r2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::in_memory();
    store.set(&Session {
        refresh_token: Some(Token::new("r1")),
        roles: ["ADMIN".to_string()].into(),
        ..Session::default()
    })?;
    let client = client_for(&server, Arc::new(store))?;

    let activation = client.route_guard().activate(&ViewRequirement::role("ADMIN"));
    if activation.current() != GuardState::Checking {
        bail!("expected checking while the session is restored");
    }
    let state = activation.settled().await;
    if state != GuardState::Authorized {
        bail!("expected authorized, got {state:?}");
    }
    if client.store().get().refresh_token != Some(Token::new("r2")) {
        bail!("rotated refresh token should be stored");
    }
    Ok(())
}

#[tokio::test]
async fn empty_session_is_denied_without_network() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let client = client_for(&server, Arc::new(CredentialStore::in_memory()))?;

    let state = client
        .route_guard()
        .check(&ViewRequirement::authenticated())
        .await;

    if state.navigation() != Some(Navigation::Login) {
        bail!("expected a redirect to login, got {state:?}");
    }
    let Some(requests) = server.received_requests().await else {
        bail!("wiremock request recording is disabled");
    };
    if !requests.is_empty() {
        bail!("no request may be sent for an empty session");
    }
    Ok(())
}
