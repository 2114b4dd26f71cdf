use super::events::Navigation;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOGIN_PATH: &str = "/users/login";
pub const DEFAULT_REGISTER_PATH: &str = "/users/register";
pub const DEFAULT_REFRESH_PATH: &str = "/users/refresh";
pub const DEFAULT_RENEWAL_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Settings shared by every component of a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    api_url: String,
    login_path: String,
    register_path: String,
    refresh_path: String,
    login_route: String,
    home_route: String,
    renewal_timeout: Duration,
    request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            register_path: DEFAULT_REGISTER_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_route: "/login".to_string(),
            home_route: "/".to_string(),
            renewal_timeout: Duration::from_secs(DEFAULT_RENEWAL_TIMEOUT_SECONDS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_register_path(mut self, path: impl Into<String>) -> Self {
        self.register_path = path.into();
        self
    }

    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    #[must_use]
    pub fn with_home_route(mut self, route: impl Into<String>) -> Self {
        self.home_route = route.into();
        self
    }

    #[must_use]
    pub fn with_renewal_timeout(mut self, timeout: Duration) -> Self {
        self.renewal_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn register_path(&self) -> &str {
        &self.register_path
    }

    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    #[must_use]
    pub fn renewal_timeout(&self) -> Duration {
        self.renewal_timeout
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Host route for a navigation intent.
    #[must_use]
    pub fn route(&self, navigation: Navigation) -> &str {
        match navigation {
            Navigation::Login => &self.login_route,
            Navigation::Home => &self.home_route,
        }
    }

    /// Whether `path` is one of the credential endpoints, whose 401 answers
    /// are final and never trigger a renewal.
    #[must_use]
    pub fn is_auth_endpoint(&self, path: &str) -> bool {
        let path = endpoint_path(path);
        [&self.login_path, &self.register_path, &self.refresh_path]
            .into_iter()
            .any(|candidate| endpoint_path(candidate) == path)
    }
}

/// Path component of a relative path or absolute URL, without query, fragment
/// or trailing slash.
fn endpoint_path(raw: &str) -> String {
    let path = match url::Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_taskify_api() {
        let config = SessionConfig::default();
        assert_eq!(config.api_url(), "http://localhost:8080");
        assert_eq!(config.refresh_path(), "/users/refresh");
        assert_eq!(config.renewal_timeout(), Duration::from_secs(10));
        assert_eq!(config.route(Navigation::Login), "/login");
        assert_eq!(config.route(Navigation::Home), "/");
    }

    #[test]
    fn builder_overrides_values() {
        let config = SessionConfig::new()
            .with_api_url("https://api.taskify.dev")
            .with_refresh_path("/auth/refresh")
            .with_home_route("/tasks")
            .with_renewal_timeout(Duration::from_millis(250));

        assert_eq!(config.api_url(), "https://api.taskify.dev");
        assert_eq!(config.refresh_path(), "/auth/refresh");
        assert_eq!(config.route(Navigation::Home), "/tasks");
        assert_eq!(config.renewal_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn auth_endpoints_are_recognized() {
        let config = SessionConfig::default();
        assert!(config.is_auth_endpoint("/users/login"));
        assert!(config.is_auth_endpoint("/users/register/"));
        assert!(config.is_auth_endpoint("users/refresh"));
        assert!(config.is_auth_endpoint("/users/refresh?source=cli"));
        assert!(config.is_auth_endpoint("http://localhost:8080/users/login"));
    }

    #[test]
    fn business_endpoints_are_not_auth_endpoints() {
        let config = SessionConfig::default();
        assert!(!config.is_auth_endpoint("/tasks"));
        assert!(!config.is_auth_endpoint("/users/me"));
        assert!(!config.is_auth_endpoint("/users/login/history"));
    }
}
