//! Google Calendar service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// OAuth 2.0 credentials for Google API access.
///
/// Users must provide their own OAuth client ID and secret, as Google
/// requires registered applications for API access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
}

/// Structure of Google's OAuth credentials JSON file.
///
/// Supports the Cloud Console format (an `installed` or `web` section) and
/// the flat format with `client_id`/`client_secret` at the root.
#[derive(Debug, Deserialize)]
struct GoogleCredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads OAuth credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("failed to read credentials file: {}", e))?;
        Self::from_json(&content)
    }

    /// Parses OAuth credentials from a Google credentials JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: GoogleCredentialsFile = serde_json::from_str(json)
            .map_err(|e| format!("failed to parse credentials JSON: {}", e))?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err("credentials file must contain 'installed'/'web' section or 'client_id'/'client_secret' at root level".to_string())
    }

    /// Validates that the credentials appear to be correctly formatted.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Configuration for the Google Calendar service.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth credentials for API access.
    pub credentials: OAuthCredentials,

    /// OAuth scopes to request.
    ///
    /// Defaults to full calendar access, which creating calendars needs.
    pub scopes: Vec<String>,

    /// Whether tokens are read from and written to the cache directory.
    pub cache_token: bool,

    /// Directory holding the token cache file.
    ///
    /// Defaults to the platform cache directory, or the working directory
    /// where the platform has none.
    pub token_dir: PathBuf,

    /// How long to wait for the browser to hit the callback.
    ///
    /// `None` waits indefinitely.
    pub callback_timeout: Option<Duration>,

    /// User agent string for API requests.
    pub user_agent: String,

    /// OAuth token endpoint.
    pub token_url: String,

    /// Whether the consent page is opened in a browser. The URL is printed
    /// either way.
    pub open_browser: bool,
}

impl GoogleConfig {
    /// OAuth scope for reading and writing calendars and events.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar";

    /// Google's OAuth token endpoint.
    pub const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Creates a new Google configuration with the given credentials.
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            cache_token: true,
            token_dir: Self::default_token_dir(),
            callback_timeout: None,
            user_agent: format!("vestige/{}", env!("CARGO_PKG_VERSION")),
            token_url: Self::TOKEN_URL.to_string(),
            open_browser: true,
        }
    }

    /// Returns the platform cache directory, falling back to `.`.
    pub fn default_token_dir() -> PathBuf {
        dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Enables or disables the token cache.
    pub fn with_cache_token(mut self, cache_token: bool) -> Self {
        self.cache_token = cache_token;
        self
    }

    /// Sets the token cache directory.
    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = dir.into();
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the callback timeout.
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = Some(timeout);
        self
    }

    /// Sends token requests to another endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Enables or disables launching a browser for consent.
    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Scopes joined the way the authorization endpoint expects them.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials
            .validate()
            .map_err(|e| format!("invalid credentials: {}", e))?;

        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> OAuthCredentials {
        OAuthCredentials::new("test-client.apps.googleusercontent.com", "test-secret")
    }

    #[test]
    fn credentials_validation() {
        assert!(test_credentials().validate().is_ok());
        assert!(OAuthCredentials::new("", "secret").validate().is_err());
        assert!(OAuthCredentials::new("bad-id", "secret").validate().is_err());
        assert!(
            OAuthCredentials::new("test.apps.googleusercontent.com", "")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn config_defaults() {
        let config = GoogleConfig::new(test_credentials());
        assert_eq!(config.scopes, vec![GoogleConfig::DEFAULT_SCOPE.to_string()]);
        assert!(config.cache_token);
        assert!(config.callback_timeout.is_none());
        assert!(config.user_agent.starts_with("vestige/"));
        assert_eq!(config.token_url, GoogleConfig::TOKEN_URL);
        assert!(config.open_browser);
    }

    #[test]
    fn config_builder_methods() {
        let config = GoogleConfig::new(test_credentials())
            .with_cache_token(false)
            .with_token_dir("/tmp/vestige")
            .with_callback_timeout(Duration::from_secs(60))
            .with_scopes(vec!["a".to_string(), "b".to_string()]);

        assert!(!config.cache_token);
        assert_eq!(config.token_dir, PathBuf::from("/tmp/vestige"));
        assert_eq!(config.callback_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.scope_string(), "a b");
    }

    #[test]
    fn config_validation() {
        assert!(GoogleConfig::new(test_credentials()).validate().is_ok());
        let no_scopes = GoogleConfig::new(test_credentials()).with_scopes(vec![]);
        assert!(no_scopes.validate().is_err());
    }

    #[test]
    fn credentials_from_json_installed() {
        let json = r#"{
            "installed": {
                "client_id": "test-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "project_id": "my-project"
            }
        }"#;

        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn credentials_from_json_flat() {
        let json = r#"{
            "client_id": "flat-id.apps.googleusercontent.com",
            "client_secret": "flat-secret"
        }"#;

        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "flat-id.apps.googleusercontent.com");
    }

    #[test]
    fn credentials_from_json_invalid() {
        let result = OAuthCredentials::from_json(r#"{ "other": {} }"#);
        assert!(result.unwrap_err().contains("client_id"));

        let result = OAuthCredentials::from_json("not json");
        assert!(result.unwrap_err().contains("parse"));
    }
}
