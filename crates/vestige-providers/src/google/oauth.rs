//! OAuth 2.0 authorization code flow for Google APIs.
//!
//! Implements the loopback redirect flow for desktop applications, with
//! PKCE and a per-session `state` value:
//!
//! 1. Bind a listener on an ephemeral localhost port
//! 2. Open the browser at Google's consent page
//! 3. Accept exactly one callback carrying the matching `state` and a `code`
//! 4. Exchange the code (with the PKCE verifier) for tokens
//!
//! [`Authenticator`] puts the token cache in front of that flow.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::error::{Operation, ProviderError, ProviderResult};

use super::config::{GoogleConfig, OAuthCredentials};
use super::tokens::{TokenCache, TokenInfo};

/// Google's consent page.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// The state length (in bytes, before base64 encoding).
const STATE_LENGTH: usize = 16;

/// Path the browser is redirected to.
pub const CALLBACK_PATH: &str = "/callback";

/// Launchers tried, in order, after the platform default fails.
const BROWSER_LAUNCHERS: [&str; 3] = ["xdg-open", "google-chrome", "open"];

const SUCCESS_PAGE: &str = "<h1>Success</h1>Authorized.";
const FAILURE_PAGE: &str = "<h1>Authorization failed</h1>You can close this window.";

/// OAuth client for Google APIs.
///
/// Handles the token endpoint calls; the callback itself is served by a
/// short-lived listener thread.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    token_url: String,
    launch_browser: bool,
}

impl OAuthClient {
    /// Creates a new OAuth client with the given credentials.
    pub fn new(credentials: OAuthCredentials, user_agent: &str) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::config("failed to create HTTP client")
                    .with_provider("google")
                    .with_source(e)
            })?;

        Ok(Self {
            credentials,
            http_client,
            token_url: GoogleConfig::TOKEN_URL.to_string(),
            launch_browser: true,
        })
    }

    /// Sends token requests to `url` instead of Google's endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Controls whether [`authorize`](Self::authorize) launches a browser.
    pub fn with_browser(mut self, launch: bool) -> Self {
        self.launch_browser = launch;
        self
    }

    /// Runs the browser flow and returns the obtained tokens.
    ///
    /// `callback_timeout` bounds the wait for the browser; `None` waits
    /// until the callback arrives.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot be bound, the callback is rejected
    /// (state mismatch, denial, missing code), the wait times out, or the
    /// code exchange fails.
    pub async fn authorize(
        &self,
        scopes: &[String],
        callback_timeout: Option<Duration>,
    ) -> ProviderResult<TokenInfo> {
        self.consent(scopes, callback_timeout)
            .await
            .map_err(|e| e.during(Operation::Authorize))
    }

    async fn consent(
        &self,
        scopes: &[String],
        callback_timeout: Option<Duration>,
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::new();
        let server = CallbackServer::bind()?;
        let redirect_uri = server.redirect_uri();

        let auth_url = pkce.build_auth_url(&self.credentials.client_id, &redirect_uri, scopes);
        debug!("authorization URL: {}", auth_url);

        eprintln!(
            "\nOpen this URL in your browser to authorize vestige:\n\n{}\n",
            auth_url
        );
        if self.launch_browser {
            open_browser(&auth_url);
        }

        let code = server
            .wait_for_code(pkce.state.clone(), callback_timeout)
            .await?;

        info!("received authorization code, exchanging for tokens");
        self.exchange_code(&code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }

    /// Refreshes the access token in place.
    pub async fn refresh(&self, token: &mut TokenInfo) -> ProviderResult<()> {
        let Some(refresh_token) = token.refresh_token.clone() else {
            return Err(ProviderError::auth("no refresh token available")
                .with_provider("google")
                .during(Operation::RefreshToken));
        };

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .token_request(&params, "token refresh")
            .await
            .map_err(|e| e.during(Operation::RefreshToken))?;
        token.update_access_token(response.access_token, response.expires_in);
        // Google may rotate the refresh token
        if let Some(rotated) = response.refresh_token {
            token.refresh_token = Some(rotated);
        }

        info!("refreshed access token");
        Ok(())
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<TokenInfo> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .token_request(&params, "token exchange")
            .await
            .map_err(|e| e.during(Operation::Authorize))?;

        info!("obtained tokens");
        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
        ))
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("{} request failed: {}", what, e))
                    .with_provider("google")
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_provider("google")
        })?;

        if !status.is_success() {
            return Err(ProviderError::auth(format!(
                "{} failed ({}): {}",
                what, status, body
            ))
            .with_provider("google"));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::malformed(format!("invalid token response: {}", e))
                .with_provider("google")
        })
    }
}

/// Obtains a usable token: cache first, then refresh, then the browser.
#[derive(Debug)]
pub struct Authenticator {
    client: OAuthClient,
    cache: TokenCache,
    scopes: Vec<String>,
    callback_timeout: Option<Duration>,
}

impl Authenticator {
    /// Creates an authenticator for a Google configuration.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::config(e).with_provider("google"))?;

        Ok(Self {
            client: OAuthClient::new(config.credentials.clone(), &config.user_agent)?
                .with_token_url(&config.token_url)
                .with_browser(config.open_browser),
            cache: TokenCache::for_config(config),
            scopes: config.scopes.clone(),
            callback_timeout: config.callback_timeout,
        })
    }

    /// Returns the token cache in use.
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Acquires a token.
    ///
    /// A cached token that is still valid is used as is. An expired one is
    /// refreshed once when it carries a refresh token; if that fails the
    /// browser flow runs. New or refreshed tokens are written back to the
    /// cache.
    pub async fn acquire(&self) -> ProviderResult<TokenInfo> {
        if let Some(mut token) = self.cache.load() {
            if !token.is_expired() {
                debug!("using cached token");
                return Ok(token);
            }

            if token.can_refresh() {
                match self.client.refresh(&mut token).await {
                    Ok(()) => {
                        self.cache.save(&token);
                        return Ok(token);
                    }
                    Err(e) => warn!("cached token could not be refreshed: {}", e),
                }
            }
        }

        let token = self
            .client
            .authorize(&self.scopes, self.callback_timeout)
            .await?;
        self.cache.save(&token);
        Ok(token)
    }

    /// Refreshes `token` and writes it back to the cache.
    pub async fn refresh(&self, token: &mut TokenInfo) -> ProviderResult<()> {
        self.client.refresh(token).await?;
        self.cache.save(token);
        Ok(())
    }
}

/// What a request to the callback listener amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Not the redirect (a favicon request, say). Answered 404; keep waiting.
    Ignored,
    /// The redirect carried the expected state and a code.
    Code(String),
    /// The redirect must not yield a credential.
    Rejected(String),
}

impl CallbackOutcome {
    fn response(&self) -> String {
        let (status, body) = match self {
            Self::Ignored => ("404 Not Found", "Not Found"),
            Self::Code(_) => ("200 OK", SUCCESS_PAGE),
            Self::Rejected(_) => ("500 Internal Server Error", FAILURE_PAGE),
        };
        format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }
}

/// Classifies the request target of an incoming callback request.
pub fn classify_callback(target: &str, expected_state: &str) -> CallbackOutcome {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != CALLBACK_PATH {
        return CallbackOutcome::Ignored;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match state {
        Some(ref state) if state == expected_state => {}
        Some(_) => return CallbackOutcome::Rejected("OAuth state mismatch".to_string()),
        None => {
            return CallbackOutcome::Rejected("callback is missing the state parameter".to_string());
        }
    }

    if let Some(error) = error {
        return CallbackOutcome::Rejected(format!("authorization denied: {}", error));
    }

    match code {
        Some(code) if !code.is_empty() => CallbackOutcome::Code(code),
        _ => CallbackOutcome::Rejected("callback did not carry an authorization code".to_string()),
    }
}

/// Loopback listener for the OAuth redirect.
#[derive(Debug)]
struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackServer {
    fn bind() -> ProviderResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").map_err(|e| {
            ProviderError::internal("failed to bind OAuth callback listener")
                .with_provider("google")
                .with_source(e)
        })?;
        let addr = listener.local_addr().map_err(|e| {
            ProviderError::internal("failed to read callback listener address")
                .with_provider("google")
                .with_source(e)
        })?;
        debug!("callback listener on {}", addr);
        Ok(Self { listener, addr })
    }

    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.addr.port(), CALLBACK_PATH)
    }

    /// Serves requests until one of them settles the flow.
    ///
    /// The listener lives on its own thread and is dropped when that
    /// thread returns, whatever the outcome.
    async fn wait_for_code(
        self,
        expected_state: String,
        timeout: Option<Duration>,
    ) -> ProviderResult<String> {
        let (tx, rx) = oneshot::channel();
        let Self { listener, addr } = self;
        thread::spawn(move || serve_callback(listener, &expected_state, tx));

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    // Unblock accept() so the thread sees the closed channel
                    let _ = TcpStream::connect(addr);
                    return Err(ProviderError::auth(
                        "timed out waiting for the OAuth callback",
                    )
                    .with_provider("google"));
                }
            },
            None => rx.await,
        };

        received.map_err(|_| {
            ProviderError::internal("callback listener stopped").with_provider("google")
        })?
    }
}

fn serve_callback(
    listener: TcpListener,
    expected_state: &str,
    tx: oneshot::Sender<ProviderResult<String>>,
) {
    for stream in listener.incoming() {
        if tx.is_closed() {
            debug!("callback wait abandoned");
            return;
        }

        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("failed to accept callback connection: {}", e);
                continue;
            }
        };

        let Some(target) = read_request_target(&stream) else {
            continue;
        };

        let outcome = classify_callback(&target, expected_state);
        let _ = stream.write_all(outcome.response().as_bytes());
        let _ = stream.flush();

        let result = match outcome {
            CallbackOutcome::Ignored => {
                debug!("ignoring request for {}", target);
                continue;
            }
            CallbackOutcome::Code(code) => Ok(code),
            CallbackOutcome::Rejected(reason) => {
                Err(ProviderError::auth(reason).with_provider("google"))
            }
        };
        let _ = tx.send(result);
        return;
    }
}

/// Reads the request head and returns the target of a GET request.
fn read_request_target(stream: &TcpStream) -> Option<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;

    // Drain headers so closing the socket does not reset the connection
    let mut header = String::new();
    while reader.read_line(&mut header).ok()? > 2 {
        header.clear();
    }

    // GET /callback?code=...&state=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Some(target.to_string()),
        _ => None,
    }
}

/// Opens `url` in a browser.
///
/// Tries the platform default, then each of a fixed list of launchers.
/// Failures are only logged since the URL has been printed for manual use.
pub fn open_browser(url: &str) -> bool {
    match open::that(url) {
        Ok(()) => return true,
        Err(e) => debug!("default browser launcher failed: {}", e),
    }

    for launcher in BROWSER_LAUNCHERS {
        match open::with(url, launcher) {
            Ok(()) => {
                debug!("opened browser with {}", launcher);
                return true;
            }
            Err(e) => debug!("{} failed: {}", launcher, e),
        }
    }

    warn!("could not open a browser, navigate to the printed URL manually");
    false
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state checked on the callback.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);

        Self {
            verifier,
            challenge,
            state: random_token(STATE_LENGTH),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Builds the Google OAuth authorization URL.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
