//! OAuth token cache.
//!
//! The cached token lives in a single JSON file whose name is derived from
//! the client ID, client secret and scope, so switching any of them picks a
//! different file. Caching is an optimisation: a missing or unreadable file
//! is a cache miss and a failed write is only logged.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Operation, ProviderError};

use super::config::GoogleConfig;

/// An OAuth token set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The bearer token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the access token was last issued or refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a new token info from OAuth response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Returns true if the token can be refreshed without the browser.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Updates the access token after a refresh.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.map(expiry_from_now);
        self.last_refresh = Utc::now();
    }
}

/// Expiry a minute early, so a token is never presented right at its deadline.
fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(60)
}

/// File-backed token cache.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
    enabled: bool,
}

impl TokenCache {
    /// Creates a cache backed by `path`.
    ///
    /// A disabled cache never reads or writes the file.
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    /// Creates the cache for a Google configuration.
    pub fn for_config(config: &GoogleConfig) -> Self {
        let name = Self::file_name(
            &config.credentials.client_id,
            &config.credentials.client_secret,
            &config.scope_string(),
        );
        Self::new(config.token_dir.join(name), config.cache_token)
    }

    /// Derives the cache file name from the client and scope.
    ///
    /// The name carries a SHA-256 fingerprint, so it is filesystem and URL
    /// safe and the secret is not readable from a directory listing.
    pub fn file_name(client_id: &str, client_secret: &str, scope: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(client_id.as_bytes());
        hasher.update([0]);
        hasher.update(client_secret.as_bytes());
        hasher.update([0]);
        hasher.update(scope.as_bytes());

        let mut fingerprint = String::with_capacity(64);
        for byte in hasher.finalize() {
            let _ = write!(fingerprint, "{:02x}", byte);
        }
        format!("vestige-token-{}.json", fingerprint)
    }

    /// Returns the cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the cache is in use.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Reads the cached token.
    ///
    /// Returns `None` when caching is disabled, the file is absent, or its
    /// contents cannot be parsed.
    pub fn load(&self) -> Option<TokenInfo> {
        if !self.enabled {
            debug!("token cache disabled");
            return None;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no token file at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!("failed to read token cache {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(token) => {
                debug!("loaded token from {:?}", self.path);
                Some(token)
            }
            Err(e) => {
                warn!("ignoring corrupt token cache {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Writes the token, logging and swallowing any failure.
    pub fn save(&self, token: &TokenInfo) {
        if !self.enabled {
            return;
        }

        match self.write(token) {
            Ok(()) => debug!("saved token to {:?}", self.path),
            Err(e) => {
                let err = ProviderError::internal(format!("{}: {}", self.path.display(), e))
                    .during(Operation::CacheToken)
                    .with_source(e);
                warn!(severity = %err.severity(), "{}", err);
            }
        }
    }

    fn write(&self, token: &TokenInfo) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(token).map_err(io::Error::other)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        Ok(())
    }
}
