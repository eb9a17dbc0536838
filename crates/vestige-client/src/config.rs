//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/vestige/config.toml` by default. Command-line flags (and the
//! environment variables clap maps onto them) take precedence over the file.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store` is resolved via `pass show`
//! - `env::VAR_NAME` is resolved from the environment
//! - `file::path` is read from a file, trimmed
//! - plain text is used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vestige_core::SummaryStyle;
use vestige_providers::DEFAULT_MAX_CALENDARS;

use crate::cli::Cli;
use crate::error::{ClientError, ClientResult};

/// Idle time before the reminder fires, unless configured otherwise.
pub const DEFAULT_REMIND_AFTER_SECS: u64 = 120;

/// Configuration for the vestige client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google Calendar settings.
    #[cfg(feature = "google")]
    pub google: GoogleSettings,

    /// Work session settings.
    pub session: SessionSettings,
}

/// Work session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Send every event to the default calendar.
    pub single_calendar: bool,

    /// Name of the calendar to use as the default instead of the primary one.
    pub default_calendar: Option<String>,

    /// Nudge when idle.
    pub remind: bool,

    /// Seconds of idleness before the nudge.
    pub remind_after_secs: u64,

    /// Replace " - " with an em dash in event summaries.
    pub em_dash: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            single_calendar: false,
            default_calendar: None,
            remind: false,
            remind_after_secs: DEFAULT_REMIND_AFTER_SECS,
            em_dash: true,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))
    }

    /// Loads the file named on the command line, or the default one.
    pub fn for_cli(cli: &Cli) -> ClientResult<Self> {
        match cli.config {
            Some(ref path) => Self::load_from(path),
            None => Self::load(),
        }
        .map_err(ClientError::Config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vestige")
    }

    /// Upper bound on calendars listed at startup.
    pub fn max_calendars(&self) -> u32 {
        #[cfg(feature = "google")]
        {
            self.google.max_calendars
        }
        #[cfg(not(feature = "google"))]
        {
            DEFAULT_MAX_CALENDARS
        }
    }
}

/// Session behaviour after merging flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Skip category routing.
    pub single_calendar: bool,
    /// Default calendar override.
    pub default_calendar: Option<String>,
    /// Idle delay, when the reminder is on.
    pub remind_after: Option<Duration>,
    /// How summaries are rendered on events.
    pub style: SummaryStyle,
    /// Upper bound on calendars listed at startup.
    pub max_calendars: u32,
}

impl SessionOptions {
    /// Merges command-line flags over the config file.
    pub fn resolve(cli: &Cli, config: &ClientConfig) -> Self {
        let session = &config.session;

        let remind = cli.remind || session.remind;
        let remind_after_secs = cli.remind_after.unwrap_or(session.remind_after_secs);

        Self {
            single_calendar: cli.single || session.single_calendar,
            default_calendar: cli
                .default_calendar
                .clone()
                .or_else(|| session.default_calendar.clone()),
            remind_after: remind.then(|| Duration::from_secs(remind_after_secs)),
            style: SummaryStyle::from_em_dash(session.em_dash && !cli.plain_dashes),
            max_calendars: config.max_calendars(),
        }
    }
}

// ---------------------------------------------------------------------------
// GoogleSettings (in config.toml, including credentials)
// ---------------------------------------------------------------------------

/// Google Calendar settings.
///
/// Credentials (`client_id`, `client_secret`) are stored inline and support
/// secret references (`file::…`, `pass::…`, `env::…`).
#[cfg(feature = "google")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `file::`, `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `file::`, `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Whether the OAuth token is cached between runs.
    pub cache_token: bool,

    /// Directory for the token cache, instead of the platform cache directory.
    pub token_dir: Option<PathBuf>,

    /// Upper bound on calendars listed at startup.
    pub max_calendars: u32,

    /// Open the consent page in a browser, or only print its URL.
    pub open_browser: bool,
}

#[cfg(feature = "google")]
impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            cache_token: true,
            token_dir: None,
            max_calendars: DEFAULT_MAX_CALENDARS,
            open_browser: true,
        }
    }
}

#[cfg(feature = "google")]
impl GoogleSettings {
    /// Resolves Google OAuth credentials from inline fields.
    ///
    /// Returns `Ok(None)` when neither field is set. Each value is passed
    /// through `secret::resolve()` to expand `file::`, `pass::` and `env::` references.
    pub(crate) fn resolve_credentials(
        &self,
    ) -> Result<Option<vestige_providers::google::OAuthCredentials>, String> {
        use vestige_providers::google::OAuthCredentials;

        let (raw_id, raw_secret) = match (&self.client_id, &self.client_secret) {
            (None, None) => return Ok(None),
            (Some(id), Some(secret)) => (id, secret),
            (Some(_), None) => {
                return Err("client_secret is missing from [google] section".to_string());
            }
            (None, Some(_)) => {
                return Err("client_id is missing from [google] section".to_string());
            }
        };

        let resolved_id = crate::secret::resolve(raw_id)
            .map_err(|e| format!("failed to resolve client_id: {}", e))?;
        let resolved_secret = crate::secret::resolve(raw_secret)
            .map_err(|e| format!("failed to resolve client_secret: {}", e))?;

        Ok(Some(OAuthCredentials::new(resolved_id, resolved_secret)))
    }
}

/// Builds the Google service configuration from flags and the config file.
///
/// Credentials come from, in order: `--client-id` with `--client-secret`
/// (or `VESTIGE_CLIENT_ID`/`VESTIGE_CLIENT_SECRET`), `--credentials-file`,
/// then the `[google]` section.
#[cfg(feature = "google")]
pub fn google_config(
    cli: &Cli,
    config: &ClientConfig,
) -> ClientResult<vestige_providers::google::GoogleConfig> {
    use vestige_providers::google::GoogleConfig;

    let credentials = resolve_google_credentials(
        cli.client_id.as_deref(),
        cli.client_secret.as_deref(),
        cli.credentials_file.as_deref(),
        &config.google,
    )?;
    credentials
        .validate()
        .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;

    let mut google_config = GoogleConfig::new(credentials)
        .with_cache_token(config.google.cache_token && !cli.no_cache_token)
        .with_open_browser(config.google.open_browser && !cli.no_browser);
    if let Some(ref dir) = config.google.token_dir {
        google_config = google_config.with_token_dir(dir);
    }

    Ok(google_config)
}

#[cfg(feature = "google")]
fn resolve_google_credentials(
    cli_client_id: Option<&str>,
    cli_client_secret: Option<&str>,
    cli_credentials_file: Option<&Path>,
    settings: &GoogleSettings,
) -> ClientResult<vestige_providers::google::OAuthCredentials> {
    use vestige_providers::google::OAuthCredentials;

    if let (Some(id), Some(secret)) = (cli_client_id, cli_client_secret) {
        return Ok(OAuthCredentials::new(id, secret));
    }

    if cli_client_id.is_some() || cli_client_secret.is_some() {
        return Err(ClientError::Config(
            "both --client-id and --client-secret are required when providing credentials directly"
                .to_string(),
        ));
    }

    if let Some(path) = cli_credentials_file {
        return OAuthCredentials::from_file(path).map_err(|e| {
            ClientError::Config(format!(
                "failed to load credentials from {}: {}",
                path.display(),
                e
            ))
        });
    }

    if let Some(credentials) = settings.resolve_credentials().map_err(ClientError::Config)? {
        return Ok(credentials);
    }

    Err(ClientError::Config(format!(
        "Google credentials are required. Provide via:\n  \
         - --client-id and --client-secret flags\n  \
         - VESTIGE_CLIENT_ID and VESTIGE_CLIENT_SECRET env vars\n  \
         - --credentials-file flag (path to Google Cloud Console JSON)\n  \
         - client_id + client_secret in the [google] section of {}",
        ClientConfig::default_path().display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["vestige"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_when_file_is_empty() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert!(!config.session.single_calendar);
        assert!(config.session.em_dash);
        assert_eq!(config.session.remind_after_secs, DEFAULT_REMIND_AFTER_SECS);
        assert_eq!(config.max_calendars(), DEFAULT_MAX_CALENDARS);
    }

    #[test]
    fn session_section_parses() {
        let config: ClientConfig = toml::from_str(
            r#"
[session]
single_calendar = true
default_calendar = "Work"
remind = true
remind_after_secs = 600
em_dash = false
"#,
        )
        .unwrap();

        let options = SessionOptions::resolve(&cli(&[]), &config);
        assert!(options.single_calendar);
        assert_eq!(options.default_calendar.as_deref(), Some("Work"));
        assert_eq!(options.remind_after, Some(Duration::from_secs(600)));
        assert_eq!(options.style, SummaryStyle::Plain);
    }

    #[test]
    fn flags_override_file() {
        let config: ClientConfig = toml::from_str(
            r#"
[session]
default_calendar = "Work"
remind_after_secs = 600
"#,
        )
        .unwrap();

        let options = SessionOptions::resolve(
            &cli(&["--default", "Writing", "--remind", "--remind-after", "30", "--plain-dashes"]),
            &config,
        );
        assert_eq!(options.default_calendar.as_deref(), Some("Writing"));
        assert_eq!(options.remind_after, Some(Duration::from_secs(30)));
        assert_eq!(options.style, SummaryStyle::Plain);
    }

    #[test]
    fn reminder_off_by_default() {
        let options = SessionOptions::resolve(&cli(&[]), &ClientConfig::default());
        assert_eq!(options.remind_after, None);
        assert_eq!(options.style, SummaryStyle::EmDash);
        assert!(!options.single_calendar);
    }

    #[test]
    fn load_from_missing_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ClientConfig::load_from(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(err.contains("failed to read config"));
    }

    #[test]
    fn load_from_invalid_toml_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[session\n").unwrap();
        let err = ClientConfig::load_from(&path).unwrap_err();
        assert!(err.contains("failed to parse config"));
    }

    #[cfg(feature = "google")]
    mod google {
        use super::*;

        fn settings(id: Option<&str>, secret: Option<&str>) -> GoogleSettings {
            GoogleSettings {
                client_id: id.map(str::to_string),
                client_secret: secret.map(str::to_string),
                ..Default::default()
            }
        }

        #[test]
        fn credentials_from_cli() {
            let creds = resolve_google_credentials(
                Some("cli-id.apps.googleusercontent.com"),
                Some("cli-secret"),
                None,
                &settings(Some("config-id.apps.googleusercontent.com"), Some("x")),
            )
            .unwrap();
            assert_eq!(creds.client_id, "cli-id.apps.googleusercontent.com");
            assert_eq!(creds.client_secret, "cli-secret");
        }

        #[test]
        fn credentials_from_config() {
            let creds = resolve_google_credentials(
                None,
                None,
                None,
                &settings(Some("config-id.apps.googleusercontent.com"), Some("config-secret")),
            )
            .unwrap();
            assert_eq!(creds.client_id, "config-id.apps.googleusercontent.com");
        }

        #[test]
        fn credentials_from_env_reference() {
            unsafe {
                std::env::set_var("_VESTIGE_TEST_CLIENT_SECRET", "env-secret");
            }
            let creds = resolve_google_credentials(
                None,
                None,
                None,
                &settings(
                    Some("env-id.apps.googleusercontent.com"),
                    Some("env::_VESTIGE_TEST_CLIENT_SECRET"),
                ),
            )
            .unwrap();
            assert_eq!(creds.client_secret, "env-secret");
            unsafe {
                std::env::remove_var("_VESTIGE_TEST_CLIENT_SECRET");
            }
        }

        #[test]
        fn credentials_from_file() {
            let tmp = tempfile::tempdir().unwrap();
            let path = tmp.path().join("creds.json");
            std::fs::write(
                &path,
                r#"{"installed": {"client_id": "file-id.apps.googleusercontent.com", "client_secret": "file-secret"}}"#,
            )
            .unwrap();

            let creds =
                resolve_google_credentials(None, None, Some(&path), &GoogleSettings::default())
                    .unwrap();
            assert_eq!(creds.client_id, "file-id.apps.googleusercontent.com");
            assert_eq!(creds.client_secret, "file-secret");
        }

        #[test]
        fn partial_credentials_fail() {
            let err = resolve_google_credentials(
                Some("id.apps.googleusercontent.com"),
                None,
                None,
                &GoogleSettings::default(),
            )
            .unwrap_err();
            assert!(err.to_string().contains("--client-secret"));

            let err = resolve_google_credentials(
                None,
                None,
                None,
                &settings(Some("id.apps.googleusercontent.com"), None),
            )
            .unwrap_err();
            assert!(err.to_string().contains("client_secret"));
        }

        #[test]
        fn missing_credentials_fail() {
            let err =
                resolve_google_credentials(None, None, None, &GoogleSettings::default()).unwrap_err();
            assert!(err.to_string().contains("credentials are required"));
        }

        #[test]
        fn google_config_honours_cache_flags() {
            let tmp = tempfile::tempdir().unwrap();
            let mut config = ClientConfig::default();
            config.google = GoogleSettings {
                token_dir: Some(tmp.path().to_path_buf()),
                ..settings(Some("id.apps.googleusercontent.com"), Some("secret"))
            };

            let google = google_config(&cli(&[]), &config).unwrap();
            assert!(google.cache_token);
            assert_eq!(google.token_dir, tmp.path());

            let google = google_config(&cli(&["--no-cache-token"]), &config).unwrap();
            assert!(!google.cache_token);
        }

        #[test]
        fn browser_can_be_disabled_from_either_side() {
            let mut config = ClientConfig::default();
            config.google = settings(Some("id.apps.googleusercontent.com"), Some("secret"));
            assert!(google_config(&cli(&[]), &config).unwrap().open_browser);
            assert!(!google_config(&cli(&["--no-browser"]), &config).unwrap().open_browser);

            config.google.open_browser = false;
            assert!(!google_config(&cli(&[]), &config).unwrap().open_browser);
        }

        #[test]
        fn google_config_rejects_malformed_client_id() {
            let mut config = ClientConfig::default();
            config.google = settings(Some("not-a-google-id"), Some("secret"));
            let err = google_config(&cli(&[]), &config).unwrap_err();
            assert!(err.to_string().contains("invalid Google credentials"));
        }

        #[test]
        fn google_section_parses() {
            let config: ClientConfig = toml::from_str(
                r#"
[google]
client_id = "toml-id.apps.googleusercontent.com"
client_secret = "toml-secret"
cache_token = false
max_calendars = 10
open_browser = false
"#,
            )
            .unwrap();
            assert!(!config.google.cache_token);
            assert!(!config.google.open_browser);
            assert_eq!(config.max_calendars(), 10);
            assert_eq!(
                config.google.client_id.as_deref(),
                Some("toml-id.apps.googleusercontent.com")
            );
        }
    }
}
