//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

/// vestige - Track what you work on, straight into Google Calendar
///
/// Each work item becomes a calendar event. Summaries of the form
/// "Category - Description" go to a calendar named after the category,
/// which is created when it does not exist yet.
#[derive(Debug, Parser)]
#[command(name = "vestige")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "VESTIGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging, including HTTP traffic
    #[arg(long, short = 'v')]
    pub debug: bool,

    // --- Credentials ---
    /// OAuth client ID (from Google Cloud Console)
    #[arg(long, env = "VESTIGE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret (from Google Cloud Console)
    #[arg(long, env = "VESTIGE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Path to Google Cloud Console credentials JSON file
    ///
    /// Alternative to providing client_id and client_secret separately.
    #[arg(long)]
    pub credentials_file: Option<PathBuf>,

    /// Do not read or write the cached OAuth token
    #[arg(long)]
    pub no_cache_token: bool,

    /// Print the consent URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    // --- Routing ---
    /// Send every event to the default calendar, ignoring categories
    #[arg(long)]
    pub single: bool,

    /// Use the calendar with this name as the default instead of the primary one
    #[arg(long = "default", value_name = "NAME")]
    pub default_calendar: Option<String>,

    /// Keep " - " in event summaries instead of turning it into an em dash
    #[arg(long)]
    pub plain_dashes: bool,

    // --- Reminder ---
    /// Nudge when no work item has been started for a while
    #[arg(long)]
    pub remind: bool,

    /// Seconds of idleness before the reminder fires
    #[arg(long, value_name = "SECS")]
    pub remind_after: Option<u64>,

    /// Record events in memory instead of sending them to Google
    #[arg(long)]
    pub dry_run: bool,
}
