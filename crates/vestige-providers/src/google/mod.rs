//! Google Calendar service.
//!
//! # Authentication Flow
//!
//! 1. The user provides their own OAuth client ID/secret (required by Google)
//! 2. A cached token is used when present, refreshed once if it has expired
//! 3. Otherwise a loopback listener starts on an ephemeral port and the
//!    browser is sent to Google's consent page
//! 4. Google redirects to the listener with the authorization code
//! 5. The code is exchanged for access and refresh tokens, which are cached
//!
//! # Example
//!
//! ```ignore
//! use vestige_providers::google::{GoogleCalendarService, GoogleConfig, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::new(
//!     "your-client-id.apps.googleusercontent.com",
//!     "your-client-secret",
//! );
//!
//! let service = GoogleCalendarService::connect(&GoogleConfig::new(credentials)).await?;
//! ```

mod client;
mod config;
mod oauth;
mod provider;
mod tokens;

pub use client::{CalendarListEntry, GoogleCalendarClient};
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{
    Authenticator, CALLBACK_PATH, CallbackOutcome, OAuthClient, PkceFlow, classify_callback,
    open_browser,
};
pub use provider::GoogleCalendarService;
pub use tokens::{TokenCache, TokenInfo};
