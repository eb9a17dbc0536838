//! Errors from talking to a calendar service.
//!
//! A [`ProviderError`] says what went wrong ([`ErrorKind`]) and, once the
//! caller has tagged it, which step of a session failed ([`Operation`]).
//! The step decides the [`Severity`]: failing to sign in or to list
//! calendars ends vestige, failing to file one work item is reported and
//! the session goes on, and failing to cache the token is only logged.

use std::fmt;
use thiserror::Error;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credentials or tokens were rejected, or the OAuth flow failed.
    Auth,
    /// The identity may not touch the resource (HTTP 403).
    Denied,
    /// The service could not be reached.
    Network,
    /// Too many requests (HTTP 429).
    RateLimited,
    /// The service answered with an unexpected status.
    Remote,
    /// The service rejected the request as malformed (HTTP 400).
    BadRequest,
    /// No such calendar (HTTP 404).
    NotFound,
    /// The answer could not be parsed.
    Malformed,
    /// Missing or invalid settings.
    Config,
    /// A calendar could not be created.
    Calendar,
    /// vestige itself misbehaved.
    Internal,
}

impl ErrorKind {
    /// Short name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Denied => "denied",
            Self::Network => "network",
            Self::RateLimited => "rate-limited",
            Self::Remote => "remote",
            Self::BadRequest => "bad-request",
            Self::NotFound => "not-found",
            Self::Malformed => "malformed",
            Self::Config => "config",
            Self::Calendar => "calendar",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failure affects the running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// vestige cannot start; the process exits non-zero.
    Fatal,
    /// One work item was lost; it is shown on the console and the loop
    /// continues.
    Reported,
    /// Nothing the user needs to act on; logged only.
    Silent,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fatal => "fatal",
            Self::Reported => "reported",
            Self::Silent => "silent",
        })
    }
}

/// The step of a session that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Browser consent and code exchange.
    Authorize,
    /// Renewing an expired access token.
    RefreshToken,
    /// Listing writable calendars at startup.
    ListCalendars,
    /// Creating a category calendar.
    CreateCalendar,
    /// Inserting a work item's event.
    InsertEvent,
    /// Writing the token cache.
    CacheToken,
}

impl Operation {
    /// How a failure in this step affects the session.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Authorize | Self::ListCalendars => Severity::Fatal,
            Self::RefreshToken | Self::CreateCalendar | Self::InsertEvent => Severity::Reported,
            Self::CacheToken => Severity::Silent,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Authorize => "authorizing",
            Self::RefreshToken => "refreshing the access token",
            Self::ListCalendars => "listing calendars",
            Self::CreateCalendar => "creating a calendar",
            Self::InsertEvent => "inserting the event",
            Self::CacheToken => "caching the token",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A failed call to a calendar service or its OAuth endpoints.
#[derive(Debug, Error)]
pub struct ProviderError {
    kind: ErrorKind,
    message: String,
    operation: Option<Operation>,
    /// "google" or "memory".
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: None,
            provider: None,
            source: None,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Denied, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Remote, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn calendar(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Calendar, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Tags the service that failed.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Keeps the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Tags the step that failed. An existing tag is kept, so the
    /// innermost step wins.
    pub fn during(mut self, operation: Operation) -> Self {
        self.operation.get_or_insert(operation);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// How this failure affects the session.
    ///
    /// Untagged errors come from setup code that runs before the session
    /// starts, so they are fatal.
    pub fn severity(&self) -> Severity {
        self.operation.map_or(Severity::Fatal, |op| op.severity())
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(operation) = self.operation {
            write!(f, "{} failed: ", operation)?;
        }
        f.write_str(&self.message)?;
        match self.provider {
            Some(ref provider) => write!(f, " ({}, {})", provider, self.kind),
            None => write!(f, " ({})", self.kind),
        }
    }
}

/// Result of a calendar service call.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_map_to_severities() {
        assert_eq!(Operation::Authorize.severity(), Severity::Fatal);
        assert_eq!(Operation::ListCalendars.severity(), Severity::Fatal);
        assert_eq!(Operation::CreateCalendar.severity(), Severity::Reported);
        assert_eq!(Operation::InsertEvent.severity(), Severity::Reported);
        assert_eq!(Operation::RefreshToken.severity(), Severity::Reported);
        assert_eq!(Operation::CacheToken.severity(), Severity::Silent);
    }

    #[test]
    fn untagged_errors_are_fatal() {
        let err = ProviderError::config("client id is empty");
        assert_eq!(err.operation(), None);
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn innermost_step_wins() {
        let err = ProviderError::calendar("quota")
            .during(Operation::CreateCalendar)
            .during(Operation::InsertEvent);
        assert_eq!(err.operation(), Some(Operation::CreateCalendar));
        assert_eq!(err.severity(), Severity::Reported);
    }

    #[test]
    fn display_names_step_and_service() {
        let err = ProviderError::remote("backend error (503)")
            .with_provider("google")
            .during(Operation::InsertEvent);
        insta::assert_snapshot!(err, @"inserting the event failed: backend error (503) (google, remote)");

        let bare = ProviderError::auth("no refresh token");
        insta::assert_snapshot!(bare, @"no refresh token (auth)");
    }

    #[test]
    fn keeps_cause() {
        use std::error::Error;
        let io_err = std::io::Error::other("connection reset");
        let err = ProviderError::network("insert failed").with_source(io_err);
        assert!(err.source().is_some());
    }
}
