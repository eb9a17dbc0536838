//! Google Calendar API client.
//!
//! A thin HTTP layer over the three Calendar v3 endpoints the tracker uses.
//! The access token is passed per call; keeping it fresh is the caller's job.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{AccessRole, CalendarInfo, NewEvent};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
}

impl GoogleCalendarClient {
    /// Creates a new client.
    ///
    /// No request timeout is set: a hung call blocks until the connection
    /// fails.
    pub fn new(user_agent: &str) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::config("failed to create HTTP client")
                    .with_provider("google")
                    .with_source(e)
            })?;

        Ok(Self { http_client })
    }

    /// Lists calendars granting at least `min_access_role`.
    pub async fn list_calendars(
        &self,
        access_token: &str,
        min_access_role: AccessRole,
        max_results: u32,
    ) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", CALENDAR_API_BASE);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("minAccessRole", min_access_role.as_str().to_string()),
                ("maxResults", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(request_failed)?;

        let list: CalendarListResponse = read_json(response).await?;
        debug!("calendarList returned {} entries", list.items.len());
        Ok(list.items)
    }

    /// Creates a secondary calendar.
    pub async fn insert_calendar(
        &self,
        access_token: &str,
        name: &str,
    ) -> ProviderResult<ApiCalendar> {
        let url = format!("{}/calendars", CALENDAR_API_BASE);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&CalendarRequest { summary: name })
            .send()
            .await
            .map_err(request_failed)?;

        read_json(response).await
    }

    /// Inserts a timed event.
    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewEvent,
    ) -> ProviderResult<ApiEvent> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&EventRequest::from(event))
            .send()
            .await
            .map_err(request_failed)?;

        read_json(response).await
    }
}

fn request_failed(e: reqwest::Error) -> ProviderError {
    ProviderError::network(format!("request failed: {}", e))
        .with_provider("google")
        .with_source(e)
}

/// Checks the status and parses the body of an API response.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        ProviderError::network(format!("failed to read response: {}", e)).with_provider("google")
    })?;

    if !status.is_success() {
        return Err(status_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        ProviderError::malformed(format!("failed to parse response: {}", e))
            .with_provider("google")
    })
}

/// Maps a non-success status to a provider error.
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let err = match status {
        StatusCode::BAD_REQUEST => ProviderError::bad_request(format!("bad request: {}", body)),
        StatusCode::UNAUTHORIZED => {
            ProviderError::auth("access token expired or invalid")
        }
        StatusCode::FORBIDDEN => ProviderError::denied(format!("access denied: {}", body)),
        StatusCode::NOT_FOUND => ProviderError::not_found("calendar not found"),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited("rate limit exceeded"),
        _ => ProviderError::remote(format!("API error ({}): {}", status, body)),
    };
    err.with_provider("google")
}

#[derive(Debug, Serialize)]
struct CalendarRequest<'a> {
    summary: &'a str,
}

/// Body of an event insert.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest {
    summary: String,
    start: EventDateTime,
    end: EventDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: String,
}

impl From<&NewEvent> for EventRequest {
    fn from(event: &NewEvent) -> Self {
        Self {
            summary: event.summary.clone(),
            start: EventDateTime {
                date_time: event.start.to_rfc3339(),
            },
            end: EventDateTime {
                date_time: event.end.to_rfc3339(),
            },
        }
    }
}

/// Response from the calendarList endpoint.
#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

/// A calendar from the calendar list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    /// The calendar ID.
    pub id: String,
    /// The calendar summary (name).
    #[serde(default)]
    pub summary: String,
    /// Whether this is the primary calendar.
    #[serde(default)]
    pub primary: bool,
    /// The identity's role on the calendar.
    pub access_role: Option<String>,
}

impl CalendarListEntry {
    /// Whether the listed role grants at least `role`.
    ///
    /// Entries without a role, or with one this client does not know, are
    /// taken at the server's word.
    pub fn grants(&self, role: AccessRole) -> bool {
        self.access_role
            .as_deref()
            .and_then(AccessRole::from_wire)
            .is_none_or(|granted| granted >= role)
    }
}

impl From<CalendarListEntry> for CalendarInfo {
    fn from(entry: CalendarListEntry) -> Self {
        CalendarInfo::new(entry.id, entry.summary).with_primary(entry.primary)
    }
}

/// A calendar returned by the insert endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCalendar {
    /// The assigned calendar ID.
    pub id: String,
    /// The calendar name.
    #[serde(default)]
    pub summary: String,
}

/// An event returned by the insert endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    /// The assigned event ID.
    pub id: String,
    /// Link to the event in Google Calendar.
    pub html_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{DateTime, Local, TimeZone};

    #[test]
    fn parse_calendar_list() {
        let json = r#"{
            "kind": "calendar#calendarList",
            "items": [
                {
                    "id": "me@example.com",
                    "summary": "me@example.com",
                    "primary": true,
                    "accessRole": "owner",
                    "timeZone": "Europe/Paris"
                },
                {
                    "id": "abc123@group.calendar.google.com",
                    "summary": "Writing",
                    "accessRole": "writer"
                }
            ]
        }"#;

        let response: CalendarListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.items.len(), 2);
        assert!(response.items[0].primary);
        assert_eq!(response.items[1].access_role.as_deref(), Some("writer"));

        let info: CalendarInfo = response.items[1].clone().into();
        assert_eq!(info.name, "Writing");
        assert!(!info.is_primary);
    }

    #[test]
    fn entries_below_the_requested_role_are_dropped() {
        let json = r#"{"items": [
            {"id": "a", "summary": "Mine", "accessRole": "owner"},
            {"id": "b", "summary": "Shared", "accessRole": "reader"},
            {"id": "c", "summary": "Team", "accessRole": "writer"},
            {"id": "d", "summary": "Unlabelled"}
        ]}"#;
        let response: CalendarListResponse = serde_json::from_str(json).unwrap();

        let kept: Vec<&str> = response
            .items
            .iter()
            .filter(|entry| entry.grants(AccessRole::Writer))
            .map(|entry| entry.id.as_str())
            .collect();
        assert_eq!(kept, vec!["a", "c", "d"]);
    }

    #[test]
    fn parse_empty_calendar_list() {
        let response: CalendarListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.items.is_empty());
    }

    #[test]
    fn parse_inserted_event() {
        let json = r#"{
            "id": "evt123",
            "status": "confirmed",
            "htmlLink": "https://www.google.com/calendar/event?eid=evt123"
        }"#;
        let event: ApiEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "evt123");
        assert!(event.html_link.unwrap().contains("eid=evt123"));
    }

    #[test]
    fn event_request_uses_rfc3339() {
        let start = Local.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2024, 3, 15, 10, 25, 0).unwrap();
        let event = NewEvent::new("Ops \u{2014} deploy", start, end);

        let json = serde_json::to_value(EventRequest::from(&event)).unwrap();
        assert_eq!(json["summary"], "Ops \u{2014} deploy");

        let sent = json["start"]["dateTime"].as_str().unwrap();
        assert_eq!(DateTime::parse_from_rfc3339(sent).unwrap(), start);
        let sent = json["end"]["dateTime"].as_str().unwrap();
        assert_eq!(DateTime::parse_from_rfc3339(sent).unwrap(), end);
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (StatusCode::BAD_REQUEST, ErrorKind::BadRequest),
            (StatusCode::UNAUTHORIZED, ErrorKind::Auth),
            (StatusCode::FORBIDDEN, ErrorKind::Denied),
            (StatusCode::NOT_FOUND, ErrorKind::NotFound),
            (StatusCode::TOO_MANY_REQUESTS, ErrorKind::RateLimited),
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Remote),
            (StatusCode::CONFLICT, ErrorKind::Remote),
        ];

        for (status, code) in cases {
            let err = status_error(status, "body");
            assert_eq!(err.kind(), code, "{status}");
            assert_eq!(err.provider(), Some("google"));
        }
    }
}
