//! CalendarService trait definition.
//!
//! The trait covers exactly the three remote calls the time tracker needs:
//! listing writable calendars, creating a calendar and inserting an event.
//! [`MemoryCalendarService`] implements it without any network access and
//! backs dry runs and tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use tracing::debug;
use vestige_core::CompletedWork;

use crate::error::{Operation, ProviderError, ProviderResult};

/// The minimum access role a listed calendar must grant.
///
/// Variants are ordered from least to most access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessRole {
    /// Can see free/busy information only.
    FreeBusyReader,
    /// Can read events.
    Reader,
    /// Can create and modify events.
    #[default]
    Writer,
    /// Full control.
    Owner,
}

impl AccessRole {
    /// Returns the wire name used by the calendar API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FreeBusyReader => "freeBusyReader",
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Owner => "owner",
        }
    }

    /// Parses a wire name; unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "freeBusyReader" => Some(Self::FreeBusyReader),
            "reader" => Some(Self::Reader),
            "writer" => Some(Self::Writer),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

/// Information about a calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarInfo {
    /// Opaque identifier assigned by the service.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether the service marks this as the identity's primary calendar.
    pub is_primary: bool,
}

impl CalendarInfo {
    /// Creates a new CalendarInfo with the given ID and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_primary: false,
        }
    }

    /// Builder method to mark as primary.
    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }
}

/// An event about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// Display summary.
    pub summary: String,
    /// Start instant.
    pub start: DateTime<Local>,
    /// End instant.
    pub end: DateTime<Local>,
}

impl NewEvent {
    /// Creates an event spanning `start..end`.
    pub fn new(summary: impl Into<String>, start: DateTime<Local>, end: DateTime<Local>) -> Self {
        Self {
            summary: summary.into(),
            start,
            end,
        }
    }

    /// Creates an event covering a completed work item, with its summary
    /// already rendered for display.
    pub fn from_work(work: &CompletedWork, summary: impl Into<String>) -> Self {
        Self::new(summary, work.start, work.end)
    }
}

/// An event accepted by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    /// Identifier assigned by the service.
    pub id: String,
    /// Calendar the event landed in.
    pub calendar_id: String,
    /// Link to the event in a browser, when the service provides one.
    pub html_link: Option<String>,
}

/// A boxed future for async trait methods.
///
/// Keeps the trait object-safe so the session can hold a
/// `&dyn CalendarService`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A remote calendar service.
///
/// Calls are issued one at a time from the interactive session; each is a
/// single attempt with no retry.
pub trait CalendarService: Send + Sync {
    /// Returns the name of this service (e.g., "google", "memory").
    fn name(&self) -> &str;

    /// Lists calendars granting at least `min_access_role`, at most
    /// `max_results` of them.
    fn list_calendars(
        &self,
        min_access_role: AccessRole,
        max_results: u32,
    ) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>>;

    /// Creates a calendar with the given name.
    fn insert_calendar(&self, name: String) -> BoxFuture<'_, ProviderResult<CalendarInfo>>;

    /// Inserts an event into a calendar.
    fn insert_event(
        &self,
        calendar_id: String,
        event: NewEvent,
    ) -> BoxFuture<'_, ProviderResult<CreatedEvent>>;
}

/// An event recorded by [`MemoryCalendarService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Assigned event ID.
    pub id: String,
    /// Target calendar.
    pub calendar_id: String,
    /// The event as submitted.
    pub event: NewEvent,
}

#[derive(Debug, Default)]
struct MemoryState {
    calendars: Vec<CalendarInfo>,
    created_calendars: Vec<String>,
    events: Vec<RecordedEvent>,
    fail_listing: bool,
    fail_calendar_creation: bool,
    fail_event_creation: bool,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A calendar service held entirely in memory.
///
/// Records every calendar and event it is asked to create, and can be told
/// to fail any of its three operations.
#[derive(Debug, Default)]
pub struct MemoryCalendarService {
    state: Mutex<MemoryState>,
}

impl MemoryCalendarService {
    /// Creates an empty service with no calendars.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service seeded with a single primary calendar, as used by
    /// `--dry-run`.
    pub fn dry_run() -> Self {
        Self::new().with_calendar(CalendarInfo::new("primary", "Dry run").with_primary(true))
    }

    /// Adds an existing calendar.
    pub fn with_calendar(self, calendar: CalendarInfo) -> Self {
        self.state().calendars.push(calendar);
        self
    }

    /// Makes calendar listing fail.
    pub fn fail_listing(&self, fail: bool) {
        self.state().fail_listing = fail;
    }

    /// Makes calendar creation fail.
    pub fn fail_calendar_creation(&self, fail: bool) {
        self.state().fail_calendar_creation = fail;
    }

    /// Makes event insertion fail.
    pub fn fail_event_creation(&self, fail: bool) {
        self.state().fail_event_creation = fail;
    }

    /// Names passed to successful and failed `insert_calendar` calls, in order.
    pub fn created_calendars(&self) -> Vec<String> {
        self.state().created_calendars.clone()
    }

    /// Events inserted so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.state().events.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CalendarService for MemoryCalendarService {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_calendars(
        &self,
        _min_access_role: AccessRole,
        max_results: u32,
    ) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        let result = {
            let state = self.state();
            if state.fail_listing {
                Err(ProviderError::remote("calendar listing unavailable")
                    .with_provider("memory")
                    .during(Operation::ListCalendars))
            } else {
                Ok(state
                    .calendars
                    .iter()
                    .take(max_results as usize)
                    .cloned()
                    .collect())
            }
        };
        Box::pin(async move { result })
    }

    fn insert_calendar(&self, name: String) -> BoxFuture<'_, ProviderResult<CalendarInfo>> {
        let result = {
            let mut state = self.state();
            state.created_calendars.push(name.clone());
            if state.fail_calendar_creation {
                Err(ProviderError::calendar(format!("could not create calendar {}", name))
                    .with_provider("memory")
                    .during(Operation::CreateCalendar))
            } else {
                let id = format!("cal-{}@memory", state.next_id());
                let calendar = CalendarInfo::new(id, name);
                state.calendars.push(calendar.clone());
                debug!("created in-memory calendar {}", calendar.id);
                Ok(calendar)
            }
        };
        Box::pin(async move { result })
    }

    fn insert_event(
        &self,
        calendar_id: String,
        event: NewEvent,
    ) -> BoxFuture<'_, ProviderResult<CreatedEvent>> {
        let result = {
            let mut state = self.state();
            if state.fail_event_creation {
                Err(ProviderError::remote("event insertion unavailable")
                    .with_provider("memory")
                    .during(Operation::InsertEvent))
            } else if !state.calendars.iter().any(|c| c.id == calendar_id) {
                Err(ProviderError::not_found(format!("no calendar {}", calendar_id))
                    .with_provider("memory")
                    .during(Operation::InsertEvent))
            } else {
                let id = format!("evt-{}", state.next_id());
                state.events.push(RecordedEvent {
                    id: id.clone(),
                    calendar_id: calendar_id.clone(),
                    event,
                });
                Ok(CreatedEvent {
                    id,
                    calendar_id,
                    html_link: None,
                })
            }
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, Severity};

    fn sample_event() -> NewEvent {
        let now = Local::now();
        NewEvent::new("Just thinking", now, now)
    }

    #[test]
    fn access_role_wire_names() {
        assert_eq!(AccessRole::default(), AccessRole::Writer);
        assert_eq!(AccessRole::Writer.as_str(), "writer");
        assert_eq!(AccessRole::FreeBusyReader.as_str(), "freeBusyReader");
        assert_eq!(AccessRole::from_wire("owner"), Some(AccessRole::Owner));
        assert_eq!(AccessRole::from_wire("admin"), None);
        assert!(AccessRole::Owner > AccessRole::Writer);
        assert!(AccessRole::Reader < AccessRole::Writer);
    }

    #[test]
    fn calendar_info_builder() {
        let info = CalendarInfo::new("cal-123", "Work").with_primary(true);
        assert_eq!(info.id, "cal-123");
        assert_eq!(info.name, "Work");
        assert!(info.is_primary);
    }

    #[tokio::test]
    async fn memory_lists_up_to_max_results() {
        let service = MemoryCalendarService::new()
            .with_calendar(CalendarInfo::new("a", "A"))
            .with_calendar(CalendarInfo::new("b", "B"))
            .with_calendar(CalendarInfo::new("c", "C"));

        let listed = service.list_calendars(AccessRole::Writer, 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "a");
    }

    #[tokio::test]
    async fn memory_creates_calendar_then_accepts_events_in_it() {
        let service = MemoryCalendarService::new();
        let created = service.insert_calendar("Writing".to_string()).await.unwrap();
        assert_eq!(created.name, "Writing");
        assert_eq!(service.created_calendars(), vec!["Writing".to_string()]);

        let event = service
            .insert_event(created.id.clone(), sample_event())
            .await
            .unwrap();
        assert_eq!(event.calendar_id, created.id);
        assert_eq!(service.events().len(), 1);
    }

    #[tokio::test]
    async fn memory_rejects_unknown_calendar() {
        let service = MemoryCalendarService::dry_run();
        let err = service
            .insert_event("nope".to_string(), sample_event())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(service.events().is_empty());
    }

    #[tokio::test]
    async fn memory_failure_switches() {
        let service = MemoryCalendarService::dry_run();

        service.fail_listing(true);
        let err = service.list_calendars(AccessRole::Writer, 50).await.unwrap_err();
        assert_eq!(err.severity(), Severity::Fatal);

        service.fail_calendar_creation(true);
        let err = service.insert_calendar("Ops".to_string()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Calendar);
        assert_eq!(err.severity(), Severity::Reported);

        service.fail_event_creation(true);
        assert!(
            service
                .insert_event("primary".to_string(), sample_event())
                .await
                .is_err()
        );
        assert!(service.events().is_empty());
    }
}
