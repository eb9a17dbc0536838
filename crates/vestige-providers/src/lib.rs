//! Calendar services, the calendar directory and event routing.
//!
//! - [`CalendarService`] - The three remote calls the tracker needs
//! - [`MemoryCalendarService`] - In-memory service for dry runs and tests
//! - [`CalendarDirectory`] - Writable calendars by name, and the default one
//! - [`EventRouter`] - Picks the calendar for a work item and submits it
//! - [`ProviderError`] - Failed calls, tagged with the [`Operation`] and its [`Severity`]
//!
//! ```text
//!  work item ──▶ EventRouter ──▶ CalendarDirectory
//!                    │                  ▲
//!                    ▼                  │ list (startup)
//!             CalendarService ──────────┘
//!              ├─ GoogleCalendarService
//!              └─ MemoryCalendarService
//! ```

pub mod directory;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod provider;
pub mod router;

// Re-export main types at crate root
pub use directory::{CalendarDirectory, DEFAULT_MAX_CALENDARS, DirectoryError, PRIMARY_ALIAS};
pub use error::{ErrorKind, Operation, ProviderError, ProviderResult, Severity};
pub use provider::{
    AccessRole, BoxFuture, CalendarInfo, CalendarService, CreatedEvent, MemoryCalendarService,
    NewEvent, RecordedEvent,
};
pub use router::{EventRouter, Route, RouteTarget, Submission};
