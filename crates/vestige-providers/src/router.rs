//! Event routing: which calendar receives a work item.
//!
//! A summary of the form `Category - Description` goes to the calendar named
//! `Category`, which is created on first use. Anything else, and everything
//! in single-calendar mode, goes to the default calendar.

use tracing::{debug, info, warn};
use vestige_core::{CompletedWork, SummaryStyle, parse_category};

use crate::directory::CalendarDirectory;
use crate::error::ProviderResult;
use crate::provider::{CalendarService, CreatedEvent, NewEvent};

/// Where a summary was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// The default calendar.
    Default,
    /// A category calendar that already existed.
    Category(String),
    /// A category calendar created for this event.
    CreatedCategory(String),
}

/// The outcome of routing a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Calendar receiving the event.
    pub calendar_id: String,
    /// How the calendar was chosen.
    pub target: RouteTarget,
}

impl Route {
    fn default_calendar(directory: &CalendarDirectory) -> Self {
        Self {
            calendar_id: directory.default_id().to_string(),
            target: RouteTarget::Default,
        }
    }
}

/// An event that was routed and accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// How the calendar was chosen.
    pub route: Route,
    /// The service's record of the event.
    pub event: CreatedEvent,
}

/// Routes work items to calendars and submits them.
///
/// Owns the [`CalendarDirectory`], so calendars created on demand are
/// remembered for the rest of the session.
#[derive(Debug)]
pub struct EventRouter {
    directory: CalendarDirectory,
    single_calendar: bool,
    style: SummaryStyle,
}

impl EventRouter {
    /// Creates a router over a loaded directory.
    pub fn new(directory: CalendarDirectory, single_calendar: bool) -> Self {
        Self {
            directory,
            single_calendar,
            style: SummaryStyle::default(),
        }
    }

    /// Sets how summaries are rendered on the event.
    pub fn with_style(mut self, style: SummaryStyle) -> Self {
        self.style = style;
        self
    }

    /// Returns the directory in its current state.
    pub fn directory(&self) -> &CalendarDirectory {
        &self.directory
    }

    /// Chooses the calendar for `summary`, creating a category calendar if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns the creation error when a new category calendar cannot be
    /// created. The directory is left unchanged in that case, so the next
    /// item in the same category tries again.
    pub async fn route(
        &mut self,
        service: &dyn CalendarService,
        summary: &str,
    ) -> ProviderResult<Route> {
        if self.single_calendar {
            return Ok(Route::default_calendar(&self.directory));
        }

        let Some(category) = parse_category(summary) else {
            return Ok(Route::default_calendar(&self.directory));
        };

        if let Some(id) = self.directory.lookup(&category.key) {
            debug!("category {} maps to calendar {}", category.key, id);
            return Ok(Route {
                calendar_id: id.to_string(),
                target: RouteTarget::Category(category.name.to_string()),
            });
        }

        let created = service
            .insert_calendar(category.name.to_string())
            .await
            .inspect_err(|e| warn!("failed to create calendar {}: {}", category.name, e))?;

        info!("calendar created: {} ({})", category.name, created.id);
        self.directory.insert(&category.key, created.id.clone());

        Ok(Route {
            calendar_id: created.id,
            target: RouteTarget::CreatedCategory(category.name.to_string()),
        })
    }

    /// Routes a completed work item and inserts its event.
    pub async fn submit(
        &mut self,
        service: &dyn CalendarService,
        work: &CompletedWork,
    ) -> ProviderResult<Submission> {
        let route = self.route(service, &work.description).await?;
        let event = NewEvent::from_work(work, self.style.render(&work.description));

        let created = service
            .insert_event(route.calendar_id.clone(), event)
            .await?;
        debug!("event {} inserted into {}", created.id, created.calendar_id);

        Ok(Submission {
            route,
            event: created,
        })
    }
}
