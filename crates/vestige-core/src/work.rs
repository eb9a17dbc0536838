//! Work items: one timed unit of activity between a start and a stop.

use std::fmt::Display;

use chrono::{DateTime, Duration, Local, TimeZone};

/// A work item that has been started but not yet finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    description: String,
    started_at: DateTime<Local>,
}

impl WorkItem {
    /// Starts a work item now.
    pub fn start(description: impl Into<String>) -> Self {
        Self::started_at(description, Local::now())
    }

    /// Starts a work item at a given instant.
    pub fn started_at(description: impl Into<String>, started_at: DateTime<Local>) -> Self {
        Self {
            description: description.into(),
            started_at,
        }
    }

    /// Returns the free-text description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns when the item was started.
    pub fn start_time(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Finishes the item now.
    pub fn finish(self) -> CompletedWork {
        self.finish_at(Local::now())
    }

    /// Finishes the item at a given instant.
    ///
    /// An end before the start (wall clock stepped backwards) is clamped to
    /// the start, so a completed item never has a negative duration.
    pub fn finish_at(self, ended_at: DateTime<Local>) -> CompletedWork {
        let end = ended_at.max(self.started_at);
        CompletedWork {
            description: self.description,
            start: self.started_at,
            end,
        }
    }
}

/// A finished work item, ready to become a calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedWork {
    /// Free-text description as typed.
    pub description: String,
    /// Start instant.
    pub start: DateTime<Local>,
    /// End instant, never before `start`.
    pub end: DateTime<Local>,
}

impl CompletedWork {
    /// Time spent on the item.
    pub fn elapsed(&self) -> Duration {
        self.end - self.start
    }
}

/// Formats a duration as `1h 05m 12s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{}h {:02}m {:02}s", hours, minutes, seconds)
}

/// Formats a time of day as `3:04PM`.
pub fn kitchen_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format("%-I:%M%p").to_string()
}
