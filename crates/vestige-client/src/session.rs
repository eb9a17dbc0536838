//! The interactive session loop.
//!
//! Each iteration reads a description, times the work until the user hits
//! Enter again, then routes and submits the event. Submission failures are
//! reported on the console and the loop carries on; only console IO errors
//! end it early.

use std::io::{self, Write};

use chrono::{DateTime, Local};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};
use vestige_core::{CompletedWork, WorkItem, format_elapsed, kitchen_time};
use vestige_providers::{
    CalendarService, EventRouter, ProviderError, RouteTarget, Submission,
};

use crate::reminder::IdleReminder;

/// Line that cancels the running work item (Esc then Enter).
pub const CANCEL_SENTINEL: &str = "\u{1b}";

const NEW_ITEM_BANNER: &str = "-- NEW WORK ITEM --------------------------";
const END_ITEM_BANNER: &str = "-- END WORK ITEM --------------------------";

/// How a single work item ended.
#[derive(Debug)]
pub enum ItemOutcome {
    /// The event was inserted.
    Submitted(Submission),
    /// The user cancelled; nothing was sent.
    Cancelled,
    /// Routing or insertion failed; the failure was reported.
    Failed(ProviderError),
    /// Input closed. Any running item is discarded.
    EndOfInput,
}

/// The read, time and submit loop.
pub struct Session<'a, R, W> {
    service: &'a dyn CalendarService,
    router: EventRouter,
    reminder: Option<IdleReminder>,
    destination: String,
    clock: fn() -> DateTime<Local>,
    input: R,
    output: W,
}

impl<'a, R, W> Session<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Creates a session reading from `input` and writing to `output`.
    pub fn new(service: &'a dyn CalendarService, router: EventRouter, input: R, output: W) -> Self {
        Self {
            service,
            router,
            reminder: None,
            destination: "Google".to_string(),
            clock: Local::now,
            input,
            output,
        }
    }

    /// Enables the idle reminder.
    pub fn with_reminder(mut self, reminder: Option<IdleReminder>) -> Self {
        self.reminder = reminder;
        self
    }

    /// Sets the name shown in the " * Sending to ..." line.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the router, with any calendars created so far.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Consumes the session and returns its output.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs work items until input closes.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            if let ItemOutcome::EndOfInput = self.run_once().await? {
                debug!("input closed, ending session");
                return Ok(());
            }
        }
    }

    /// Runs a single work item.
    pub async fn run_once(&mut self) -> io::Result<ItemOutcome> {
        writeln!(self.output, "{}", NEW_ITEM_BANNER)?;
        writeln!(self.output, " * What are you working on?")?;
        write!(self.output, "   ")?;
        self.output.flush()?;

        let reminder = self.reminder.as_ref().map(IdleReminder::arm);
        let description = self.read_line().await?;
        if let Some(reminder) = reminder {
            reminder.cancel();
        }
        let Some(description) = description else {
            return Ok(ItemOutcome::EndOfInput);
        };

        let item = WorkItem::started_at(description, (self.clock)());
        writeln!(self.output)?;
        writeln!(self.output, " * Started at {}", kitchen_time(&item.start_time()))?;
        writeln!(self.output, "   Hit Enter to finish work / Esc + Enter to cancel")?;
        self.output.flush()?;

        let Some(line) = self.read_line().await? else {
            debug!("input closed while {:?} was running", item.description());
            return Ok(ItemOutcome::EndOfInput);
        };

        if line.trim() == CANCEL_SENTINEL {
            writeln!(self.output, " * Work item cancelled.")?;
            writeln!(self.output, "{}", END_ITEM_BANNER)?;
            return Ok(ItemOutcome::Cancelled);
        }

        let work = item.finish_at((self.clock)());
        let outcome = self.submit(&work).await?;

        writeln!(self.output, " * Worked for {}", format_elapsed(work.elapsed()))?;
        writeln!(self.output, "{}", END_ITEM_BANNER)?;
        self.output.flush()?;

        Ok(outcome)
    }

    async fn submit(&mut self, work: &CompletedWork) -> io::Result<ItemOutcome> {
        writeln!(self.output)?;
        writeln!(self.output, " * Sending to {}...", self.destination)?;
        self.output.flush()?;

        match self.router.submit(self.service, work).await {
            Ok(submission) => {
                if let RouteTarget::CreatedCategory(ref name) = submission.route.target {
                    writeln!(self.output, " * Created calendar {}.", name)?;
                }
                writeln!(self.output, " * Sent.")?;
                writeln!(self.output, " * Event {} created.", submission.event.id)?;
                if let Some(ref link) = submission.event.html_link {
                    writeln!(self.output, "   {}", link)?;
                }
                Ok(ItemOutcome::Submitted(submission))
            }
            Err(e) => {
                warn!(severity = %e.severity(), "failed to submit work item: {}", e);
                writeln!(self.output, " ! An error occurred:")?;
                writeln!(self.output, "   {}", e.message())?;
                Ok(ItemOutcome::Failed(e))
            }
        }
    }

    /// Reads one line without its line ending. `None` at end of input.
    ///
    /// Bytes that are not UTF-8 are replaced rather than rejected; a
    /// terminal in another encoding must not end the session.
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut raw = Vec::new();
        if self.input.read_until(b'\n', &mut raw).await? == 0 {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&raw);
        let trimmed = line.strip_suffix('\n').unwrap_or(&line);
        let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
        Ok(Some(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::tests::RecordingNudge;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;
    use vestige_providers::{CalendarDirectory, CalendarInfo, MemoryCalendarService};

    fn fixed_clock() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, 15, 4, 0).single().unwrap()
    }

    fn service() -> MemoryCalendarService {
        MemoryCalendarService::new()
            .with_calendar(CalendarInfo::new("primary-id", "me@example.com").with_primary(true))
    }

    fn router(single: bool) -> EventRouter {
        let calendars = vec![CalendarInfo::new("primary-id", "me@example.com").with_primary(true)];
        EventRouter::new(CalendarDirectory::from_calendars(calendars, None).unwrap(), single)
    }

    fn session<'a>(
        service: &'a MemoryCalendarService,
        input: &'a [u8],
    ) -> Session<'a, &'a [u8], Vec<u8>> {
        Session::new(service, router(false), input, Vec::new()).with_clock(fixed_clock)
    }

    fn transcript(output: Vec<u8>) -> String {
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn category_creates_calendar_and_inserts() {
        let service = service();
        let mut session = session(&service, b"Writing - Draft report\n\n");

        let submission = match session.run_once().await.unwrap() {
            ItemOutcome::Submitted(submission) => submission,
            other => panic!("expected submission, got {:?}", other),
        };

        assert_eq!(service.created_calendars(), vec!["Writing".to_string()]);
        let events = service.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].calendar_id, submission.route.calendar_id);
        assert_ne!(events[0].calendar_id, "primary-id");
        assert_eq!(events[0].event.summary, "Writing \u{2014} Draft report");

        let lines: Vec<String> = transcript(session.into_output())
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(
            lines,
            vec![
                NEW_ITEM_BANNER,
                " * What are you working on?",
                "   ",
                " * Started at 3:04PM",
                "   Hit Enter to finish work / Esc + Enter to cancel",
                "",
                " * Sending to Google...",
                " * Created calendar Writing.",
                " * Sent.",
                " * Event evt-2 created.",
                " * Worked for 0h 00m 00s",
                END_ITEM_BANNER,
            ]
        );
    }

    #[tokio::test]
    async fn plain_summary_goes_to_default_calendar() {
        let service = service();
        let mut session = session(&service, b"Just thinking\n\n");

        let outcome = session.run_once().await.unwrap();
        assert!(matches!(outcome, ItemOutcome::Submitted(_)));
        assert!(service.created_calendars().is_empty());

        let events = service.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].calendar_id, "primary-id");
        assert_eq!(events[0].event.summary, "Just thinking");
        assert_eq!(events[0].event.start, fixed_clock());
    }

    #[tokio::test]
    async fn cancel_sentinel_sends_nothing() {
        let service = service();
        let mut session = session(&service, b"Writing - Draft report\n\x1b\n");

        let outcome = session.run_once().await.unwrap();
        assert!(matches!(outcome, ItemOutcome::Cancelled));
        assert!(service.events().is_empty());
        assert!(service.created_calendars().is_empty());

        let out = transcript(session.into_output());
        assert!(out.contains(" * Work item cancelled.\n"));
        assert!(!out.contains("Sending"));
    }

    #[tokio::test]
    async fn failure_is_reported_and_loop_continues() {
        let service = service();
        service.fail_event_creation(true);
        let mut session = session(&service, b"Just thinking\n\nAgain\n\n");

        let outcome = session.run_once().await.unwrap();
        assert!(matches!(outcome, ItemOutcome::Failed(_)));

        service.fail_event_creation(false);
        let outcome = session.run_once().await.unwrap();
        assert!(matches!(outcome, ItemOutcome::Submitted(_)));

        let out = transcript(session.into_output());
        assert!(out.contains(" ! An error occurred:\n   event insertion unavailable\n"));
        assert_eq!(out.matches(END_ITEM_BANNER).count(), 2);
        assert_eq!(service.events().len(), 1);
    }

    #[tokio::test]
    async fn calendar_creation_failure_aborts_event() {
        let service = service();
        service.fail_calendar_creation(true);
        let mut session = session(&service, b"Writing - Draft\n\n");

        let outcome = session.run_once().await.unwrap();
        assert!(matches!(outcome, ItemOutcome::Failed(_)));
        assert!(service.events().is_empty());
        assert_eq!(session.router().directory().lookup("writing"), None);
    }

    #[tokio::test]
    async fn run_stops_at_end_of_input() {
        let service = service();
        let mut session = session(&service, b"One\n\r\nTwo - Three\n\n");

        session.run().await.unwrap();
        assert_eq!(service.events().len(), 2);
        assert_eq!(service.created_calendars(), vec!["Two".to_string()]);
    }

    #[tokio::test]
    async fn end_of_input_while_running_discards_item() {
        let service = service();
        let mut session = session(&service, b"Half done");

        let outcome = session.run_once().await.unwrap();
        assert!(matches!(outcome, ItemOutcome::EndOfInput));
        assert!(service.events().is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_session() {
        let service = service();
        let mut session = session(&service, b"caf\xe9\n\nJust thinking\n\n");

        session.run().await.unwrap();

        let events = service.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event.summary, "caf\u{fffd}");
        assert_eq!(events[1].event.summary, "Just thinking");
    }

    #[tokio::test]
    async fn event_id_is_shown_after_sending() {
        let service = service();
        let mut session = session(&service, b"Just thinking\n\n");

        session.run_once().await.unwrap();
        let out = transcript(session.into_output());
        assert!(out.contains(" * Sent.\n * Event evt-1 created.\n * Worked for"));
    }

    #[tokio::test]
    async fn single_calendar_mode_ignores_categories() {
        let service = service();
        let mut session = Session::new(
            &service,
            router(true),
            &b"Writing - Draft\n\n"[..],
            Vec::new(),
        );

        session.run_once().await.unwrap();
        assert!(service.created_calendars().is_empty());
        assert_eq!(service.events()[0].calendar_id, "primary-id");
    }

    #[tokio::test(start_paused = true)]
    async fn reminder_is_cancelled_once_description_arrives() {
        let service = service();
        let recorder = Arc::new(RecordingNudge::default());
        let reminder = IdleReminder::new(Duration::from_secs(120), recorder.clone());
        let mut session = session(&service, b"Just thinking\n\n").with_reminder(Some(reminder));

        session.run_once().await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(recorder.count(), 0);
    }
}
