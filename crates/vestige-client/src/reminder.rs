//! Idle reminder.
//!
//! While the session waits for the next work item, a one-shot timer runs in
//! the background. If nothing has been started when it fires, the user gets
//! a nudge. The timer is cancelled through a oneshot channel as soon as a
//! description arrives, or when its guard is dropped.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

/// Something that can get the user's attention.
pub trait Nudge: Send + Sync {
    /// Delivers a nudge after `idle` without a work item.
    fn nudge(&self, idle: Duration);
}

/// Rings the terminal bell and prints a line, plus a desktop notification
/// when the `desktop-notify` feature is enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNudge;

impl Nudge for TerminalNudge {
    fn nudge(&self, idle: Duration) {
        let message = idle_message(idle);

        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\x07\n * {}\n", message);
        let _ = stdout.flush();

        #[cfg(feature = "desktop-notify")]
        desktop_notification(&message);
    }
}

#[cfg(feature = "desktop-notify")]
fn desktop_notification(message: &str) {
    use notify_rust::Notification;

    let mut notification = Notification::new();
    notification
        .appname("vestige")
        .summary("What are you working on?")
        .body(message)
        .timeout(Duration::from_secs(10));

    match notification.show() {
        Ok(_) => debug!("idle notification sent"),
        Err(e) => debug!(error = %e, "failed to send idle notification"),
    }
}

/// Text shown when the reminder fires.
pub fn idle_message(idle: Duration) -> String {
    format!("You've been idle for {}.", idle_span(idle))
}

/// "2 minutes", "1 minute" or "90 seconds".
pub fn idle_span(idle: Duration) -> String {
    let secs = idle.as_secs();
    match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) if minutes > 0 => format!("{} minutes", minutes),
        _ => format!("{} seconds", secs),
    }
}

/// Schedules nudges.
#[derive(Clone)]
pub struct IdleReminder {
    after: Duration,
    nudge: Arc<dyn Nudge>,
}

impl std::fmt::Debug for IdleReminder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleReminder")
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

impl IdleReminder {
    /// Creates a reminder firing `after` the timer is armed.
    pub fn new(after: Duration, nudge: Arc<dyn Nudge>) -> Self {
        Self { after, nudge }
    }

    /// Creates a reminder that nudges through the terminal.
    pub fn terminal(after: Duration) -> Self {
        Self::new(after, Arc::new(TerminalNudge))
    }

    /// Returns the idle delay.
    pub fn after(&self) -> Duration {
        self.after
    }

    /// Starts the timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self) -> ReminderGuard {
        let (cancel, cancelled) = oneshot::channel::<()>();
        let after = self.after;
        let nudge = Arc::clone(&self.nudge);

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => nudge.nudge(after),
                // Fires on an explicit cancel and when the guard is dropped
                _ = cancelled => debug!("idle reminder cancelled"),
            }
        });

        ReminderGuard {
            cancel: Some(cancel),
        }
    }
}

/// Cancels the pending reminder when dropped.
#[derive(Debug)]
pub struct ReminderGuard {
    cancel: Option<oneshot::Sender<()>>,
}

impl ReminderGuard {
    /// Cancels the reminder now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Drop for ReminderGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}
