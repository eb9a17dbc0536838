//! Startup: configuration, authentication and the calendar directory,
//! then the session loop on the terminal.

use std::io::{self, Write};

use tokio::io::BufReader;
use tracing::info;
use vestige_core::{TracingConfig, init_tracing};
use vestige_providers::{CalendarDirectory, CalendarService, EventRouter, MemoryCalendarService};

use crate::cli::Cli;
use crate::config::{ClientConfig, SessionOptions};
use crate::error::ClientResult;
use crate::reminder::{IdleReminder, idle_span};
use crate::session::Session;

/// Sets up logging on stderr; `--debug` adds HTTP traffic.
pub fn init_logging(debug: bool) -> ClientResult<()> {
    let config = if debug {
        TracingConfig::cli_debug().with_network_logging()
    } else {
        TracingConfig::default()
    };
    init_tracing(config)?;
    Ok(())
}

/// Runs vestige until stdin closes.
///
/// Authentication and calendar listing failures are returned as errors;
/// once the session has started, only console IO errors are.
pub async fn run(cli: Cli) -> ClientResult<()> {
    let config = ClientConfig::for_cli(&cli)?;
    let options = SessionOptions::resolve(&cli, &config);

    announce(&mut io::stdout(), &options)?;

    if cli.dry_run {
        info!("dry run, events are kept in memory");
        println!(" * Dry run; events stay in memory.");
        let service = MemoryCalendarService::dry_run();
        return run_session(&service, &options, "the dry-run calendar").await;
    }

    run_google(&cli, &config, &options).await
}

#[cfg(feature = "google")]
async fn run_google(cli: &Cli, config: &ClientConfig, options: &SessionOptions) -> ClientResult<()> {
    use vestige_providers::google::GoogleCalendarService;

    let google = crate::config::google_config(cli, config)?;
    println!(" * Authenticating to Google...");
    let service = GoogleCalendarService::connect(&google).await?;
    run_session(&service, options, "Google").await
}

#[cfg(not(feature = "google"))]
async fn run_google(_: &Cli, _: &ClientConfig, _: &SessionOptions) -> ClientResult<()> {
    Err(crate::error::ClientError::Config(
        "built without Google support, only --dry-run is available".to_string(),
    ))
}

/// Prints the banner and the modes in effect.
pub fn announce<W: Write>(out: &mut W, options: &SessionOptions) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{:-<43}",
        format!("-- vestige {} ", env!("CARGO_PKG_VERSION"))
    )?;
    if options.single_calendar {
        writeln!(out, " * Loading in single calendar mode.")?;
    }
    if let Some(ref name) = options.default_calendar {
        writeln!(out, " * Selecting a default calendar: {}", name)?;
    }
    if let Some(after) = options.remind_after {
        writeln!(
            out,
            " * Idle reminder enabled; terminal bell after {} idle.",
            idle_span(after)
        )?;
    }
    out.flush()
}

/// Loads the calendar directory and builds the router, reporting progress.
pub async fn prepare<W: Write>(
    service: &dyn CalendarService,
    options: &SessionOptions,
    out: &mut W,
) -> ClientResult<EventRouter> {
    writeln!(out, " * Loading calendars...")?;
    out.flush()?;

    let directory = CalendarDirectory::load(
        service,
        options.default_calendar.as_deref(),
        options.max_calendars,
    )
    .await?;

    if directory.is_overridden() {
        writeln!(
            out,
            " * Promoted {} to default calendar.",
            directory.default_name()
        )?;
    }
    writeln!(out, " * Ready.")?;
    writeln!(out)?;
    writeln!(out)?;

    Ok(EventRouter::new(directory, options.single_calendar).with_style(options.style))
}

/// Prepares the router and runs the loop on stdin/stdout.
pub async fn run_session(
    service: &dyn CalendarService,
    options: &SessionOptions,
    destination: &str,
) -> ClientResult<()> {
    let mut stdout = io::stdout();
    let router = prepare(service, options, &mut stdout).await?;
    let reminder = options.remind_after.map(IdleReminder::terminal);

    Session::new(service, router, BufReader::new(tokio::io::stdin()), stdout)
        .with_reminder(reminder)
        .with_destination(destination)
        .run()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::time::Duration;
    use vestige_core::SummaryStyle;
    use vestige_providers::{CalendarInfo, DEFAULT_MAX_CALENDARS, DirectoryError};

    fn options() -> SessionOptions {
        SessionOptions {
            single_calendar: false,
            default_calendar: None,
            remind_after: None,
            style: SummaryStyle::EmDash,
            max_calendars: DEFAULT_MAX_CALENDARS,
        }
    }

    fn service() -> MemoryCalendarService {
        MemoryCalendarService::new()
            .with_calendar(CalendarInfo::new("primary-id", "me@example.com").with_primary(true))
            .with_calendar(CalendarInfo::new("work-id", "Work"))
    }

    fn lines(out: Vec<u8>) -> Vec<String> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn announce_lists_active_modes() {
        let options = SessionOptions {
            single_calendar: true,
            default_calendar: Some("Work".to_string()),
            remind_after: Some(Duration::from_secs(120)),
            ..options()
        };

        let mut out = Vec::new();
        announce(&mut out, &options).unwrap();
        let lines = lines(out);

        assert_eq!(lines[0], "");
        assert!(lines[1].starts_with("-- vestige "));
        assert_eq!(lines[1].len(), 43);
        assert_eq!(
            &lines[2..],
            [
                " * Loading in single calendar mode.",
                " * Selecting a default calendar: Work",
                " * Idle reminder enabled; terminal bell after 2 minutes idle.",
            ]
        );
    }

    #[test]
    fn announce_is_quiet_by_default() {
        let mut out = Vec::new();
        announce(&mut out, &options()).unwrap();
        assert_eq!(lines(out).len(), 2);
    }

    #[tokio::test]
    async fn prepare_reports_promotion_and_ready() {
        let service = service();
        let options = SessionOptions {
            default_calendar: Some("work".to_string()),
            ..options()
        };

        let mut out = Vec::new();
        let router = prepare(&service, &options, &mut out).await.unwrap();
        assert_eq!(router.directory().default_id(), "work-id");
        assert_eq!(
            lines(out),
            [
                " * Loading calendars...",
                " * Promoted Work to default calendar.",
                " * Ready.",
                "",
                "",
            ]
        );
    }

    #[tokio::test]
    async fn prepare_fails_on_unknown_default() {
        let service = service();
        let options = SessionOptions {
            default_calendar: Some("Hobbies".to_string()),
            ..options()
        };

        let mut out = Vec::new();
        let err = prepare(&service, &options, &mut out).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Directory(DirectoryError::OverrideNotFound { .. })
        ));
        assert!(!String::from_utf8(out).unwrap().contains("Ready"));
    }

    #[test]
    fn logging_is_initialised_once() {
        // Only one global subscriber per process.
        let _ = init_logging(false);
        assert!(matches!(init_logging(false), Err(ClientError::Tracing(_))));
    }
}
