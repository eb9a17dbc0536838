//! Interactive time tracker writing work items to Google Calendar.
//!
//! This crate provides the `vestige` command-line interface.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod reminder;
pub mod secret;
pub mod session;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
pub use session::{ItemOutcome, Session};
