//! Calendar directory: the name→ID map of writable calendars.
//!
//! Built once at startup from the service's calendar list. Names are keys
//! compared case-insensitively; exactly one entry is the default calendar,
//! which receives every event without a category.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{Operation, ProviderError};
use crate::provider::{AccessRole, CalendarInfo, CalendarService};

/// Upper bound on calendars requested at startup.
pub const DEFAULT_MAX_CALENDARS: u32 = 50;

/// Calendar ID the Google API resolves to the identity's primary calendar.
pub const PRIMARY_ALIAS: &str = "primary";

/// Errors that prevent the directory from being built.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The calendar list could not be fetched.
    #[error("{0}")]
    Listing(#[from] ProviderError),

    /// The configured default calendar is not among the writable calendars.
    #[error(
        "default calendar \"{requested}\" could not be found, or you do not have write access to it"
    )]
    OverrideNotFound {
        /// The name that was asked for.
        requested: String,
    },
}

/// The writable calendars of the authenticated identity.
#[derive(Debug, Clone)]
pub struct CalendarDirectory {
    /// Lowercased name → calendar ID.
    calendars: HashMap<String, String>,
    default_id: String,
    default_name: String,
    overridden: bool,
}

impl CalendarDirectory {
    /// Lists writable calendars from the service and builds the directory.
    ///
    /// # Errors
    ///
    /// Fails if listing fails or if `default_override` names a calendar that
    /// is not in the list. Both are configuration problems the caller should
    /// treat as fatal.
    pub async fn load(
        service: &dyn CalendarService,
        default_override: Option<&str>,
        max_results: u32,
    ) -> Result<Self, DirectoryError> {
        let calendars = service
            .list_calendars(AccessRole::Writer, max_results)
            .await
            .map_err(|e| e.during(Operation::ListCalendars))?;
        debug!(
            "{} listed {} writable calendars",
            service.name(),
            calendars.len()
        );
        Self::from_calendars(calendars, default_override)
    }

    /// Builds the directory from an already fetched calendar list.
    ///
    /// Without an override the calendar flagged primary becomes the default;
    /// with one, the first calendar whose name matches case-insensitively
    /// does. A blank override counts as no override.
    pub fn from_calendars(
        calendars: Vec<CalendarInfo>,
        default_override: Option<&str>,
    ) -> Result<Self, DirectoryError> {
        let wanted = default_override
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_lowercase);

        let mut map = HashMap::with_capacity(calendars.len());
        let mut default: Option<(String, String)> = None;

        for calendar in calendars {
            let key = calendar.name.to_lowercase();

            if default.is_none() {
                let is_default = match wanted {
                    Some(ref wanted) => *wanted == key,
                    None => calendar.is_primary,
                };
                if is_default {
                    default = Some((calendar.id.clone(), calendar.name.clone()));
                }
            }

            map.entry(key).or_insert(calendar.id);
        }

        let overridden = wanted.is_some();
        let (default_id, default_name) = match (default, default_override) {
            (Some(found), _) => found,
            (None, Some(requested)) if overridden => {
                return Err(DirectoryError::OverrideNotFound {
                    requested: requested.trim().to_string(),
                });
            }
            (None, _) => {
                warn!("no calendar is flagged primary, using the \"{}\" alias", PRIMARY_ALIAS);
                (PRIMARY_ALIAS.to_string(), PRIMARY_ALIAS.to_string())
            }
        };

        if overridden {
            info!("promoted {} to default calendar", default_name);
        }

        Ok(Self {
            calendars: map,
            default_id,
            default_name,
            overridden,
        })
    }

    /// ID of the calendar receiving uncategorised events.
    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Name of the default calendar, as the service spells it.
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Whether the default was chosen by name rather than by the primary flag.
    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    /// Looks up a calendar ID by name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.calendars.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Records a calendar, replacing any previous entry with the same name.
    pub fn insert(&mut self, name: &str, id: impl Into<String>) {
        self.calendars.insert(name.to_lowercase(), id.into());
    }

    /// Number of known calendars.
    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    /// Returns true if no calendars are known.
    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }
}
