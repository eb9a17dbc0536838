//! Google Calendar service implementation.
//!
//! This module implements the [`CalendarService`] trait for Google Calendar.

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Operation, ProviderError, ProviderResult};
use crate::provider::{
    AccessRole, BoxFuture, CalendarInfo, CalendarService, CreatedEvent, NewEvent,
};

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::oauth::Authenticator;
use super::tokens::TokenInfo;

/// Google Calendar service.
///
/// Holds the token obtained at startup and refreshes it before a call when
/// it has expired, so sessions can outlive a single access token.
pub struct GoogleCalendarService {
    authenticator: Authenticator,
    client: GoogleCalendarClient,
    token: RwLock<TokenInfo>,
}

impl GoogleCalendarService {
    /// Authenticates and returns a ready service.
    ///
    /// Uses the cached token when possible and otherwise runs the browser
    /// flow. Failure here is fatal for the caller: there is nothing to fall
    /// back to.
    pub async fn connect(config: &GoogleConfig) -> ProviderResult<Self> {
        let authenticator = Authenticator::new(config)?;
        let token = authenticator.acquire().await?;
        info!("authenticated with Google");
        Self::with_token(config, authenticator, token)
    }

    #[cfg(test)]
    fn from_token(config: &GoogleConfig, token: TokenInfo) -> ProviderResult<Self> {
        Self::with_token(config, Authenticator::new(config)?, token)
    }

    fn with_token(
        config: &GoogleConfig,
        authenticator: Authenticator,
        token: TokenInfo,
    ) -> ProviderResult<Self> {
        Ok(Self {
            authenticator,
            client: GoogleCalendarClient::new(&config.user_agent)?,
            token: RwLock::new(token),
        })
    }

    /// Returns an access token, refreshing it first if it has expired.
    async fn access_token(&self) -> ProviderResult<String> {
        {
            let token = self.token.read().await;
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let mut token = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock
        if token.is_expired() {
            if token.can_refresh() {
                debug!("refreshing expired access token");
                self.authenticator.refresh(&mut token).await?;
            } else {
                debug!("access token expired and cannot be refreshed");
            }
        }
        Ok(token.access_token.clone())
    }

    async fn list_calendars_impl(
        &self,
        min_access_role: AccessRole,
        max_results: u32,
    ) -> ProviderResult<Vec<CalendarInfo>> {
        let access_token = self.access_token().await?;
        let entries = self
            .client
            .list_calendars(&access_token, min_access_role, max_results)
            .await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.grants(min_access_role))
            .map(CalendarInfo::from)
            .collect())
    }

    async fn insert_calendar_impl(&self, name: String) -> ProviderResult<CalendarInfo> {
        let access_token = self.access_token().await?;
        let created = self
            .client
            .insert_calendar(&access_token, &name)
            .await
            .map_err(|e| calendar_creation_failed(&name, e))?;
        Ok(CalendarInfo::new(created.id, name))
    }

    async fn insert_event_impl(
        &self,
        calendar_id: String,
        event: NewEvent,
    ) -> ProviderResult<CreatedEvent> {
        let access_token = self.access_token().await?;
        let created = self
            .client
            .insert_event(&access_token, &calendar_id, &event)
            .await?;
        Ok(CreatedEvent {
            id: created.id,
            calendar_id,
            html_link: created.html_link,
        })
    }
}

/// Reports a failed calendar insert as a calendar error, keeping the cause.
fn calendar_creation_failed(name: &str, e: ProviderError) -> ProviderError {
    ProviderError::calendar(format!("could not create calendar {}: {}", name, e.message()))
        .with_provider("google")
        .during(Operation::CreateCalendar)
        .with_source(e)
}

impl CalendarService for GoogleCalendarService {
    fn name(&self) -> &str {
        "google"
    }

    fn list_calendars(
        &self,
        min_access_role: AccessRole,
        max_results: u32,
    ) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        Box::pin(async move {
            self.list_calendars_impl(min_access_role, max_results)
                .await
                .map_err(|e| e.during(Operation::ListCalendars))
        })
    }

    fn insert_calendar(&self, name: String) -> BoxFuture<'_, ProviderResult<CalendarInfo>> {
        Box::pin(async move {
            self.insert_calendar_impl(name)
                .await
                .map_err(|e| e.during(Operation::CreateCalendar))
        })
    }

    fn insert_event(
        &self,
        calendar_id: String,
        event: NewEvent,
    ) -> BoxFuture<'_, ProviderResult<CreatedEvent>> {
        Box::pin(async move {
            self.insert_event_impl(calendar_id, event)
                .await
                .map_err(|e| e.during(Operation::InsertEvent))
        })
    }
}
