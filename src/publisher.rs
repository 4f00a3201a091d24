use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::convert::to_remote_event;
use crate::credentials::{
    ClientCredentials, CredentialManager, DEFAULT_AUTHORITY_HOST, GRAPH_DEFAULT_SCOPE,
};
use crate::error::{invalid_argument, Error, Result};
use crate::graph::{GraphClient, DEFAULT_GRAPH_BASE_URL};
use crate::models::CreatedEvent;
use crate::source::SourceEvent;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoints and limits used when the publisher connects.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub authority_host: String,
    pub graph_base_url: String,
    pub scope: String,
    /// Applies to the token request and to each create request.
    pub timeout: Duration,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            scope: GRAPH_DEFAULT_SCOPE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Publishes source events to users' Outlook calendars.
///
/// `initialize` must succeed before `submit`. Calling `initialize` again always
/// acquires a fresh token and replaces the client handle.
pub struct OutlookPublisher {
    settings: PublisherSettings,
    client: Option<GraphClient>,
}

impl OutlookPublisher {
    pub fn new(settings: PublisherSettings) -> Self {
        Self {
            settings,
            client: None,
        }
    }

    /// Wraps an already built client, e.g. one backed by a custom token provider.
    pub fn with_client(settings: PublisherSettings, client: GraphClient) -> Self {
        Self {
            settings,
            client: Some(client),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    /// Acquires an app-only token for Graph and stores the resulting client handle.
    pub async fn initialize(
        &mut self,
        client_id: &str,
        tenant_id: &str,
        client_secret: &str,
    ) -> Result<&GraphClient> {
        let credentials = ClientCredentials::new(client_id, tenant_id, client_secret)?;
        let manager = CredentialManager::new(
            &credentials,
            &self.settings.authority_host,
            &self.settings.scope,
            self.settings.timeout,
        )?;

        // Fail here rather than on the first submission when the grant is rejected.
        manager.acquire().await?;

        let client = GraphClient::new(
            &self.settings.graph_base_url,
            self.settings.timeout,
            Arc::new(manager),
        )?;

        info!(tenant = %credentials.tenant_id, "Microsoft Graph client initialized");
        Ok(&*self.client.insert(client))
    }

    /// Converts `event` and creates it in the calendar of `target_user`.
    pub async fn submit(
        &self,
        event: Option<&SourceEvent>,
        target_user: &str,
    ) -> Result<CreatedEvent> {
        let client = self.client.as_ref().ok_or(Error::NotInitialized)?;
        let event = event.ok_or_else(|| invalid_argument("event must not be absent"))?;
        if target_user.trim().is_empty() {
            return Err(invalid_argument("target user must not be empty"));
        }

        let remote = to_remote_event(event, Utc::now())?;
        let created = client.create_event(target_user, &remote).await?;

        info!(
            id = created.id.as_deref().unwrap_or("<none>"),
            subject = %remote.subject,
            user = %target_user,
            "Event successfully added to Outlook calendar"
        );
        Ok(created)
    }
}
