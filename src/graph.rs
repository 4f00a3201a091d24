use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, Url};
use tracing::{debug, warn};

use crate::credentials::AccessTokenProvider;
use crate::error::{invalid_argument, Error, Result};
use crate::models::{CreatedEvent, GraphErrorResponse, RemoteEvent};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Authenticated connection to Microsoft Graph.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| invalid_argument(&format!("invalid Graph base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid_argument("Graph base URL cannot carry a path"));
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            timeout,
            tokens,
        })
    }

    /// `POST /users/{user}/events`.
    ///
    /// Any 2xx status counts as created. The identifiers are filled in only when
    /// the response body carries them.
    pub async fn create_event(&self, user: &str, event: &RemoteEvent) -> Result<CreatedEvent> {
        let url = self.user_events_url(user)?;
        let token = self.tokens.access_token().await?;

        debug!(%url, subject = %event.subject, "Creating Graph event");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(event)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = read_body(response).await;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Graph rejected event creation");
            return Err(remote_api_error(status.as_u16(), &body));
        }

        if body.trim().is_empty() {
            debug!(status = status.as_u16(), "Graph accepted the event without a body");
            return Ok(CreatedEvent::default());
        }
        match serde_json::from_str::<CreatedEvent>(&body) {
            Ok(created) => Ok(created),
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "Unreadable body on accepted event");
                Ok(CreatedEvent::default())
            }
        }
    }

    fn user_events_url(&self, user: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| invalid_argument("Graph base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["users", user, "events"]);
        Ok(url)
    }

    fn request_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                operation: "Graph request",
                timeout: self.timeout,
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Reads the response body as text, logging and yielding an empty body when the read fails.
pub(crate) async fn read_body(response: Response) -> String {
    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status, error = %e, "Failed to read response body");
            String::new()
        }
    }
}

/// Builds a `RemoteApi` error, preferring Graph's structured error body.
pub(crate) fn remote_api_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<GraphErrorResponse>(body) {
        Ok(parsed) => Error::RemoteApi {
            status,
            code: parsed.error.code,
            message: parsed.error.message.unwrap_or_else(|| body.to_string()),
        },
        Err(_) => Error::RemoteApi {
            status,
            code: None,
            message: body.to_string(),
        },
    }
}
