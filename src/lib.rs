pub mod convert;
pub mod credentials;
pub mod error;
pub mod graph;
pub mod ics;
pub mod models;
pub mod publisher;
pub mod source;

use std::env;
use std::time::Duration;

use chrono_tz::Tz;
use reqwest::Client;
use tracing::info;

pub use credentials::{AccessTokenProvider, ClientCredentials, CredentialManager};
pub use error::{Error, Result};
pub use graph::GraphClient;
pub use models::{CreatedEvent, RemoteEvent};
pub use publisher::{OutlookPublisher, PublisherSettings};
pub use source::{AttendeeRef, SourceEvent};

use error::config_error;

pub struct Config {
    pub ics_source: String,
    pub target_user: String,
    pub default_timezone: Tz,
    pub credentials: ClientCredentials,
    pub settings: PublisherSettings,
}

impl Config {
    /// Builds the configuration from command-line arguments and the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn build(args: impl Iterator<Item = String>) -> Result<Config> {
        dotenvy::dotenv().ok();
        Config::build_with_env(args, |key| env::var(key).ok())
    }

    /// Arguments are `<ics-source> <target-user> [default-timezone]`.
    pub fn build_with_env(
        mut args: impl Iterator<Item = String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config> {
        args.next();

        let ics_source = match args.next() {
            Some(arg) => arg,
            None => return Err(config_error("Didn't get an iCalendar file path or URL")),
        };

        let target_user = match args.next() {
            Some(arg) => arg,
            None => return Err(config_error("Didn't get a target user (mailbox address)")),
        };

        let default_timezone = match args.next() {
            Some(arg) => ics::resolve_tzid(&arg)
                .ok_or_else(|| config_error(&format!("Unknown time zone: {arg}")))?,
            None => Tz::UTC,
        };

        let credentials = Config::credentials_from(&lookup)?;
        let settings = Config::settings_from(&lookup)?;

        Ok(Config {
            ics_source,
            target_user,
            default_timezone,
            credentials,
            settings,
        })
    }

    /// Reads `OUTLOOK_CLIENT_ID`, `OUTLOOK_TENANT_ID` and `OUTLOOK_CLIENT_SECRET`.
    pub fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<ClientCredentials> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| config_error(&format!("Missing environment variable: {key}")))
        };

        ClientCredentials::new(
            required("OUTLOOK_CLIENT_ID")?,
            required("OUTLOOK_TENANT_ID")?,
            required("OUTLOOK_CLIENT_SECRET")?,
        )
    }

    pub fn settings_from(lookup: impl Fn(&str) -> Option<String>) -> Result<PublisherSettings> {
        let mut settings = PublisherSettings::default();
        if let Some(host) = lookup("OUTLOOK_AUTHORITY_HOST") {
            settings.authority_host = host;
        }
        if let Some(base_url) = lookup("OUTLOOK_GRAPH_BASE_URL") {
            settings.graph_base_url = base_url;
        }
        if let Some(secs) = lookup("OUTLOOK_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| config_error(&format!("Invalid OUTLOOK_TIMEOUT_SECS: {secs}")))?;
            settings.timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }
}

/// Publishes every event of the configured iCalendar document, stopping at the first failure.
///
/// Returns the number of events created.
pub async fn run(config: Config) -> Result<usize> {
    let http = Client::builder().timeout(config.settings.timeout).build()?;
    let text = ics::load_ics(&config.ics_source, &http).await?;
    let events = ics::parse_ics(&text, config.default_timezone)?;
    info!(count = events.len(), source = %config.ics_source, "Parsed iCalendar events");

    let mut publisher = OutlookPublisher::new(config.settings);
    publisher
        .initialize(
            &config.credentials.client_id,
            &config.credentials.tenant_id,
            &config.credentials.client_secret,
        )
        .await?;

    for event in &events {
        let created = publisher.submit(Some(event), &config.target_user).await?;
        match (&created.id, &created.web_link) {
            (Some(id), Some(link)) => info!(%id, %link, "Created event"),
            (Some(id), None) => info!(%id, "Created event"),
            (None, _) => info!("Created event (no id returned)"),
        }
    }

    Ok(events.len())
}
