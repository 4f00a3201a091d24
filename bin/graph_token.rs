use std::env;
use std::process;

use outlook_push::{Config, CredentialManager};
use tracing_subscriber::EnvFilter;

/// Checks that the configured app registration can obtain a Graph token.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenvy::dotenv().ok();
    let lookup = |key: &str| env::var(key).ok();

    let credentials = Config::credentials_from(lookup);
    let settings = Config::settings_from(lookup);
    let (credentials, settings) = match (credentials, settings) {
        (Ok(credentials), Ok(settings)) => (credentials, settings),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Problem loading configuration: {e}");
            process::exit(1);
        }
    };

    let manager = CredentialManager::new(
        &credentials,
        &settings.authority_host,
        &settings.scope,
        settings.timeout,
    )
    .unwrap_or_else(|err| {
        eprintln!("Invalid identity provider settings: {err}");
        process::exit(1);
    });

    if let Err(e) = manager.acquire().await {
        eprintln!("Error acquiring token: {e}");
        process::exit(1);
    }

    match manager.expires_at().await {
        Some(expires_at) => println!(
            "Token acquired for tenant {}, expires at {expires_at}",
            credentials.tenant_id
        ),
        None => println!(
            "Token acquired for tenant {} (no expiry reported)",
            credentials.tenant_id
        ),
    }
}
