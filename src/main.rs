use outlook_push::Config;
use std::env;
use std::process;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    init_logging();

    let config = Config::build(env::args()).unwrap_or_else(|err| {
        eprintln!("Problem parsing arguments: {err}");
        eprintln!("Usage: outlook_push <ics-file-or-url> <target-user> [default-timezone]");
        process::exit(1);
    });

    if let Err(e) = outlook_push::run(config).await {
        error!("Application error: {e}");
        process::exit(1);
    }
}

fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {e}");
    }
}
