mod app;
mod page;
mod sessions;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use clap::Parser;
use shared::{Config, Services};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "newsbreeze")]
#[command(about = "Celebrity-voiced audio news reader served in the browser")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8501")]
    bind: String,

    /// Most browser sessions kept in memory at once
    #[arg(long, default_value = "500")]
    max_sessions: usize,

    /// Minutes a browser session may sit idle before it is dropped
    #[arg(long, default_value = "120")]
    session_idle_minutes: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug,hyper=info,reqwest=info,html5ever=warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let services = Services::from_config(&config).context("Failed to set up backends")?;

    info!(
        "Serving {} sources and {} voices (summarizer: {}, tts: {})",
        services.catalog.sources().len(),
        services.voices.profiles().len(),
        config.summarizer_url,
        config.tts_url
    );

    let sessions = sessions::SessionStore::new(
        Duration::from_secs(args.session_idle_minutes * 60),
        args.max_sessions,
    );
    let app = app::router(app::AppState::new(services).with_sessions(sessions));
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("NewsBreeze listening on http://{}", args.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
