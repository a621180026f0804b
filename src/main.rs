mod app;
mod attachment;
mod backend;
mod config;
mod conversation;
mod flow;
mod forms;
mod models;
mod notify;
mod route;
mod session;
mod storage;
mod view;

use anyhow::{Context, Result};
use backend::{CannedReplies, MockOtp, StaticCountries, SyntheticHistory};
use conversation::ConversationStore;
use notify::TerminalNotifier;
use session::SessionStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = config::Config::load()?;
    let latency = &config.latency;

    let session = SessionStore::open(
        &config.data_dir,
        Arc::new(MockOtp::new(latency.otp)),
        latency.otp,
        &config.default_user_name,
    )
    .await
    .context("Failed to restore session")?;

    let conversations = ConversationStore::open(
        &config.data_dir,
        Arc::new(CannedReplies::new(latency.reply_min, latency.reply_max)),
        Arc::new(SyntheticHistory::new(
            latency.history,
            config.page_size,
            config.history_pages,
        )),
        latency.room,
    )
    .await
    .context("Failed to restore conversations")?;

    let countries = Arc::new(StaticCountries::new(latency.otp));

    let mut app = app::App::new(
        config.clone(),
        session.clone(),
        conversations.clone(),
        countries,
        Arc::new(TerminalNotifier),
    );

    tokio::select! {
        result = app.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received, saving state..."),
    }

    if let Err(e) = session.flush().await {
        warn!("Failed to save session on shutdown: {}", e);
    }
    if let Err(e) = conversations.flush().await {
        warn!("Failed to save conversations on shutdown: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
