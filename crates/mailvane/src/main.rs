//! Mailvane - headless Gmail webmail engine.
//!
//! Wires the provider client, the tiered cache, the category state
//! store, and the push/poll coordinator into one single-threaded
//! session loop. The process tails its own inbox: the initial load
//! comes from cache or network, after which live updates (or the
//! polling fallback) keep the rendered state current.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use mailvane_core::{
    CacheManager, CacheStore, Category, Clock, CursorStore, HistorySync, ListCache, MailService,
    MailSession, SubscriptionStore, SyncSignal, UpdateCoordinator,
};
use mailvane_gmail::{GmailClient, UpdateStreamClient};

/// Environment variable carrying the OAuth access token. Token refresh
/// is the deployment's concern; this process only consumes the result.
const TOKEN_ENV: &str = "MAILVANE_ACCESS_TOKEN";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailvane=debug,mailvane_core=debug,mailvane_gmail=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mailvane");

    let config = Config::load()?;
    let token = std::env::var(TOKEN_ENV)
        .with_context(|| format!("{TOKEN_ENV} must hold a valid access token"))?;

    let client = match &config.api_base_url {
        Some(base) => GmailClient::with_base_url(&token, base)?,
        None => GmailClient::new(&token)?,
    };
    let service = MailService::new(client);

    let database_path = config.database_path()?;
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let database_path = database_path.display().to_string();

    let cache_store = CacheStore::new(&database_path).await?;
    let cache = ListCache::new(CacheManager::with_store(cache_store, Clock::system()).await);
    let cursors = CursorStore::new(&database_path).await?;
    let subscriptions = SubscriptionStore::new(&database_path).await?;

    let history = HistorySync::new(cursors, config.user_id.clone());
    let mut session = MailSession::new(&config.user_id, service.clone(), cache, history);

    session
        .load_category(Category::Inbox, None, false, false)
        .await
        .map_err(|err| {
            if err.is_auth_expired() {
                anyhow::anyhow!("access token rejected, sign in again and restart")
            } else {
                anyhow::Error::from(err)
            }
        })?;
    report_inbox(&session);

    let (signals_tx, mut signals_rx) = mpsc::channel::<SyncSignal>(16);
    let stream = if config.updates_url.is_empty() {
        warn!("no updates_url configured, live updates disabled");
        UpdateStreamClient::new("")?
    } else {
        UpdateStreamClient::new(&config.updates_url)?.with_token(&token)
    };
    let coordinator = UpdateCoordinator::new(
        stream,
        service,
        subscriptions,
        config.topic_name.clone(),
        signals_tx,
    );
    let coordinator_handle = tokio::spawn(coordinator.run());

    loop {
        tokio::select! {
            signal = signals_rx.recv() => {
                let Some(signal) = signal else { break };
                session.handle_signal(signal).await;
                report_inbox(&session);
            }
            result = tokio::signal::ctrl_c() => {
                result.context("listening for ctrl-c")?;
                info!("shutting down");
                break;
            }
        }
    }

    drop(signals_rx);
    coordinator_handle.abort();
    Ok(())
}

/// Logs a one-line inbox summary after each state change.
fn report_inbox(session: &MailSession) {
    let store = session.store();
    let unread = store
        .emails(Category::Inbox)
        .iter()
        .filter(|e| e.is_unread)
        .count();
    info!(
        total = store.count(Category::Inbox),
        unread,
        has_more = store.next_cursor(Category::Inbox).is_some(),
        "inbox state"
    );
}
