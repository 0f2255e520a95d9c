//! ProLink unread notifier
//!
//! Signs in with the stored session (or configured credentials), hands any
//! chat parked across a login to the bus, then keeps the unread badge fresh
//! and logs it until interrupted.

use std::sync::Arc;

use anyhow::Context;
use prolink_client::chat::resume_pending_chat;
use prolink_client::{
    ApiClient, AuthContext, ChatIntentBus, Config, PendingIntentMailbox, SessionManager,
    TokenStore, UnreadAggregator, VisibilitySource,
};
use prolink_shared::{FileStore, KeyValueStore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod reporter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;

    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&config.profile_dir).context("Failed to open profile storage")?,
    );
    let api = ApiClient::new(
        config.api_url.clone(),
        TokenStore::new(Arc::clone(&store)),
        config.request_timeout(),
    )?;

    info!(api_url = %config.api_url, profile = %config.profile_dir.display(), "Starting notifier");

    let auth = AuthContext::new();
    let session = SessionManager::new(api.clone(), auth.clone());

    let restore = {
        let session = session.clone();
        tokio::spawn(async move { session.restore().await })
    };
    let mut state = auth
        .wait_until_resolved(config.auth_ready_timeout())
        .await
        .context("Session restore did not finish in time")?;
    restore.abort();

    if !state.is_authenticated {
        match config.credentials() {
            Some((email, password)) => {
                session
                    .login(email, password)
                    .await
                    .context("Sign-in failed")?;
                state = auth.current();
            }
            None => warn!("No stored session and no credentials; unread badge stays disabled"),
        }
    }

    let bus = ChatIntentBus::global();
    let intents = tokio::spawn(reporter::report_chat_intents(bus.subscribe()));

    let mailbox =
        PendingIntentMailbox::new(Arc::clone(&store)).with_ttl(config.pending_chat_ttl());
    if state.is_authenticated {
        if let Err(e) = resume_pending_chat(&mailbox, bus) {
            warn!(error = %e, "Failed to read pending chat");
        }
    }

    // Headless: nothing ever hides the surface
    let visibility = VisibilitySource::default();
    let badge = UnreadAggregator::new(Arc::new(api), &auth, visibility.subscribe()).start();
    let unread = tokio::spawn(reporter::report_unread(badge.subscribe()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    drop(badge);
    unread.abort();
    intents.abort();

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "prolink_notifier=info,prolink_client=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
