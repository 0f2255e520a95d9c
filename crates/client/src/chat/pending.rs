//! Pending chat handoff across a login redirect
//!
//! A single durable slot under a well-known key. Writers overwrite, the
//! post-login reader takes (read and clear in one step) so the intent is
//! delivered at most once even with several processes on one profile.

use std::sync::Arc;
use std::time::Duration;

use prolink_shared::{ChatIntent, KeyValueStore, StoreResult};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Storage key of the pending slot
pub const PENDING_CHAT_KEY: &str = "pendingChat";

/// Default maximum age of a pending intent
pub const DEFAULT_PENDING_CHAT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingEnvelope {
    intent: ChatIntent,
    #[serde(with = "time::serde::rfc3339")]
    stored_at: OffsetDateTime,
}

/// Accepts both the timestamped envelope and a bare intent
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredIntent {
    Envelope(PendingEnvelope),
    Bare(ChatIntent),
}

#[derive(Clone)]
pub struct PendingIntentMailbox {
    store: Arc<dyn KeyValueStore>,
    ttl: Option<Duration>,
}

impl PendingIntentMailbox {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: Some(DEFAULT_PENDING_CHAT_TTL),
        }
    }

    /// Override the maximum age; `None` keeps intents until consumed
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Store an intent, replacing whatever was pending
    pub fn put(&self, intent: &ChatIntent) -> StoreResult<()> {
        let envelope = PendingEnvelope {
            intent: intent.clone(),
            stored_at: OffsetDateTime::now_utc(),
        };
        self.store
            .put(PENDING_CHAT_KEY, &serde_json::to_string(&envelope)?)
    }

    /// Consume the pending intent, if there is a usable one
    ///
    /// The slot is empty afterwards in every case, including when the stored
    /// value was stale or unreadable.
    pub fn take(&self) -> StoreResult<Option<ChatIntent>> {
        let Some(raw) = self.store.take(PENDING_CHAT_KEY)? else {
            return Ok(None);
        };

        let stored: StoredIntent = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable pending chat intent");
                return Ok(None);
            }
        };

        match stored {
            StoredIntent::Bare(intent) => Ok(Some(intent)),
            StoredIntent::Envelope(envelope) => {
                if self.is_expired(envelope.stored_at, OffsetDateTime::now_utc()) {
                    tracing::debug!(
                        stored_at = %envelope.stored_at,
                        "Discarding expired pending chat intent"
                    );
                    return Ok(None);
                }
                Ok(Some(envelope.intent))
            }
        }
    }

    /// Drop any pending intent without consuming it
    pub fn clear(&self) -> StoreResult<()> {
        self.store.remove(PENDING_CHAT_KEY)
    }

    fn is_expired(&self, stored_at: OffsetDateTime, now: OffsetDateTime) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let age = (now - stored_at).whole_seconds();
        age > i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
    }
}
