//! Unread message badge
//!
//! Polls page 1 of the conversation list and publishes the unread total for
//! the signed-in user's role. Polling only happens for customers and
//! professionals; any other identity makes no network calls at all.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prolink_shared::{Role, UserId};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::poller::{Poller, PollerOptions};
use super::visibility::VisibilityWatch;
use crate::auth::{AuthContext, AuthState};
use crate::chat::ConversationSource;

/// How often the badge refreshes
pub const UNREAD_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Conversations fetched per refresh (page 1 only)
pub const UNREAD_PAGE_SIZE: u32 = 50;

/// Builds and starts the unread badge
pub struct UnreadAggregator {
    source: Arc<dyn ConversationSource>,
    auth: watch::Receiver<AuthState>,
    visibility: VisibilityWatch,
    interval: Duration,
}

impl UnreadAggregator {
    pub fn new(
        source: Arc<dyn ConversationSource>,
        auth: &AuthContext,
        visibility: VisibilityWatch,
    ) -> Self {
        Self {
            source,
            auth: auth.subscribe(),
            visibility,
            interval: UNREAD_POLL_INTERVAL,
        }
    }

    /// Start polling; the returned handle owns the schedule
    pub fn start(self) -> UnreadBadge {
        let (count_tx, count_rx) = watch::channel(0u32);
        let (enabled_tx, enabled_rx) = watch::channel(false);
        let count_tx = Arc::new(count_tx);
        let attached = Arc::new(AtomicBool::new(true));

        let poller = {
            let source = Arc::clone(&self.source);
            let auth = self.auth.clone();
            let count_tx = Arc::clone(&count_tx);
            let attached = Arc::clone(&attached);
            Poller::new("unread", self.visibility.clone(), move || {
                let source = Arc::clone(&source);
                let auth = auth.clone();
                let count_tx = Arc::clone(&count_tx);
                let attached = Arc::clone(&attached);
                async move {
                    refresh(source.as_ref(), &auth, &count_tx, &attached).await;
                    Ok(())
                }
            })
        };

        let supervisor = tokio::spawn(supervise(
            poller,
            self.auth,
            self.interval,
            enabled_tx,
            count_tx,
        ));

        UnreadBadge {
            count: count_rx,
            enabled: enabled_rx,
            attached,
            supervisor,
        }
    }
}

/// Live unread count; dropping it stops polling
pub struct UnreadBadge {
    count: watch::Receiver<u32>,
    enabled: watch::Receiver<bool>,
    attached: Arc<AtomicBool>,
    supervisor: JoinHandle<()>,
}

impl UnreadBadge {
    /// Latest published unread total
    pub fn count(&self) -> u32 {
        *self.count.borrow()
    }

    /// Whether the current identity is eligible for polling
    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Receiver notified whenever the total changes
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.count.clone()
    }
}

impl Drop for UnreadBadge {
    fn drop(&mut self) {
        // In-flight fetches may still complete; their results are dropped
        self.attached.store(false, Ordering::Release);
        self.supervisor.abort();
    }
}

/// Keeps the poller's options in sync with the auth state
async fn supervise(
    mut poller: Poller,
    mut auth: watch::Receiver<AuthState>,
    interval: Duration,
    enabled_tx: watch::Sender<bool>,
    count_tx: Arc<watch::Sender<u32>>,
) {
    let mut shown_for: Option<UserId> = None;

    loop {
        let (enabled, user, restart_key) = {
            let state = auth.borrow_and_update();
            let user = state.role().and(state.user.as_ref()).map(|u| u.id.clone());
            (state.inbox_role().is_some(), user, identity_key(&state))
        };

        enabled_tx.send_if_modified(|current| {
            if *current == enabled {
                return false;
            }
            tracing::debug!(enabled, "Unread polling eligibility changed");
            *current = enabled;
            true
        });

        // A total belongs to one user; never show it to anyone else
        if !enabled || user != shown_for {
            publish(&count_tx, 0);
        }
        shown_for = user;

        poller.update(
            PollerOptions::every(interval)
                .with_enabled(enabled)
                .with_restart_key(restart_key),
        );

        if auth.changed().await.is_err() {
            tracing::debug!("Auth context dropped, stopping unread polling");
            return;
        }
    }
}

/// Restart key tied to the signed-in user
fn identity_key(state: &AuthState) -> u64 {
    let mut hasher = DefaultHasher::new();
    state.user.as_ref().map(|u| &u.id).hash(&mut hasher);
    hasher.finish()
}

/// Who a total is computed for: the signed-in user and their inbox role
fn inbox_scope(auth: &watch::Receiver<AuthState>) -> Option<(UserId, Role)> {
    let state = auth.borrow();
    let role = state.inbox_role()?.clone();
    let user = state.user.as_ref()?.id.clone();
    Some((user, role))
}

/// One poll tick
///
/// The role is read now rather than when polling started. Failures keep the
/// previous total; the next tick is the retry. A result is only published
/// if the same user with the same role is still signed in when it arrives;
/// if someone else signed in meanwhile, the fetch is repeated for them
/// (the in-flight flag stays held, so the restart's own refresh was
/// skipped).
async fn refresh(
    source: &dyn ConversationSource,
    auth: &watch::Receiver<AuthState>,
    count_tx: &watch::Sender<u32>,
    attached: &AtomicBool,
) {
    let Some(mut scope) = inbox_scope(auth) else {
        return;
    };

    loop {
        let result = source.list_conversations(1, UNREAD_PAGE_SIZE).await;

        if !attached.load(Ordering::Acquire) {
            tracing::trace!("Badge detached, discarding unread result");
            return;
        }

        match inbox_scope(auth) {
            Some(current) if current == scope => {}
            Some(current) => {
                tracing::debug!(
                    user_id = %current.0,
                    "Identity changed during refresh, fetching again"
                );
                scope = current;
                continue;
            }
            None => {
                tracing::debug!("No longer eligible, discarding unread result");
                return;
            }
        }

        match result {
            Ok(page) => publish(count_tx, page.unread_total(&scope.1)),
            Err(e) => {
                tracing::debug!(error = %e, "Unread refresh failed, keeping previous total");
            }
        }
        return;
    }
}

fn publish(count_tx: &watch::Sender<u32>, total: u32) {
    count_tx.send_if_modified(|current| {
        if *current == total {
            return false;
        }
        tracing::debug!(previous = *current, total, "Unread total changed");
        *current = total;
        true
    });
}
