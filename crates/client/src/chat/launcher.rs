//! "Start chat" gating
//!
//! Decides what a start-chat request does given who the user is: wait for
//! identity, send them to sign in with the intent parked, refuse, or open
//! the chat right away.

use std::sync::Arc;

use prolink_shared::{ChatIntent, ProfessionalId, Role, StoreResult};
use url::form_urlencoded;

use super::bus::ChatIntentBus;
use super::pending::PendingIntentMailbox;
use crate::auth::AuthContext;

/// Login view the unauthenticated user is sent to
pub const LOGIN_VIEW: &str = "/login";

/// Shown when a non-customer tries to start a chat
pub const CUSTOMERS_ONLY_MESSAGE: &str = "Only customers can start a chat with a professional";

/// Moves the user to another view
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Shows a short-lived message to the user
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// What a start-chat request ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartChatOutcome {
    /// Identity still loading; nothing happened
    Deferred,
    /// Intent parked and user sent to sign in
    RedirectedToLogin { redirect: String },
    /// Signed-in user may not start chats
    Rejected,
    /// Intent emitted to this many listeners
    Opened { listeners: usize },
}

#[derive(Clone)]
pub struct ChatLauncher {
    auth: AuthContext,
    bus: ChatIntentBus,
    mailbox: PendingIntentMailbox,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl ChatLauncher {
    pub fn new(
        auth: AuthContext,
        bus: ChatIntentBus,
        mailbox: PendingIntentMailbox,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            auth,
            bus,
            mailbox,
            navigator,
            notifier,
        }
    }

    /// Handle a "start chat with this professional" request
    pub fn request_start(
        &self,
        professional_id: impl Into<ProfessionalId>,
        current_path: &str,
    ) -> StartChatOutcome {
        let intent = ChatIntent::with_professional(professional_id);
        let state = self.auth.current();

        if state.loading {
            tracing::debug!("Start chat requested before auth resolved, ignoring");
            return StartChatOutcome::Deferred;
        }

        match state.role() {
            None => {
                if let Err(e) = self.mailbox.put(&intent) {
                    tracing::warn!(error = %e, "Failed to park chat intent before login");
                }
                let redirect = login_redirect(current_path);
                tracing::info!(redirect = %redirect, "Redirecting to login to start chat");
                self.navigator.redirect(&redirect);
                StartChatOutcome::RedirectedToLogin { redirect }
            }
            Some(Role::Customer) => {
                let listeners = self.bus.emit_open(intent);
                StartChatOutcome::Opened { listeners }
            }
            Some(role) => {
                tracing::debug!(role = %role, "Start chat rejected for role");
                self.notifier.error(CUSTOMERS_ONLY_MESSAGE);
                StartChatOutcome::Rejected
            }
        }
    }

    /// Re-emit a parked intent once the user is signed in
    ///
    /// Leaves the slot alone while nobody is signed in.
    pub fn resume_pending(&self) -> StoreResult<Option<ChatIntent>> {
        if !self.auth.current().is_authenticated {
            return Ok(None);
        }
        resume_pending_chat(&self.mailbox, &self.bus)
    }
}

/// Login view path carrying `current_path` as the return target
pub fn login_redirect(current_path: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", current_path)
        .finish();
    format!("{LOGIN_VIEW}?{query}")
}

/// Take the parked intent, if any, and emit it on `bus`
pub fn resume_pending_chat(
    mailbox: &PendingIntentMailbox,
    bus: &ChatIntentBus,
) -> StoreResult<Option<ChatIntent>> {
    let Some(intent) = mailbox.take()? else {
        return Ok(None);
    };
    let listeners = bus.emit_open(intent.clone());
    tracing::info!(listeners, "Resumed pending chat");
    Ok(Some(intent))
}
