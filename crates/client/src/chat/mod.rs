//! Chat plumbing: conversation access, the intent bus, the pending-intent
//! handoff and the start-chat gate

pub mod bus;
pub mod conversations;
pub mod launcher;
pub mod pending;

pub use bus::{ChatIntentBus, ChatIntentListener};
pub use conversations::{ConversationSource, CONVERSATIONS_PATH};
pub use launcher::{
    login_redirect, resume_pending_chat, ChatLauncher, Navigator, Notifier, StartChatOutcome,
    CUSTOMERS_ONLY_MESSAGE, LOGIN_VIEW,
};
pub use pending::{PendingIntentMailbox, DEFAULT_PENDING_CHAT_TTL, PENDING_CHAT_KEY};
