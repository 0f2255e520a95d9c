//! ProLink client library
//!
//! The chat notification core of the ProLink marketplace client: an
//! authenticated API client, visibility-aware polling, the unread badge and
//! the chat intent bus with its login handoff.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod polling;

pub use auth::{AuthContext, AuthState, SessionManager, TokenStore};
pub use chat::{ChatIntentBus, ChatLauncher, PendingIntentMailbox, StartChatOutcome};
pub use config::Config;
pub use error::{ClientError, ClientResult};
pub use http::ApiClient;
pub use polling::{
    Poller, PollerOptions, UnreadAggregator, UnreadBadge, Visibility, VisibilitySource,
};
