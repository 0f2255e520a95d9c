//! Conversation list access

use async_trait::async_trait;
use prolink_shared::ConversationPage;

use crate::error::ClientResult;
use crate::http::ApiClient;

/// Conversation list endpoint
pub const CONVERSATIONS_PATH: &str = "conversations";

/// Anything that can list the current user's conversations
#[async_trait]
pub trait ConversationSource: Send + Sync {
    /// Fetch one page (1-based) of at most `limit` conversations
    async fn list_conversations(&self, page: u32, limit: u32) -> ClientResult<ConversationPage>;
}

#[async_trait]
impl ConversationSource for ApiClient {
    async fn list_conversations(&self, page: u32, limit: u32) -> ClientResult<ConversationPage> {
        self.get_json(
            CONVERSATIONS_PATH,
            &[("page", page.to_string()), ("limit", limit.to_string())],
        )
        .await
    }
}
