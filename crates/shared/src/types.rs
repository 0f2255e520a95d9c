//! Common types used across ProLink

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// =============================================================================
// ID Wrappers
// =============================================================================

/// User ID wrapper (server-issued opaque identifier)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Professional profile ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfessionalId(pub String);

impl From<&str> for ProfessionalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ProfessionalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversation ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Users
// =============================================================================

/// Marketplace role of an authenticated user
///
/// Unrecognized role strings are kept verbatim in [`Role::Other`] so that a
/// new server-side role never fails deserialization of the whole user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Customer,
    Professional,
    Admin,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Customer => "customer",
            Role::Professional => "professional",
            Role::Admin => "admin",
            Role::Other(role) => role.as_str(),
        }
    }

    /// Whether this role participates in customer/professional chat
    pub fn has_chat_inbox(&self) -> bool {
        matches!(self, Role::Customer | Role::Professional)
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        match role.as_str() {
            "customer" => Role::Customer,
            "professional" => Role::Professional,
            "admin" => Role::Admin,
            _ => Role::Other(role),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public summary of a user as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

// =============================================================================
// Conversations
// =============================================================================

/// One entry of the conversation list
///
/// Only the two unread tallies are interpreted client side; everything else
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(alias = "_id")]
    pub id: ConversationId,
    #[serde(default)]
    pub customer_unread_count: u32,
    #[serde(default)]
    pub professional_unread_count: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConversationSummary {
    /// Unread tally as seen by the given role, `None` for roles without an inbox
    pub fn unread_for(&self, role: &Role) -> Option<u32> {
        match role {
            Role::Customer => Some(self.customer_unread_count),
            Role::Professional => Some(self.professional_unread_count),
            _ => None,
        }
    }
}

/// Pagination block returned alongside list responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
}

/// One page of the conversation list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationPage {
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl ConversationPage {
    /// Sum of the role-scoped unread tallies over this page
    ///
    /// Saturates instead of overflowing; roles without an inbox count zero.
    pub fn unread_total(&self, role: &Role) -> u32 {
        self.conversations
            .iter()
            .filter_map(|c| c.unread_for(role))
            .fold(0u32, |acc, n| acc.saturating_add(n))
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Sender of a chat message
///
/// The API returns either a populated user record or just the user's id,
/// depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageSender {
    User(UserSummary),
    Id(UserId),
}

impl MessageSender {
    pub fn id(&self) -> &UserId {
        match self {
            MessageSender::User(user) => &user.id,
            MessageSender::Id(id) => id,
        }
    }

    /// Full user record, when the endpoint populated it
    pub fn user(&self) -> Option<&UserSummary> {
        match self {
            MessageSender::User(user) => Some(user),
            MessageSender::Id(_) => None,
        }
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "_id")]
    pub id: String,
    pub conversation_id: ConversationId,
    pub sender: MessageSender,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ChatMessage {
    pub fn sender_id(&self) -> &UserId {
        self.sender.id()
    }

    pub fn is_from(&self, user_id: &UserId) -> bool {
        self.sender.id() == user_id
    }
}

// =============================================================================
// Chat intents
// =============================================================================

/// Request to open the chat surface, optionally targeting a professional or
/// an existing conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatIntent {
    pub open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional_id: Option<ProfessionalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

impl ChatIntent {
    /// Open a chat with a professional
    pub fn with_professional(professional_id: impl Into<ProfessionalId>) -> Self {
        Self {
            open: true,
            professional_id: Some(professional_id.into()),
            conversation_id: None,
        }
    }

    /// Open an existing conversation
    pub fn with_conversation(conversation_id: impl Into<ConversationId>) -> Self {
        Self {
            open: true,
            professional_id: None,
            conversation_id: Some(conversation_id.into()),
        }
    }

    /// Close the chat surface
    pub fn close() -> Self {
        Self {
            open: false,
            professional_id: None,
            conversation_id: None,
        }
    }
}
